//! # Local Preview Arena
//!
//! Media captured offline is shown from the device file until its upload is
//! confirmed. Each pending item holds one preview handle; the handle is
//! released when the remote URL is confirmed or the item is discarded.
//!
//! ```text
//!   add_media (offline) ──► allocate ──► preview://7  (url + thumbnail)
//!                                          │
//!   confirm_media_upload ─┐                │
//!   remove_media         ─┼──► release ────┘
//!   delete_draft         ─┘
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// URL scheme of local preview handles.
pub const PREVIEW_SCHEME: &str = "preview";

/// Handle to a local preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewHandle(u64);

impl PreviewHandle {
    /// The URL shown in place of the remote one.
    pub fn url(&self) -> String {
        format!("{}://{}", PREVIEW_SCHEME, self.0)
    }
}

#[derive(Debug)]
struct Preview {
    handle: PreviewHandle,
    path: PathBuf,
}

#[derive(Debug, Default)]
struct ArenaState {
    next: u64,
    by_media: HashMap<String, Preview>,
}

/// Tracks live previews by media id.
#[derive(Debug, Default)]
pub struct PreviewArena {
    state: Mutex<ArenaState>,
}

impl PreviewArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ArenaState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocates a preview of `path` for `media_id`.
    ///
    /// Allocating again for the same media id replaces the old handle.
    pub fn allocate(&self, media_id: &str, path: &Path) -> PreviewHandle {
        let mut state = self.lock();
        state.next += 1;
        let handle = PreviewHandle(state.next);
        state.by_media.insert(
            media_id.to_string(),
            Preview {
                handle,
                path: path.to_path_buf(),
            },
        );
        debug!(media_id = %media_id, url = %handle.url(), "Preview allocated");
        handle
    }

    /// Releases the preview of `media_id`; false if none was live.
    pub fn release(&self, media_id: &str) -> bool {
        let released = self.lock().by_media.remove(media_id);
        if let Some(preview) = &released {
            debug!(
                media_id = %media_id,
                url = %preview.handle.url(),
                "Preview released"
            );
        }
        released.is_some()
    }

    pub fn handle_of(&self, media_id: &str) -> Option<PreviewHandle> {
        self.lock().by_media.get(media_id).map(|p| p.handle)
    }

    /// The file behind a live preview.
    pub fn path_of(&self, media_id: &str) -> Option<PathBuf> {
        self.lock().by_media.get(media_id).map(|p| p.path.clone())
    }

    pub fn is_live(&self, media_id: &str) -> bool {
        self.lock().by_media.contains_key(media_id)
    }

    pub fn len(&self) -> usize {
        self.lock().by_media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let arena = PreviewArena::new();
        let a = arena.allocate("m1", Path::new("/tmp/a.jpg"));
        let b = arena.allocate("m2", Path::new("/tmp/b.jpg"));

        assert_ne!(a, b);
        assert_eq!(a.url(), "preview://1");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.path_of("m2"), Some(PathBuf::from("/tmp/b.jpg")));

        assert!(arena.release("m1"));
        assert!(!arena.release("m1"));
        assert!(!arena.is_live("m1"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_reallocate_replaces_handle() {
        let arena = PreviewArena::new();
        arena.allocate("m1", Path::new("/tmp/a.jpg"));
        let second = arena.allocate("m1", Path::new("/tmp/a.jpg"));

        assert_eq!(arena.len(), 1);
        assert_eq!(arena.handle_of("m1"), Some(second));
    }
}
