//! In-memory collaborators for tests.
//!
//! `FakeSubmissionApi` records every call in order and can be scripted to
//! fail per subject id, to report the network as down, or to hold calls open
//! until released. `FakeBlobUploader` records uploads and can fail per file.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Notify};

use fieldsync_core::{InspectionDraft, MapPin, MediaItem, SyncKind};

use crate::error::{SyncError, SyncResult};
use crate::transport::{BlobUploader, SubmissionApi, UploadOptions, UploadedBlob};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One recorded endpoint call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub kind: SyncKind,
    pub subject_id: String,
    /// Media URL as sent (empty for other kinds).
    pub url: String,
}

/// Scriptable [`SubmissionApi`].
#[derive(Clone)]
pub struct FakeSubmissionApi {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    network_down: Arc<Mutex<bool>>,
    gate: Arc<watch::Sender<bool>>,
    started: Arc<Notify>,
}

impl Default for FakeSubmissionApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSubmissionApi {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        FakeSubmissionApi {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            network_down: Arc::new(Mutex::new(false)),
            gate: Arc::new(gate),
            started: Arc::new(Notify::new()),
        }
    }

    /// Calls for `subject_id` fail with `UploadFailed` until reset.
    pub fn fake_fail(&self, subject_id: &str) {
        lock(&self.failing).insert(subject_id.to_string());
    }

    pub fn fake_reset(&self, subject_id: &str) {
        lock(&self.failing).remove(subject_id);
    }

    /// Every call fails with `NetworkUnavailable` while set.
    pub fn fake_network_down(&self, down: bool) {
        *lock(&self.network_down) = down;
    }

    /// Blocks subsequent calls until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Resolves once a call has started (including a held one).
    pub async fn wait_for_call(&self) {
        self.started.notified().await;
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, subject_id: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.subject_id == subject_id)
            .count()
    }

    async fn call(&self, kind: SyncKind, subject_id: &str, url: &str) -> SyncResult<()> {
        lock(&self.calls).push(RecordedCall {
            kind,
            subject_id: subject_id.to_string(),
            url: url.to_string(),
        });
        self.started.notify_one();

        let mut gate = self.gate.subscribe();
        let opened = gate.wait_for(|open| *open).await.map(|_| ()).is_ok();
        if !opened {
            return Err(SyncError::Internal("fake gate dropped".into()));
        }

        if *lock(&self.network_down) {
            return Err(SyncError::NetworkUnavailable);
        }
        if lock(&self.failing).contains(subject_id) {
            return Err(SyncError::UploadFailed(format!(
                "simulated failure for {}",
                subject_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionApi for FakeSubmissionApi {
    async fn submit_inspection(&self, inspection: &InspectionDraft) -> SyncResult<()> {
        self.call(SyncKind::Inspection, &inspection.id, "").await
    }

    async fn sync_media(&self, media: &MediaItem) -> SyncResult<()> {
        self.call(SyncKind::MediaUpload, &media.id, &media.url).await
    }

    async fn save_pin(&self, pin: &MapPin) -> SyncResult<()> {
        self.call(SyncKind::PinSave, &pin.id, "").await
    }
}

/// Scriptable [`BlobUploader`].
#[derive(Clone)]
pub struct FakeBlobUploader {
    configured: bool,
    uploads: Arc<Mutex<Vec<PathBuf>>>,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
    host_down: Arc<Mutex<bool>>,
}

impl Default for FakeBlobUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBlobUploader {
    pub fn new() -> Self {
        FakeBlobUploader {
            configured: true,
            uploads: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            host_down: Arc::new(Mutex::new(false)),
        }
    }

    /// An uploader that reports itself as unconfigured.
    pub fn unconfigured() -> Self {
        FakeBlobUploader {
            configured: false,
            ..Self::new()
        }
    }

    pub fn fake_fail(&self, path: impl Into<PathBuf>) {
        lock(&self.failing).insert(path.into());
    }

    pub fn fake_reset(&self, path: impl AsRef<Path>) {
        lock(&self.failing).remove(path.as_ref());
    }

    /// Every upload fails with `NetworkUnavailable` while set.
    pub fn fake_host_down(&self, down: bool) {
        *lock(&self.host_down) = down;
    }

    /// Successfully uploaded paths, in order.
    pub fn uploads(&self) -> Vec<PathBuf> {
        lock(&self.uploads).clone()
    }

    /// The URL a successful upload of `filename` returns.
    pub fn url_for(filename: &str) -> String {
        format!("https://blobs.test/media/{}", filename)
    }
}

#[async_trait]
impl BlobUploader for FakeBlobUploader {
    async fn upload(&self, path: &Path, options: &UploadOptions) -> SyncResult<UploadedBlob> {
        if !self.configured {
            return Err(SyncError::UploaderNotConfigured);
        }
        if *lock(&self.host_down) {
            return Err(SyncError::NetworkUnavailable);
        }
        if lock(&self.failing).contains(path) {
            return Err(SyncError::UploadFailed(format!(
                "simulated failure for {}",
                path.display()
            )));
        }

        lock(&self.uploads).push(path.to_path_buf());
        Ok(UploadedBlob {
            url: Self::url_for(&options.filename),
            key: format!("media/{}", options.filename),
            compressed_size: None,
        })
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}
