//! # Inspection Archive
//!
//! Every saved draft and submitted inspection on the device, keyed by id and
//! checkpointed as one JSON document under `archive.inspections`.
//!
//! ## Failure Semantics
//! Same as the sync queue: the in-memory archive is authoritative while the
//! process runs; a failed checkpoint is logged and the change is kept.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use fieldsync_core::{InspectionDraft, InspectionStatus, MediaItem, UploadStatus};
use fieldsync_db::kv::ARCHIVE_KEY;
use fieldsync_db::{load_json, save_json, KvStore};
use fieldsync_sync::UploadedBlob;

use crate::error::{DraftError, DraftResult};

// =============================================================================
// Query Filter
// =============================================================================

/// Criteria for [`InspectionArchive::query`]. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectionFilter {
    /// Any of these statuses; empty means any status.
    pub statuses: Vec<InspectionStatus>,
    pub urgent: Option<bool>,
    pub has_media: Option<bool>,
    /// Case-insensitive match against notes, address and tags.
    pub search: Option<String>,
}

impl InspectionFilter {
    pub fn with_status(mut self, status: InspectionStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn urgent(mut self, urgent: bool) -> Self {
        self.urgent = Some(urgent);
        self
    }

    pub fn has_media(mut self, has_media: bool) -> Self {
        self.has_media = Some(has_media);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn matches(&self, inspection: &InspectionDraft) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&inspection.status) {
            return false;
        }
        if self.urgent.is_some_and(|urgent| urgent != inspection.is_urgent) {
            return false;
        }
        if self
            .has_media
            .is_some_and(|has_media| has_media == inspection.media.is_empty())
        {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => search_matches(inspection, &text.to_lowercase()),
            _ => true,
        }
    }
}

fn search_matches(inspection: &InspectionDraft, needle: &str) -> bool {
    let address = &inspection.address;
    [
        inspection.notes.as_str(),
        address.formatted.as_str(),
        address.street.as_str(),
        address.city.as_str(),
        address.zip_code.as_str(),
    ]
    .into_iter()
    .chain(inspection.tags.iter().map(String::as_str))
    .any(|field| field.to_lowercase().contains(needle))
}

/// Points a media item at its confirmed remote copy.
pub(crate) fn apply_confirmation(media: &mut MediaItem, blob: &UploadedBlob) {
    media.url = blob.url.clone();
    media.thumbnail_url = blob.url.clone();
    if blob.compressed_size.is_some() {
        media.compressed_size = blob.compressed_size;
    }
    media.upload_status = UploadStatus::Completed;
    media.local_path = None;
}

// =============================================================================
// Archive
// =============================================================================

/// Durable collection of inspections, unique by id, in insertion order.
pub struct InspectionArchive {
    store: Arc<dyn KvStore>,
    inspections: RwLock<Vec<InspectionDraft>>,
}

impl std::fmt::Debug for InspectionArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionArchive").finish_non_exhaustive()
    }
}

impl InspectionArchive {
    /// Creates an empty archive. Nothing is read from `store`.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        InspectionArchive {
            store,
            inspections: RwLock::new(Vec::new()),
        }
    }

    /// Rebuilds the archive from its last checkpoint.
    ///
    /// An unreadable checkpoint is logged and treated as empty.
    pub async fn restore(store: Arc<dyn KvStore>) -> Self {
        let archive = InspectionArchive::new(store);

        let saved: Vec<InspectionDraft> =
            match load_json(archive.store.as_ref(), ARCHIVE_KEY).await {
                Ok(saved) => saved.unwrap_or_default(),
                Err(e) => {
                    warn!(error = %e, "Archive checkpoint unreadable, starting empty");
                    Vec::new()
                }
            };

        {
            let mut inspections = archive.inspections.write().await;
            for inspection in saved {
                if inspections.iter().any(|i| i.id == inspection.id) {
                    warn!(id = %inspection.id, "Dropping duplicate inspection from checkpoint");
                    continue;
                }
                inspections.push(inspection);
            }
            info!(inspections = inspections.len(), "Inspection archive restored");
        }

        archive
    }

    async fn checkpoint(&self, inspections: &[InspectionDraft]) {
        if let Err(e) = save_json(self.store.as_ref(), ARCHIVE_KEY, inspections).await {
            error!(
                error = %e,
                inspections = inspections.len(),
                "Failed to checkpoint inspection archive"
            );
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Inserts `inspection`, or replaces the one with the same id.
    ///
    /// Returns true when it was new.
    pub async fn upsert(&self, inspection: InspectionDraft) -> bool {
        let mut inspections = self.inspections.write().await;
        let inserted = match inspections.iter_mut().find(|i| i.id == inspection.id) {
            Some(existing) => {
                *existing = inspection;
                false
            }
            None => {
                inspections.push(inspection);
                true
            }
        };
        self.checkpoint(&inspections).await;
        inserted
    }

    /// Removes and returns the inspection; `None` if absent.
    pub async fn remove(&self, id: &str) -> Option<InspectionDraft> {
        let mut inspections = self.inspections.write().await;
        let index = inspections.iter().position(|i| i.id == id)?;
        let removed = inspections.remove(index);
        debug!(id = %id, "Inspection removed from archive");
        self.checkpoint(&inspections).await;
        Some(removed)
    }

    /// Persists a status reported by a review collaborator.
    ///
    /// Only forward moves through the lifecycle are accepted; repeating the
    /// current status is a no-op.
    pub async fn record_review_status(
        &self,
        id: &str,
        status: InspectionStatus,
    ) -> DraftResult<InspectionDraft> {
        let mut inspections = self.inspections.write().await;
        let inspection = inspections
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;

        if inspection.status == status {
            return Ok(inspection.clone());
        }
        if !inspection.status.can_advance_to(status) {
            return Err(DraftError::InvalidStatusTransition {
                from: inspection.status,
                to: status,
            });
        }

        info!(id = %id, from = %inspection.status, to = %status, "Review status recorded");
        inspection.status = status;
        inspection.touch();
        let updated = inspection.clone();
        self.checkpoint(&inspections).await;
        Ok(updated)
    }

    /// Marks `media_id` uploaded in every archived inspection holding it.
    ///
    /// Returns how many inspections changed.
    pub async fn confirm_media(&self, media_id: &str, blob: &UploadedBlob) -> usize {
        let mut inspections = self.inspections.write().await;
        let mut changed = 0;
        for inspection in inspections.iter_mut() {
            if let Some(media) = inspection.media_mut(media_id) {
                apply_confirmation(media, blob);
                changed += 1;
            }
        }
        if changed > 0 {
            self.checkpoint(&inspections).await;
        }
        changed
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &str) -> Option<InspectionDraft> {
        self.inspections
            .read()
            .await
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub async fn list_all(&self) -> Vec<InspectionDraft> {
        self.inspections.read().await.clone()
    }

    /// Inspections still in `draft` status.
    pub async fn list_drafts(&self) -> Vec<InspectionDraft> {
        self.query(&InspectionFilter::default().with_status(InspectionStatus::Draft))
            .await
    }

    pub async fn query(&self, filter: &InspectionFilter) -> Vec<InspectionDraft> {
        self.inspections
            .read()
            .await
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inspections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::{Address, MediaQuality, MediaType};
    use fieldsync_db::MemoryKvStore;

    fn draft(notes: &str) -> InspectionDraft {
        let mut d = InspectionDraft::new(Address::default());
        d.notes = notes.to_string();
        d
    }

    fn pending_media(id: &str) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            media_type: MediaType::Photo,
            url: "preview://1".into(),
            thumbnail_url: "preview://1".into(),
            filename: "roof.jpg".into(),
            size: 2048,
            compressed_size: None,
            captured_at: chrono::Utc::now(),
            location: None,
            tags: vec![],
            owner_info: None,
            upload_status: UploadStatus::Pending,
            quality: MediaQuality::Medium,
            local_path: Some("/tmp/roof.jpg".into()),
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let archive = InspectionArchive::new(Arc::new(MemoryKvStore::new()));
        let mut d = draft("first");

        assert!(archive.upsert(d.clone()).await);
        d.notes = "second".into();
        assert!(!archive.upsert(d.clone()).await);

        assert_eq!(archive.len().await, 1);
        assert_eq!(archive.get(&d.id).await.unwrap().notes, "second");
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let store = Arc::new(MemoryKvStore::new());
        let archive = InspectionArchive::new(store.clone());
        archive.upsert(draft("a")).await;
        archive.upsert(draft("b")).await;

        let restored = InspectionArchive::restore(store).await;
        assert_eq!(restored.list_all().await, archive.list_all().await);
    }

    #[tokio::test]
    async fn test_failed_checkpoint_keeps_change() {
        let store = Arc::new(MemoryKvStore::new());
        let archive = InspectionArchive::new(store.clone());
        store.set_fail_writes(true);

        archive.upsert(draft("kept")).await;
        assert_eq!(archive.len().await, 1);
    }

    #[tokio::test]
    async fn test_review_status_only_moves_forward() {
        let archive = InspectionArchive::new(Arc::new(MemoryKvStore::new()));
        let mut d = draft("x");
        d.status = InspectionStatus::Submitted;
        archive.upsert(d.clone()).await;

        let reviewed = archive
            .record_review_status(&d.id, InspectionStatus::UnderReview)
            .await
            .unwrap();
        assert_eq!(reviewed.status, InspectionStatus::UnderReview);

        archive
            .record_review_status(&d.id, InspectionStatus::Completed)
            .await
            .unwrap();
        let err = archive
            .record_review_status(&d.id, InspectionStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, DraftError::InvalidStatusTransition { .. }));

        let missing = archive
            .record_review_status("nope", InspectionStatus::Completed)
            .await;
        assert!(matches!(missing, Err(DraftError::DraftNotFound(_))));
    }

    #[tokio::test]
    async fn test_query_filters() {
        let archive = InspectionArchive::new(Arc::new(MemoryKvStore::new()));

        let mut urgent = draft("Roof leak over garage");
        urgent.is_urgent = true;
        urgent.media.push(pending_media("m1"));
        let mut plain = draft("fence");
        plain.address.city = "Houston".into();
        plain.status = InspectionStatus::Submitted;

        archive.upsert(urgent.clone()).await;
        archive.upsert(plain.clone()).await;

        let hits = archive.query(&InspectionFilter::default().urgent(true)).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, urgent.id);

        let hits = archive.query(&InspectionFilter::default().search("houston")).await;
        assert_eq!(hits[0].id, plain.id);

        let hits = archive.query(&InspectionFilter::default().has_media(false)).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, plain.id);

        assert_eq!(archive.list_drafts().await.len(), 1);
        assert_eq!(archive.query(&InspectionFilter::default()).await.len(), 2);
    }

    #[tokio::test]
    async fn test_confirm_media_updates_archived_copies() {
        let archive = InspectionArchive::new(Arc::new(MemoryKvStore::new()));
        let mut d = draft("x");
        d.media.push(pending_media("m1"));
        archive.upsert(d.clone()).await;

        let blob = UploadedBlob {
            url: "https://blobs.test/media/roof.jpg".into(),
            key: "media/roof.jpg".into(),
            compressed_size: Some(900),
        };
        assert_eq!(archive.confirm_media("m1", &blob).await, 1);
        assert_eq!(archive.confirm_media("m2", &blob).await, 0);

        let media = &archive.get(&d.id).await.unwrap().media[0];
        assert_eq!(media.url, blob.url);
        assert_eq!(media.compressed_size, Some(900));
        assert_eq!(media.upload_status, UploadStatus::Completed);
        assert!(media.local_path.is_none());
    }
}
