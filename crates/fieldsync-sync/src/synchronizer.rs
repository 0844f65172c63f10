//! # Synchronizer
//!
//! Decides when to drain the [`SyncQueue`] and drives each item through its
//! delivery collaborator.
//!
//! ## Drain Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Synchronizer Drain Cycle                         │
//! │                                                                         │
//! │   Triggers                                                              │
//! │   ────────                                                              │
//! │   offline → online        ─┐                                           │
//! │   enqueue while online    ─┤                                           │
//! │   foreground while online ─┼──► drain()                                │
//! │   force_sync()            ─┘      │                                    │
//! │                                   ▼                                    │
//! │   ┌──────────────┐  busy  ┌──────────────────────────────────────────┐ │
//! │   │ in progress? │──────► │ coalesce: return, running cycle proceeds │ │
//! │   └──────┬───────┘        └──────────────────────────────────────────┘ │
//! │          │ idle                                                         │
//! │          ▼                                                              │
//! │   1. snapshot = queue.peek_all()   (later enqueues wait a cycle)       │
//! │   2. for item in snapshot:                                             │
//! │        offline?          → stop, attempts untouched                    │
//! │        removed meanwhile → skip                                        │
//! │        deliver ok        → queue.remove(id)        → ItemSynced        │
//! │        deliver err       → queue.record_attempt_failure(id)            │
//! │                            exhausted               → PermanentFailure  │
//! │   3. last_sync_time = now, in_progress = false     → Status            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Retry Policy
//! Retries happen only on the next trigger; there is no backoff timer, so a
//! device that stays offline spends no attempts.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use fieldsync_core::{
    MediaItem, SyncItem, SyncKind, SyncPayload, SyncStatus, Tombstone, UploadStatus,
};
use fieldsync_db::kv::LAST_SYNC_TIME_KEY;
use fieldsync_db::{load_json, save_json};

use crate::error::{SyncError, SyncResult};
use crate::events::{DeviceEvent, SyncEvent, EVENT_CHANNEL_CAPACITY};
use crate::queue::{AttemptOutcome, SyncQueue};
use crate::transport::{BlobUploader, SubmissionApi, UploadOptions};

// =============================================================================
// Drain Outcome
// =============================================================================

/// Summary of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Delivered and removed.
    pub delivered: usize,
    /// Failed, still queued.
    pub retried: usize,
    /// Failed for the last time and moved to the tombstone log.
    pub tombstoned: usize,
    /// In the snapshot but gone from the queue when their turn came.
    pub skipped: usize,
    /// The cycle ended early because the device went offline or the API
    /// could not be reached.
    pub stopped_offline: bool,
    /// Another cycle was already running; nothing was done.
    pub coalesced: bool,
}

/// Clears the in-progress flag even if a collaborator panics.
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Synchronizer
// =============================================================================

struct SynchronizerInner {
    queue: SyncQueue,
    api: Arc<dyn SubmissionApi>,
    uploader: Arc<dyn BlobUploader>,
    online: AtomicBool,
    foreground: AtomicBool,
    sync_in_progress: AtomicBool,
    last_sync_time: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    events: broadcast::Sender<SyncEvent>,
}

/// Drains the sync queue against connectivity signals.
///
/// Cheap to clone; clones share the same queue and state.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<SynchronizerInner>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("online", &self.is_online())
            .field("sync_in_progress", &self.is_syncing())
            .finish_non_exhaustive()
    }
}

impl Synchronizer {
    /// Creates an offline synchronizer over `queue`.
    pub fn new(
        queue: SyncQueue,
        api: Arc<dyn SubmissionApi>,
        uploader: Arc<dyn BlobUploader>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Synchronizer {
            inner: Arc::new(SynchronizerInner {
                queue,
                api,
                uploader,
                online: AtomicBool::new(false),
                foreground: AtomicBool::new(true),
                sync_in_progress: AtomicBool::new(false),
                last_sync_time: RwLock::new(None),
                last_error: RwLock::new(None),
                events,
            }),
        }
    }

    /// Like [`new`](Self::new), also restoring the last sync time.
    pub async fn restore(
        queue: SyncQueue,
        api: Arc<dyn SubmissionApi>,
        uploader: Arc<dyn BlobUploader>,
    ) -> Self {
        let store = queue.store();
        let synchronizer = Self::new(queue, api, uploader);

        match load_json::<DateTime<Utc>, _>(store.as_ref(), LAST_SYNC_TIME_KEY).await {
            Ok(last) => *synchronizer.inner.last_sync_time.write().await = last,
            Err(e) => warn!(error = %e, "Last sync time unreadable"),
        }

        synchronizer
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn queue(&self) -> &SyncQueue {
        &self.inner.queue
    }

    /// The blob uploader, shared with callers that upload inline.
    pub fn uploader(&self) -> Arc<dyn BlobUploader> {
        self.inner.uploader.clone()
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    pub fn is_foreground(&self) -> bool {
        self.inner.foreground.load(Ordering::SeqCst)
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.sync_in_progress.load(Ordering::SeqCst)
    }

    /// Current status snapshot.
    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            is_online: self.is_online(),
            pending_items: self.inner.queue.len().await,
            last_sync_time: *self.inner.last_sync_time.read().await,
            sync_in_progress: self.is_syncing(),
            last_error: self.inner.last_error.read().await.clone(),
        }
    }

    /// Subscribes to events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Queue Operations
    // =========================================================================

    /// Queues `payload`; starts a drain if online.
    pub async fn enqueue(&self, payload: SyncPayload, priority: i32) -> String {
        let id = self.inner.queue.enqueue(payload, priority).await;
        self.emit_status().await;

        if self.is_online() {
            self.spawn_drain();
        }

        id
    }

    /// Removes an item; no-op if absent.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.inner.queue.remove(id).await;
        if removed {
            self.emit_status().await;
        }
        removed
    }

    pub async fn clear_queue(&self) {
        self.inner.queue.clear().await;
        self.emit_status().await;
    }

    /// Gives an item a fresh set of attempts and drains if online.
    pub async fn retry_item(&self, id: &str) -> SyncResult<()> {
        self.inner.queue.reset_attempts(id).await?;
        info!(id = %id, "Sync item reset for retry");
        self.emit_status().await;

        if self.is_online() {
            self.spawn_drain();
        }
        Ok(())
    }

    pub async fn peek_all(&self) -> Vec<SyncItem> {
        self.inner.queue.peek_all().await
    }

    pub async fn pending_by_kind(&self, kind: SyncKind) -> Vec<SyncItem> {
        self.inner.queue.pending_by_kind(kind).await
    }

    pub async fn tombstones(&self) -> Vec<Tombstone> {
        self.inner.queue.tombstones().await
    }

    pub async fn clear_tombstones(&self) {
        self.inner.queue.clear_tombstones().await;
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    /// Records connectivity. Going online with work queued starts a drain,
    /// whose handle is returned.
    pub async fn set_online(&self, online: bool) -> Option<JoinHandle<DrainOutcome>> {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return None;
        }

        info!(online, "Connectivity changed");
        self.emit_status().await;

        if online && !self.inner.queue.is_empty().await {
            Some(self.spawn_drain())
        } else {
            None
        }
    }

    /// Applies a platform signal.
    pub async fn handle_event(&self, event: DeviceEvent) -> Option<JoinHandle<DrainOutcome>> {
        match event {
            DeviceEvent::Online => self.set_online(true).await,
            DeviceEvent::Offline => self.set_online(false).await,
            DeviceEvent::Foreground => {
                self.inner.foreground.store(true, Ordering::SeqCst);
                if self.is_online() && !self.inner.queue.is_empty().await {
                    debug!("Foregrounded with pending work");
                    Some(self.spawn_drain())
                } else {
                    None
                }
            }
            DeviceEvent::Background => {
                self.inner.foreground.store(false, Ordering::SeqCst);
                None
            }
        }
    }

    /// Drains now. Fails fast with `NetworkUnavailable` when offline.
    pub async fn force_sync(&self) -> SyncResult<DrainOutcome> {
        if !self.is_online() {
            return Err(SyncError::NetworkUnavailable);
        }
        info!("Forced sync requested");
        Ok(self.drain().await)
    }

    fn spawn_drain(&self) -> JoinHandle<DrainOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.drain().await })
    }

    /// Runs one drain cycle, or returns immediately if one is running.
    pub async fn drain(&self) -> DrainOutcome {
        let inner = &self.inner;

        if inner
            .sync_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Drain already in progress, coalescing");
            return DrainOutcome {
                coalesced: true,
                ..Default::default()
            };
        }
        let guard = InProgressGuard(&inner.sync_in_progress);
        self.emit_status().await;

        let snapshot = inner.queue.peek_all().await;
        info!(items = snapshot.len(), "Drain cycle started");

        let mut outcome = DrainOutcome::default();
        let mut cycle_error: Option<String> = None;

        for item in snapshot {
            if !self.is_online() {
                info!("Went offline, deferring the rest of the cycle");
                outcome.stopped_offline = true;
                break;
            }

            if !inner.queue.contains(&item.id).await {
                outcome.skipped += 1;
                continue;
            }

            match self.deliver(&item).await {
                Ok(()) => {
                    inner.queue.remove(&item.id).await;
                    outcome.delivered += 1;
                    debug!(id = %item.id, kind = %item.kind(), "Sync item delivered");
                    self.publish(SyncEvent::ItemSynced {
                        item_id: item.id.clone(),
                        kind: item.kind(),
                        subject_id: item.payload.subject_id().to_string(),
                    });
                }
                Err(SyncError::NetworkUnavailable) => {
                    // Connectivity itself is owned by device events; the next
                    // trigger starts a fresh cycle.
                    info!(id = %item.id, "API unreachable, stopping cycle");
                    outcome.stopped_offline = true;
                    break;
                }
                Err(e) => {
                    let message = e.to_string();
                    debug!(
                        id = %item.id,
                        kind = %item.kind(),
                        retryable = e.is_retryable(),
                        error = %message,
                        "Delivery failed"
                    );

                    match inner.queue.record_attempt_failure(&item.id, &message).await {
                        AttemptOutcome::Retry { .. } => {
                            outcome.retried += 1;
                            cycle_error = Some(message);
                        }
                        AttemptOutcome::PermanentFailure(tombstone) => {
                            outcome.tombstoned += 1;
                            cycle_error = Some(SyncError::from(&tombstone).to_string());
                            self.publish(SyncEvent::PermanentFailure(tombstone));
                        }
                        AttemptOutcome::NotFound => {
                            outcome.skipped += 1;
                            cycle_error = Some(message);
                        }
                    }
                }
            }
        }

        match cycle_error {
            Some(message) => *inner.last_error.write().await = Some(message),
            None if !outcome.stopped_offline => *inner.last_error.write().await = None,
            None => {}
        }

        if !outcome.stopped_offline {
            let now = Utc::now();
            *inner.last_sync_time.write().await = Some(now);
            let store = inner.queue.store();
            if let Err(e) = save_json(store.as_ref(), LAST_SYNC_TIME_KEY, &now).await {
                error!(error = %e, "Failed to persist last sync time");
            }
        }

        drop(guard);

        info!(
            delivered = outcome.delivered,
            retried = outcome.retried,
            tombstoned = outcome.tombstoned,
            stopped_offline = outcome.stopped_offline,
            "Drain cycle finished"
        );
        self.emit_status().await;

        outcome
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    async fn deliver(&self, item: &SyncItem) -> SyncResult<()> {
        match &item.payload {
            SyncPayload::Inspection(inspection) => {
                self.inner.api.submit_inspection(inspection).await
            }
            SyncPayload::PinSave(pin) => self.inner.api.save_pin(pin).await,
            SyncPayload::MediaUpload(media) => self.deliver_media(media).await,
        }
    }

    /// Uploads the local file first when there is one, then syncs metadata.
    async fn deliver_media(&self, media: &MediaItem) -> SyncResult<()> {
        let local_path = media.local_path.as_deref().filter(|_| media.is_pending());
        let Some(path) = local_path else {
            return self.inner.api.sync_media(media).await;
        };

        if !self.inner.uploader.is_configured() {
            return Err(SyncError::UploaderNotConfigured);
        }

        let blob = self
            .inner
            .uploader
            .upload(Path::new(path), &UploadOptions::for_media(media))
            .await
            .map_err(|e| match e {
                // The blob host is separate from the API; its outage is a
                // per-item failure, not a reason to stop the cycle.
                SyncError::NetworkUnavailable => {
                    SyncError::UploadFailed("Blob host unreachable".to_string())
                }
                other => other,
            })?;

        let mut confirmed = media.clone();
        confirmed.url = blob.url.clone();
        confirmed.thumbnail_url = blob.url.clone();
        confirmed.compressed_size = blob.compressed_size.or(media.compressed_size);
        confirmed.upload_status = UploadStatus::Completed;
        confirmed.local_path = None;

        self.inner.api.sync_media(&confirmed).await?;

        self.publish(SyncEvent::MediaConfirmed {
            media_id: media.id.clone(),
            blob,
        });
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn publish(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    async fn emit_status(&self) {
        let status = self.status().await;
        self.publish(SyncEvent::Status(status));
    }

    /// Consumes device events until `shutdown` fires or the channel closes.
    pub async fn run(
        self,
        mut device_events: mpsc::Receiver<DeviceEvent>,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        info!("Synchronizer event loop starting");

        loop {
            tokio::select! {
                event = device_events.recv() => match event {
                    Some(event) => {
                        debug!(?event, "Device event");
                        // Drains run detached; the loop keeps taking events.
                        let _ = self.handle_event(event).await;
                    }
                    None => {
                        info!("Device event channel closed");
                        break;
                    }
                },

                _ = shutdown.recv() => {
                    info!("Synchronizer received shutdown");
                    break;
                }
            }
        }

        info!("Synchronizer event loop stopped");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBlobUploader, FakeSubmissionApi};
    use fieldsync_core::{
        Address, GeoPoint, InspectionDraft, MediaQuality, MediaType, NewMapPin,
    };
    use fieldsync_db::MemoryKvStore;

    struct Harness {
        store: Arc<MemoryKvStore>,
        api: FakeSubmissionApi,
        uploader: FakeBlobUploader,
        sync: Synchronizer,
    }

    fn harness_with(uploader: FakeBlobUploader) -> Harness {
        let store = Arc::new(MemoryKvStore::new());
        let api = FakeSubmissionApi::new();
        let queue = SyncQueue::new(store.clone(), 3, 50);
        let sync = Synchronizer::new(queue, Arc::new(api.clone()), Arc::new(uploader.clone()));
        Harness {
            store,
            api,
            uploader,
            sync,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeBlobUploader::new())
    }

    fn pin(description: &str) -> SyncPayload {
        SyncPayload::PinSave(
            NewMapPin {
                location: GeoPoint { lat: 1.0, lng: 2.0 },
                description: description.to_string(),
                media: vec![],
                is_urgent: false,
            }
            .into_pin(),
        )
    }

    fn pending_media(filename: &str) -> MediaItem {
        MediaItem {
            id: fieldsync_core::new_id(),
            media_type: MediaType::Photo,
            url: format!("preview://{}", filename),
            thumbnail_url: format!("preview://{}", filename),
            filename: filename.to_string(),
            size: 1024,
            compressed_size: None,
            captured_at: Utc::now(),
            location: None,
            tags: vec![],
            owner_info: None,
            upload_status: UploadStatus::Pending,
            quality: MediaQuality::Medium,
            local_path: Some(format!("/photos/{}", filename)),
        }
    }

    #[tokio::test]
    async fn test_force_sync_offline_fails_fast() {
        let h = harness();
        h.sync.enqueue(pin("a"), 1).await;

        assert!(matches!(
            h.sync.force_sync().await,
            Err(SyncError::NetworkUnavailable)
        ));
        assert!(h.api.calls().is_empty());
        assert_eq!(h.sync.status().await.pending_items, 1);
    }

    #[tokio::test]
    async fn test_going_online_drains_queue() {
        let h = harness();
        h.sync.enqueue(pin("a"), 1).await;
        h.sync.enqueue(pin("b"), 1).await;

        let handle = h.sync.set_online(true).await.expect("drain should start");
        let outcome = handle.await.unwrap();

        assert_eq!(outcome.delivered, 2);
        assert!(h.sync.queue().is_empty().await);

        let status = h.sync.status().await;
        assert!(status.is_online);
        assert!(!status.sync_in_progress);
        assert!(status.last_sync_time.is_some());
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_online_with_empty_queue_does_not_drain() {
        let h = harness();
        assert!(h.sync.set_online(true).await.is_none());
        assert!(h.sync.set_online(true).await.is_none());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_siblings() {
        let h = harness();
        let p1 = pin("1");
        let p2 = pin("2");
        let p3 = pin("3");
        h.api.fake_fail(p2.subject_id());

        h.sync.enqueue(p1, 1).await;
        let failing = h.sync.enqueue(p2, 1).await;
        h.sync.enqueue(p3, 1).await;

        let outcome = h.sync.set_online(true).await.unwrap().await.unwrap();
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.retried, 1);

        let remaining = h.sync.peek_all().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, failing);
        assert_eq!(remaining[0].attempts, 1);
        assert!(h.sync.status().await.last_error.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_item_is_tombstoned_and_reported() {
        let h = harness();
        let payload = pin("doomed");
        let subject = payload.subject_id().to_string();
        h.api.fake_fail(&subject);
        let id = h.sync.enqueue(payload, 1).await;
        h.sync.set_online(true).await.unwrap().await.unwrap();

        let mut events = h.sync.subscribe();
        h.sync.force_sync().await.unwrap();
        let last = h.sync.force_sync().await.unwrap();
        assert_eq!(last.tombstoned, 1);
        let reason = h.sync.status().await.last_error.unwrap();
        assert!(reason.contains("failed permanently after 3 attempts"));

        // A further cycle makes no attempt for the removed item.
        h.sync.force_sync().await.unwrap();
        assert_eq!(h.api.calls_for(&subject), 3);

        let tombstones = h.sync.tombstones().await;
        assert_eq!(tombstones.len(), 1);
        assert_eq!(tombstones[0].item.id, id);
        assert_eq!(tombstones[0].item.attempts, 3);

        let mut reported = false;
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::PermanentFailure(t) = event {
                assert_eq!(t.item.id, id);
                reported = true;
            }
        }
        assert!(reported);
    }

    #[tokio::test]
    async fn test_network_loss_stops_without_counting() {
        let h = harness();
        let a = h.sync.enqueue(pin("a"), 1).await;
        h.sync.enqueue(pin("b"), 1).await;
        h.api.fake_network_down(true);

        let outcome = h.sync.set_online(true).await.unwrap().await.unwrap();
        assert!(outcome.stopped_offline);
        assert_eq!(outcome.delivered, 0);

        assert_eq!(h.sync.queue().get(&a).await.unwrap().attempts, 0);
        assert_eq!(h.api.calls().len(), 1);
        assert!(h.sync.status().await.last_sync_time.is_none());

        // Connectivity stays as last reported, so recovery needs no new
        // Online event.
        assert!(h.sync.is_online());
        h.api.fake_network_down(false);
        let next = h.sync.force_sync().await.unwrap();
        assert_eq!(next.delivered, 2);
        assert!(h.sync.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_unreachable_blob_host_counts_attempts_and_spares_siblings() {
        let h = harness();
        h.uploader.fake_host_down(true);
        let media = h
            .sync
            .enqueue(SyncPayload::MediaUpload(pending_media("porch.jpg")), 2)
            .await;
        h.sync.enqueue(pin("after"), 1).await;

        let outcome = h.sync.set_online(true).await.unwrap().await.unwrap();
        assert!(!outcome.stopped_offline);
        assert_eq!(outcome.retried, 1);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(h.sync.queue().get(&media).await.unwrap().attempts, 1);
        assert!(h.sync.is_online());

        h.sync.force_sync().await.unwrap();
        let last = h.sync.force_sync().await.unwrap();
        assert_eq!(last.tombstoned, 1);
        assert!(h.sync.queue().is_empty().await);
        assert_eq!(h.sync.tombstones().await[0].item.id, media);
    }

    #[tokio::test]
    async fn test_concurrent_drain_is_coalesced_and_snapshot_defers_new_items() {
        let h = harness();
        h.sync.enqueue(pin("first"), 1).await;
        h.api.hold();

        let running = h.sync.set_online(true).await.unwrap();
        h.api.wait_for_call().await;
        assert!(h.sync.is_syncing());

        let second = h.sync.drain().await;
        assert!(second.coalesced);

        // Enqueued mid-cycle: its own drain trigger coalesces and the
        // running snapshot does not include it.
        let late = h.sync.enqueue(pin("late"), 5).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(h.sync.is_syncing());
        assert_eq!(h.api.calls().len(), 1);

        h.api.release();
        let outcome = running.await.unwrap();
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.skipped, 0);
        assert!(h.sync.queue().contains(&late).await);

        let next = h.sync.force_sync().await.unwrap();
        assert_eq!(next.delivered, 1);
        assert!(h.sync.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_media_with_local_file_uploads_then_syncs() {
        let h = harness();
        let media = pending_media("roof.jpg");
        let media_id = media.id.clone();
        h.sync.enqueue(SyncPayload::MediaUpload(media), 2).await;
        let mut events = h.sync.subscribe();

        h.sync.set_online(true).await.unwrap().await.unwrap();

        assert_eq!(h.uploader.uploads(), vec![std::path::PathBuf::from("/photos/roof.jpg")]);
        let calls = h.api.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, FakeBlobUploader::url_for("roof.jpg"));

        let mut confirmed = None;
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::MediaConfirmed { media_id, blob } = event {
                confirmed = Some((media_id, blob.url));
            }
        }
        assert_eq!(
            confirmed,
            Some((media_id, FakeBlobUploader::url_for("roof.jpg")))
        );
    }

    #[tokio::test]
    async fn test_media_without_uploader_counts_as_failure() {
        let h = harness_with(FakeBlobUploader::unconfigured());
        let id = h
            .sync
            .enqueue(SyncPayload::MediaUpload(pending_media("a.jpg")), 2)
            .await;

        let outcome = h.sync.set_online(true).await.unwrap().await.unwrap();
        assert_eq!(outcome.retried, 1);
        assert!(h.api.calls().is_empty());
        let item = h.sync.queue().get(&id).await.unwrap();
        assert!(item.last_error.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_foreground_triggers_drain_when_online() {
        let h = harness();
        h.sync.set_online(true).await;
        h.api.hold();
        h.sync.enqueue(pin("a"), 1).await;
        h.api.wait_for_call().await;
        h.api.fake_fail(&h.api.calls()[0].subject_id);
        h.api.release();

        // Let the spawned cycle finish.
        while h.sync.is_syncing() {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.sync.queue().len().await, 1);

        h.api.fake_reset(&h.api.calls()[0].subject_id);
        assert!(h.sync.handle_event(DeviceEvent::Background).await.is_none());
        assert!(!h.sync.is_foreground());

        let handle = h.sync.handle_event(DeviceEvent::Foreground).await.unwrap();
        handle.await.unwrap();
        assert!(h.sync.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_retry_item_resets_attempts() {
        let h = harness();
        let payload = pin("a");
        h.api.fake_fail(payload.subject_id());
        let id = h.sync.enqueue(payload, 1).await;

        h.sync.set_online(true).await.unwrap().await.unwrap();
        assert_eq!(h.sync.queue().get(&id).await.unwrap().attempts, 1);

        h.sync.set_online(false).await;
        h.sync.retry_item(&id).await.unwrap();
        assert_eq!(h.sync.queue().get(&id).await.unwrap().attempts, 0);
        assert!(matches!(
            h.sync.retry_item("nope").await,
            Err(SyncError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_inspection_outranks_pins() {
        let h = harness();
        h.sync.enqueue(pin("pin"), 1).await;
        let draft = InspectionDraft::new(Address::default());
        let draft_id = draft.id.clone();
        h.sync.enqueue(SyncPayload::Inspection(draft), 3).await;

        h.sync.set_online(true).await.unwrap().await.unwrap();
        let calls = h.api.calls();
        assert_eq!(calls[0].kind, SyncKind::Inspection);
        assert_eq!(calls[0].subject_id, draft_id);
        assert_eq!(calls[1].kind, SyncKind::PinSave);
    }

    #[tokio::test]
    async fn test_last_sync_time_restored() {
        let h = harness();
        h.sync.set_online(true).await;
        h.sync.force_sync().await.unwrap();
        let last = h.sync.status().await.last_sync_time;
        assert!(last.is_some());

        let queue = SyncQueue::restore(h.store.clone(), 3, 50).await;
        let restored = Synchronizer::restore(
            queue,
            Arc::new(FakeSubmissionApi::new()),
            Arc::new(FakeBlobUploader::new()),
        )
        .await;
        assert_eq!(restored.status().await.last_sync_time, last);
        assert!(!restored.is_online());
    }

    #[tokio::test]
    async fn test_run_loop_handles_events_until_shutdown() {
        let h = harness();
        h.sync.enqueue(pin("a"), 1).await;

        let (event_tx, event_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let mut events = h.sync.subscribe();
        let task = tokio::spawn(h.sync.clone().run(event_rx, shutdown_rx));

        event_tx.send(DeviceEvent::Online).await.unwrap();
        loop {
            if let SyncEvent::ItemSynced { .. } = events.recv().await.unwrap() {
                break;
            }
        }

        shutdown_tx.send(()).await.unwrap();
        task.await.unwrap();
        assert!(h.sync.queue().is_empty().await);
    }
}
