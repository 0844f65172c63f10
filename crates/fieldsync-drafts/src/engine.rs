//! # Draft Engine
//!
//! The authoritative state machine for the inspection currently being
//! authored. The current draft is written only through the operations
//! here; autosave goes through the same lock as user edits, so a save
//! always persists the latest in-memory draft.
//!
//! ## Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Draft Engine Operations                           │
//! │                                                                         │
//! │  UI Action               Engine Operation          Side Effects         │
//! │  ─────────               ────────────────          ────────────         │
//! │                                                                         │
//! │  New inspection ───────► start_new() ────────────► locate, autosave on │
//! │                                                                         │
//! │  Type address/notes ───► update_address() ───────► debounced save      │
//! │                          update_notes()                                 │
//! │                                                                         │
//! │  Capture photos ───────► add_media(files) ───────► online: upload now  │
//! │                                                     offline: preview + │
//! │                                                     enqueue (prio 2)   │
//! │                                                                         │
//! │  Drop map pin ─────────► add_map_pin() ──────────► offline: enqueue    │
//! │                                                     (prio 1)           │
//! │                                                                         │
//! │  Submit ───────────────► submit() ───────────────► archive, enqueue    │
//! │                                                     (prio 3), clear    │
//! │                                                     current, autosave  │
//! │                                                     off                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status
//! The engine only ever produces `draft` and, on submit, `submitted`. Later
//! states arrive from review collaborators through
//! [`InspectionArchive::record_review_status`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fieldsync_core::{
    find_template, new_id, Address, Coordinates, DamageTemplate, GeoPoint, InspectionDraft,
    InspectionStatus, MapPin, MediaItem, MediaQuality, MediaType, NewMapPin, OwnerInfo, SyncKind,
    SyncPayload, UploadStatus, DAMAGE_TEMPLATES, INSPECTION_PRIORITY, MEDIA_UPLOAD_PRIORITY,
    PIN_SAVE_PRIORITY,
};
use fieldsync_sync::{
    AutosaveSettings, BlobUploader, SyncEvent, Synchronizer, UploadOptions, UploadedBlob,
};

use crate::archive::{apply_confirmation, InspectionArchive};
use crate::autosave::{AutosaveScheduler, SaveDelay};
use crate::error::{DraftError, DraftResult};
use crate::location::CachedLocationProvider;
use crate::preview::PreviewArena;

// =============================================================================
// Media Input
// =============================================================================

/// A file captured on the device, handed to [`DraftEngine::add_media`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    /// MIME type, e.g. `image/jpeg`.
    pub content_type: String,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        MediaFile {
            path: path.into(),
            content_type: content_type.into(),
        }
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// A file that could not be added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Per-file outcome of [`DraftEngine::add_media`], as media ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMediaReport {
    /// Uploaded inline; already completed.
    pub uploaded: Vec<String>,
    /// Showing a local preview and queued for upload.
    pub queued: Vec<String>,
    pub failed: Vec<FailedFile>,
}

// =============================================================================
// Engine
// =============================================================================

struct EngineInner {
    current: Mutex<Option<InspectionDraft>>,
    archive: InspectionArchive,
    sync: Synchronizer,
    location: CachedLocationProvider,
    previews: PreviewArena,
    autosave: AutosaveScheduler,
    settings: AutosaveSettings,
    autosave_enabled: AtomicBool,
    last_saved: RwLock<Option<DateTime<Utc>>>,
}

/// Owns the current draft. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DraftEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for DraftEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftEngine")
            .field("autosave_enabled", &self.is_auto_save_enabled())
            .field("live_previews", &self.inner.previews.len())
            .finish_non_exhaustive()
    }
}

impl DraftEngine {
    pub fn new(
        archive: InspectionArchive,
        sync: Synchronizer,
        location: CachedLocationProvider,
        settings: AutosaveSettings,
    ) -> Self {
        DraftEngine {
            inner: Arc::new(EngineInner {
                current: Mutex::new(None),
                archive,
                sync,
                location,
                previews: PreviewArena::new(),
                autosave: AutosaveScheduler::new(),
                autosave_enabled: AtomicBool::new(settings.enabled),
                settings,
                last_saved: RwLock::new(None),
            }),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn archive(&self) -> &InspectionArchive {
        &self.inner.archive
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.inner.sync
    }

    pub fn previews(&self) -> &PreviewArena {
        &self.inner.previews
    }

    /// A copy of the draft being authored.
    pub async fn current_draft(&self) -> Option<InspectionDraft> {
        self.inner.current.lock().await.clone()
    }

    pub fn is_auto_save_enabled(&self) -> bool {
        self.inner.autosave_enabled.load(Ordering::SeqCst)
    }

    /// When the current draft was last written to the archive.
    pub async fn last_saved(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_saved.read().await
    }

    pub fn damage_templates(&self) -> &'static [DamageTemplate] {
        &DAMAGE_TEMPLATES
    }

    async fn locate(&self) -> Option<Coordinates> {
        self.inner
            .location
            .locate(self.inner.sync.is_foreground())
            .await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts a fresh draft, pre-filling coordinates when available.
    ///
    /// Replaces any current draft without saving it.
    pub async fn start_new(&self) -> InspectionDraft {
        let coordinates = self.locate().await;
        let draft = InspectionDraft::new(Address::at(coordinates.map(GeoPoint::from)));

        self.inner.autosave.cancel_debounce();
        *self.inner.current.lock().await = Some(draft.clone());
        info!(
            id = %draft.id,
            located = coordinates.is_some(),
            "Started new inspection"
        );

        if self.is_auto_save_enabled() {
            self.start_periodic_save();
        }
        draft
    }

    /// Stamps `draft_saved_at` and upserts the current draft into the archive.
    pub async fn save_draft(&self) -> DraftResult<InspectionDraft> {
        let mut current = self.inner.current.lock().await;
        let draft = current.as_mut().ok_or(DraftError::NoCurrentDraft)?;

        let now = Utc::now();
        draft.draft_saved_at = Some(now);
        let snapshot = draft.clone();

        // Held across the upsert so a concurrent submit cannot be overwritten.
        self.inner.archive.upsert(snapshot.clone()).await;
        *self.inner.last_saved.write().await = Some(now);
        debug!(id = %snapshot.id, "Draft saved");

        Ok(snapshot)
    }

    /// Submits the current draft.
    ///
    /// Marks it submitted, archives it, queues it at the highest priority,
    /// clears the current slot and stops autosave. Never waits on the
    /// network.
    pub async fn submit(&self) -> DraftResult<InspectionDraft> {
        let mut current = self.inner.current.lock().await;
        let status = current
            .as_ref()
            .map(|d| d.status)
            .ok_or(DraftError::NoCurrentDraft)?;
        if !status.can_advance_to(InspectionStatus::Submitted) {
            return Err(DraftError::InvalidStatusTransition {
                from: status,
                to: InspectionStatus::Submitted,
            });
        }

        let mut submitted = current.take().ok_or(DraftError::NoCurrentDraft)?;
        let now = Utc::now();
        submitted.status = InspectionStatus::Submitted;
        submitted.submitted_at = Some(now);
        submitted.updated_at = now;

        self.inner.autosave.cancel_all();
        self.inner.archive.upsert(submitted.clone()).await;
        drop(current);

        let item_id = self
            .inner
            .sync
            .enqueue(
                SyncPayload::Inspection(submitted.clone()),
                INSPECTION_PRIORITY,
            )
            .await;
        info!(
            id = %submitted.id,
            item_id = %item_id,
            media = submitted.media.len(),
            "Inspection submitted"
        );

        Ok(submitted)
    }

    /// Makes an archived inspection current. Autosave resumes only for
    /// drafts.
    pub async fn load_draft(&self, id: &str) -> DraftResult<InspectionDraft> {
        let draft = self
            .inner
            .archive
            .get(id)
            .await
            .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;

        self.inner.autosave.cancel_debounce();
        *self.inner.current.lock().await = Some(draft.clone());

        if self.is_auto_save_enabled() && draft.status == InspectionStatus::Draft {
            self.start_periodic_save();
        } else {
            self.inner.autosave.cancel_periodic();
        }
        debug!(id = %id, status = %draft.status, "Inspection loaded");
        Ok(draft)
    }

    /// Deletes an inspection from the archive, clearing it if current.
    pub async fn delete_draft(&self, id: &str) -> DraftResult<InspectionDraft> {
        let mut current = self.inner.current.lock().await;
        let archived = self.inner.archive.remove(id).await;

        let was_current = current.as_ref().is_some_and(|d| d.id == id);
        let active = if was_current {
            self.inner.autosave.cancel_all();
            current.take()
        } else {
            None
        };
        drop(current);

        let deleted = active
            .or(archived)
            .ok_or_else(|| DraftError::DraftNotFound(id.to_string()))?;
        for media in &deleted.media {
            self.inner.previews.release(&media.id);
        }
        info!(id = %id, was_current, "Inspection deleted");
        Ok(deleted)
    }

    /// Archived inspections still in `draft` status.
    pub async fn list_drafts(&self) -> Vec<InspectionDraft> {
        self.inner.archive.list_drafts().await
    }

    /// Drops the current draft without saving and stops autosave.
    pub async fn clear_current_draft(&self) -> Option<InspectionDraft> {
        self.inner.autosave.cancel_all();
        self.inner.current.lock().await.take()
    }

    // =========================================================================
    // Autosave
    // =========================================================================

    /// Turns autosave on and (re)starts the periodic timer.
    pub fn enable_auto_save(&self) {
        self.inner.autosave_enabled.store(true, Ordering::SeqCst);
        self.start_periodic_save();
        debug!(
            interval_secs = self.inner.settings.interval_secs,
            "Autosave enabled"
        );
    }

    /// Turns autosave off; no timer fires after this returns.
    pub fn disable_auto_save(&self) {
        self.inner.autosave_enabled.store(false, Ordering::SeqCst);
        self.inner.autosave.cancel_all();
        debug!("Autosave disabled");
    }

    fn start_periodic_save(&self) {
        let engine = Arc::downgrade(&self.inner);
        self.inner
            .autosave
            .start_periodic(self.inner.settings.interval(), move || {
                let inner = engine.upgrade()?;
                Some(async move { DraftEngine { inner }.autosave().await })
            });
    }

    fn schedule_save(&self, delay: SaveDelay) {
        if !self.is_auto_save_enabled() {
            return;
        }
        let engine = Arc::downgrade(&self.inner);
        self.inner
            .autosave
            .debounce(delay.duration(&self.inner.settings), async move {
                if let Some(inner) = engine.upgrade() {
                    DraftEngine { inner }.autosave().await;
                }
            });
    }

    async fn autosave(&self) {
        match self.save_draft().await {
            Ok(draft) => debug!(id = %draft.id, "Autosaved"),
            Err(DraftError::NoCurrentDraft) => {}
            Err(e) => warn!(error = %e, "Autosave failed"),
        }
    }

    // =========================================================================
    // Field Mutations
    // =========================================================================

    /// Applies `change` to the current draft. `change` returns whether it
    /// modified anything; only then is the draft touched and a save
    /// scheduled.
    async fn mutate(
        &self,
        delay: SaveDelay,
        change: impl FnOnce(&mut InspectionDraft) -> bool,
    ) -> DraftResult<bool> {
        let changed = {
            let mut current = self.inner.current.lock().await;
            let draft = current.as_mut().ok_or(DraftError::NoCurrentDraft)?;
            let changed = change(draft);
            if changed {
                draft.touch();
            }
            changed
        };
        if changed {
            self.schedule_save(delay);
        }
        Ok(changed)
    }

    pub async fn update_address(&self, address: Address) -> DraftResult<()> {
        self.mutate(SaveDelay::Standard, |d| {
            d.address = address;
            true
        })
        .await
        .map(|_| ())
    }

    pub async fn update_notes(&self, notes: impl Into<String>) -> DraftResult<()> {
        let notes = notes.into();
        self.mutate(SaveDelay::Text, |d| {
            d.notes = notes;
            true
        })
        .await
        .map(|_| ())
    }

    /// Flips the urgent flag and returns the new value.
    pub async fn toggle_urgent(&self) -> DraftResult<bool> {
        let mut urgent = false;
        self.mutate(SaveDelay::Standard, |d| {
            d.is_urgent = !d.is_urgent;
            urgent = d.is_urgent;
            true
        })
        .await?;
        Ok(urgent)
    }

    /// Moves to `step`; `total_steps` never shrinks and earlier steps are
    /// recorded as completed once.
    pub async fn set_step(&self, step: u32) -> DraftResult<()> {
        self.mutate(SaveDelay::Standard, |d| {
            d.progress.set_step(step);
            true
        })
        .await
        .map(|_| ())
    }

    /// Merges a damage template's tags into the draft as a set union.
    pub async fn apply_damage_template(&self, template_id: &str) -> DraftResult<()> {
        let template = find_template(template_id)
            .ok_or_else(|| DraftError::UnknownTemplate(template_id.to_string()))?;
        self.mutate(SaveDelay::Standard, |d| {
            let before = d.tags.len();
            d.merge_tags(template.common_tags.iter().copied());
            d.tags.len() != before
        })
        .await
        .map(|_| ())
    }

    // =========================================================================
    // Media
    // =========================================================================

    /// Attaches captured files to the current draft.
    ///
    /// Online with a configured uploader, each file is uploaded now; a
    /// failed upload falls back to the offline path. Offline, the file gets
    /// a local preview and a media-upload item is queued at priority 2. A
    /// file that cannot be read is reported and the rest still proceed.
    pub async fn add_media(
        &self,
        files: Vec<MediaFile>,
        owner_info: Option<OwnerInfo>,
    ) -> DraftResult<AddMediaReport> {
        let draft_id = self
            .inner
            .current
            .lock()
            .await
            .as_ref()
            .map(|d| d.id.clone())
            .ok_or(DraftError::NoCurrentDraft)?;

        let location = self.locate().await;
        let uploader = self.inner.sync.uploader();
        let mut report = AddMediaReport::default();
        let mut items = Vec::with_capacity(files.len());

        for file in &files {
            match self
                .prepare_media(file, owner_info.as_ref(), location, uploader.as_ref())
                .await
            {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Skipping media file");
                    report.failed.push(FailedFile {
                        path: file.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        {
            let mut current = self.inner.current.lock().await;
            match current.as_mut() {
                Some(draft) if draft.id == draft_id => {
                    draft.media.extend(items.iter().cloned());
                    draft.touch();
                }
                _ => {
                    for item in &items {
                        self.inner.previews.release(&item.id);
                    }
                    return Err(DraftError::NoCurrentDraft);
                }
            }
        }

        for item in items {
            if item.is_pending() {
                report.queued.push(item.id.clone());
                self.inner
                    .sync
                    .enqueue(SyncPayload::MediaUpload(item), MEDIA_UPLOAD_PRIORITY)
                    .await;
            } else {
                report.uploaded.push(item.id);
            }
        }

        info!(
            draft = %draft_id,
            uploaded = report.uploaded.len(),
            queued = report.queued.len(),
            failed = report.failed.len(),
            "Media added"
        );
        self.schedule_save(SaveDelay::Standard);
        Ok(report)
    }

    async fn prepare_media(
        &self,
        file: &MediaFile,
        owner_info: Option<&OwnerInfo>,
        location: Option<Coordinates>,
        uploader: &dyn BlobUploader,
    ) -> DraftResult<MediaItem> {
        let media_file_error = |reason: String| DraftError::MediaFile {
            path: file.path.display().to_string(),
            reason,
        };
        let metadata = tokio::fs::metadata(&file.path)
            .await
            .map_err(|e| media_file_error(e.to_string()))?;
        if !metadata.is_file() {
            return Err(media_file_error("not a regular file".into()));
        }

        let mut item = MediaItem {
            id: new_id(),
            media_type: MediaType::from_content_type(&file.content_type),
            url: String::new(),
            thumbnail_url: String::new(),
            filename: file.filename(),
            size: metadata.len(),
            compressed_size: None,
            captured_at: Utc::now(),
            location,
            tags: Vec::new(),
            owner_info: owner_info.cloned(),
            upload_status: UploadStatus::Pending,
            quality: MediaQuality::Medium,
            local_path: Some(file.path.to_string_lossy().into_owned()),
        };

        if self.inner.sync.is_online() && uploader.is_configured() {
            let mut options = UploadOptions::for_media(&item);
            options.content_type = file.content_type.clone();
            match uploader.upload(&file.path, &options).await {
                Ok(blob) => {
                    apply_confirmation(&mut item, &blob);
                    debug!(media_id = %item.id, url = %item.url, "Media uploaded inline");
                    return Ok(item);
                }
                Err(e) => {
                    warn!(
                        filename = %item.filename,
                        error = %e,
                        "Inline upload failed, queueing media"
                    );
                }
            }
        }

        let preview = self.inner.previews.allocate(&item.id, &file.path);
        item.url = preview.url();
        item.thumbnail_url = preview.url();
        Ok(item)
    }

    /// Removes a media item, releasing its preview and any queued upload.
    /// Returns false if no such item exists.
    pub async fn remove_media(&self, media_id: &str) -> DraftResult<bool> {
        let removed = self
            .mutate(SaveDelay::Quick, |d| {
                let before = d.media.len();
                d.media.retain(|m| m.id != media_id);
                d.media.len() != before
            })
            .await?;
        if !removed {
            return Ok(false);
        }

        self.inner.previews.release(media_id);
        for item in self.inner.sync.pending_by_kind(SyncKind::MediaUpload).await {
            if item.payload.subject_id() == media_id {
                self.inner.sync.remove(&item.id).await;
            }
        }
        Ok(true)
    }

    pub async fn update_media_tags(&self, media_id: &str, tags: Vec<String>) -> DraftResult<bool> {
        self.mutate(SaveDelay::Standard, |d| match d.media_mut(media_id) {
            Some(media) => {
                media.tags = tags;
                true
            }
            None => false,
        })
        .await
    }

    pub async fn update_media_owner_info(
        &self,
        media_id: &str,
        owner_info: OwnerInfo,
    ) -> DraftResult<bool> {
        self.mutate(SaveDelay::Standard, |d| match d.media_mut(media_id) {
            Some(media) => {
                media.owner_info = Some(owner_info);
                true
            }
            None => false,
        })
        .await
    }

    /// Points a pending media item at its uploaded copy, in the current
    /// draft and in the archive, and releases its local preview.
    ///
    /// Returns false if no draft holds the item.
    pub async fn confirm_media_upload(&self, media_id: &str, blob: &UploadedBlob) -> bool {
        let in_current = {
            let mut current = self.inner.current.lock().await;
            match current.as_mut() {
                Some(draft) => match draft.media_mut(media_id) {
                    Some(media) => {
                        apply_confirmation(media, blob);
                        draft.touch();
                        true
                    }
                    None => false,
                },
                None => false,
            }
        };

        let archived = self.inner.archive.confirm_media(media_id, blob).await;
        self.inner.previews.release(media_id);

        if in_current {
            self.schedule_save(SaveDelay::Standard);
        }
        debug!(media_id = %media_id, in_current, archived, "Media upload confirmed");
        in_current || archived > 0
    }

    /// Follows the synchronizer's `MediaConfirmed` events until it shuts
    /// down or the engine is dropped.
    pub fn follow_sync_events(&self) -> JoinHandle<()> {
        let mut events = self.inner.sync.subscribe();
        let engine = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SyncEvent::MediaConfirmed { media_id, blob }) => {
                        let Some(inner) = engine.upgrade() else {
                            break;
                        };
                        DraftEngine { inner }
                            .confirm_media_upload(&media_id, &blob)
                            .await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Draft engine lagged behind sync events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Stopped following sync events");
        })
    }

    // =========================================================================
    // Map Pins
    // =========================================================================

    /// Adds a pin. Offline, the pin is also queued at priority 1.
    pub async fn add_map_pin(&self, pin: NewMapPin) -> DraftResult<MapPin> {
        let pin = pin.into_pin();
        self.mutate(SaveDelay::Standard, |d| {
            d.map_pins.push(pin.clone());
            true
        })
        .await?;

        if !self.inner.sync.is_online() {
            self.inner
                .sync
                .enqueue(SyncPayload::PinSave(pin.clone()), PIN_SAVE_PRIORITY)
                .await;
        }
        Ok(pin)
    }

    /// Removes a pin along with its queued save, if any.
    pub async fn remove_map_pin(&self, pin_id: &str) -> DraftResult<bool> {
        let removed = self
            .mutate(SaveDelay::Standard, |d| {
                let before = d.map_pins.len();
                d.map_pins.retain(|p| p.id != pin_id);
                d.map_pins.len() != before
            })
            .await?;
        if !removed {
            return Ok(false);
        }

        for item in self.inner.sync.pending_by_kind(SyncKind::PinSave).await {
            if item.payload.subject_id() == pin_id {
                self.inner.sync.remove(&item.id).await;
            }
        }
        Ok(true)
    }
}
