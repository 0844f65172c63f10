//! # Delivery Collaborators
//!
//! The network capabilities the synchronizer drives. Implementations live at
//! the composition root (HTTP) and in [`crate::fake`] (tests).
//!
//! ## Dispatch by Kind
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SyncPayload::Inspection(draft) ──► SubmissionApi::submit_inspection   │
//! │  SyncPayload::PinSave(pin)      ──► SubmissionApi::save_pin            │
//! │  SyncPayload::MediaUpload(m)                                           │
//! │      │ m.local_path is Some                                            │
//! │      ├──────────────► BlobUploader::upload ──► url/key                 │
//! │      ▼                                                                 │
//! │  SubmissionApi::sync_media(m with remote url)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call must be safely repeatable: a failed attempt is retried on the
//! next drain trigger with the same payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use fieldsync_core::{InspectionDraft, MapPin, MediaItem, MediaQuality, MediaType};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Blob Upload
// =============================================================================

/// Options passed along with a file to the blob store.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub filename: String,
    pub content_type: String,
    /// Compression level requested for images.
    pub quality: MediaQuality,
}

impl UploadOptions {
    /// Derives upload options from a media descriptor.
    pub fn for_media(media: &MediaItem) -> Self {
        let content_type = match media.media_type {
            MediaType::Photo => "image/jpeg",
            MediaType::Video => "video/mp4",
        };
        UploadOptions {
            filename: media.filename.clone(),
            content_type: content_type.to_string(),
            quality: media.quality,
        }
    }
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedBlob {
    pub url: String,
    pub key: String,
    pub compressed_size: Option<u64>,
}

/// Opaque file upload capability.
#[async_trait]
pub trait BlobUploader: Send + Sync + 'static {
    /// Uploads the file at `path`. Failure is reported as an error, never as
    /// a malformed success.
    async fn upload(&self, path: &Path, options: &UploadOptions) -> SyncResult<UploadedBlob>;

    /// False when no upload endpoint exists; callers queue media instead.
    fn is_configured(&self) -> bool;
}

#[async_trait]
impl<T: BlobUploader + ?Sized> BlobUploader for Arc<T> {
    async fn upload(&self, path: &Path, options: &UploadOptions) -> SyncResult<UploadedBlob> {
        (**self).upload(path, options).await
    }

    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }
}

/// Stand-in used when no upload endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredUploader;

#[async_trait]
impl BlobUploader for UnconfiguredUploader {
    async fn upload(&self, _path: &Path, _options: &UploadOptions) -> SyncResult<UploadedBlob> {
        Err(SyncError::UploaderNotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

// =============================================================================
// Submission Endpoints
// =============================================================================

/// The three server operations. Each either succeeds or fails as a whole.
#[async_trait]
pub trait SubmissionApi: Send + Sync + 'static {
    /// `POST inspection`
    async fn submit_inspection(&self, inspection: &InspectionDraft) -> SyncResult<()>;

    /// `POST media-sync`
    async fn sync_media(&self, media: &MediaItem) -> SyncResult<()>;

    /// `POST pin-save`
    async fn save_pin(&self, pin: &MapPin) -> SyncResult<()>;
}

#[async_trait]
impl<T: SubmissionApi + ?Sized> SubmissionApi for Arc<T> {
    async fn submit_inspection(&self, inspection: &InspectionDraft) -> SyncResult<()> {
        (**self).submit_inspection(inspection).await
    }

    async fn sync_media(&self, media: &MediaItem) -> SyncResult<()> {
        (**self).sync_media(media).await
    }

    async fn save_pin(&self, pin: &MapPin) -> SyncResult<()> {
        (**self).save_pin(pin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fieldsync_core::UploadStatus;

    fn video() -> MediaItem {
        MediaItem {
            id: "m1".into(),
            media_type: MediaType::Video,
            url: String::new(),
            thumbnail_url: String::new(),
            filename: "walkthrough.mp4".into(),
            size: 4096,
            compressed_size: None,
            captured_at: Utc::now(),
            location: None,
            tags: vec![],
            owner_info: None,
            upload_status: UploadStatus::Pending,
            quality: MediaQuality::High,
            local_path: Some("/tmp/walkthrough.mp4".into()),
        }
    }

    #[test]
    fn test_upload_options_for_media() {
        let options = UploadOptions::for_media(&video());
        assert_eq!(options.content_type, "video/mp4");
        assert_eq!(options.filename, "walkthrough.mp4");
        assert_eq!(options.quality, MediaQuality::High);
    }

    #[tokio::test]
    async fn test_unconfigured_uploader_refuses() {
        let uploader = UnconfiguredUploader;
        assert!(!uploader.is_configured());

        let result = uploader
            .upload(Path::new("/tmp/x.jpg"), &UploadOptions::for_media(&video()))
            .await;
        assert!(matches!(result, Err(SyncError::UploaderNotConfigured)));
    }
}
