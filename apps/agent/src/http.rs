//! # HTTP Collaborators
//!
//! `reqwest` implementations of the two delivery capabilities the
//! synchronizer drives.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HttpSubmissionApi                                                     │
//! │    submit_inspection ──► POST {api}/inspections   (InspectionDraft)    │
//! │    sync_media        ──► POST {api}/media/sync    (MediaItem)          │
//! │    save_pin          ──► POST {api}/pins          (MapPin)             │
//! │                                                                         │
//! │  HttpBlobUploader                                                      │
//! │    upload            ──► POST {upload_url}?quality=..  (raw bytes)     │
//! │                          ◄── { url, key, compressedSize }              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Mapping
//! - connection refused / DNS failure → `NetworkUnavailable` for the API
//!   (drain stops, no attempt counted), `UploadFailed` for the blob host
//! - timeout or unreadable response  → `UploadFailed` (attempt counted)
//! - non-2xx status                  → `Rejected { status, message }`

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use fieldsync_core::{InspectionDraft, MapPin, MediaItem};
use fieldsync_sync::{BlobUploader, SubmissionApi, SyncError, SyncResult, UploadOptions, UploadedBlob};

const USER_AGENT: &str = concat!("fieldsync-agent/", env!("CARGO_PKG_VERSION"));

/// Header carrying the original filename of an uploaded blob.
pub const FILENAME_HEADER: &str = "x-filename";

/// Longest server message kept in a `Rejected` error.
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Client Construction
// =============================================================================

/// Builds the shared HTTP client with the configured request timeout.
pub fn build_client(timeout: Duration) -> SyncResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Joins a base URL and a path without doubling or dropping the slash.
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// =============================================================================
// Error Classification
// =============================================================================

/// Maps a transport-level failure.
pub fn classify_transport(err: &reqwest::Error) -> SyncError {
    if err.is_connect() {
        SyncError::NetworkUnavailable
    } else if err.is_timeout() {
        SyncError::UploadFailed(format!("Request timed out: {err}"))
    } else {
        SyncError::UploadFailed(err.to_string())
    }
}

/// Maps a transport failure against the blob host.
///
/// Only the API's reachability says whether the device is offline; an
/// unreachable blob host fails the one upload.
pub fn classify_upload_transport(err: &reqwest::Error) -> SyncError {
    match classify_transport(err) {
        SyncError::NetworkUnavailable => {
            SyncError::UploadFailed(format!("Blob host unreachable: {err}"))
        }
        other => other,
    }
}

/// Maps a non-success status and its response body.
pub fn classify_status(status: u16, body: &str) -> SyncError {
    let mut message = body.trim().to_string();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    if message.is_empty() {
        message = "no response body".to_string();
    }
    SyncError::Rejected { status, message }
}

/// Passes a successful response through, turns anything else into an error.
async fn check(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Server rejected request");
    Err(classify_status(status.as_u16(), &body))
}

// =============================================================================
// Submission API
// =============================================================================

/// JSON submission endpoints under the configured API base URL.
#[derive(Debug, Clone)]
pub struct HttpSubmissionApi {
    client: Client,
    base_url: String,
}

impl HttpSubmissionApi {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        HttpSubmissionApi {
            client,
            base_url: base_url.into(),
        }
    }

    async fn post_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> SyncResult<()> {
        let url = endpoint(&self.base_url, path);
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionApi for HttpSubmissionApi {
    async fn submit_inspection(&self, inspection: &InspectionDraft) -> SyncResult<()> {
        self.post_json("inspections", inspection).await
    }

    async fn sync_media(&self, media: &MediaItem) -> SyncResult<()> {
        self.post_json("media/sync", media).await
    }

    async fn save_pin(&self, pin: &MapPin) -> SyncResult<()> {
        self.post_json("pins", pin).await
    }
}

// =============================================================================
// Blob Uploader
// =============================================================================

/// Posts raw file bytes to the blob endpoint.
#[derive(Debug, Clone)]
pub struct HttpBlobUploader {
    client: Client,
    upload_url: String,
}

impl HttpBlobUploader {
    pub fn new(client: Client, upload_url: impl Into<String>) -> Self {
        HttpBlobUploader {
            client,
            upload_url: upload_url.into(),
        }
    }
}

#[async_trait]
impl BlobUploader for HttpBlobUploader {
    async fn upload(&self, path: &Path, options: &UploadOptions) -> SyncResult<UploadedBlob> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            SyncError::UploadFailed(format!("Cannot read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), size = bytes.len(), "Uploading blob");

        let response = self
            .client
            .post(&self.upload_url)
            .query(&[("quality", options.quality)])
            .header(header::CONTENT_TYPE, options.content_type.as_str())
            .header(FILENAME_HEADER, options.filename.as_str())
            .body(bytes)
            .send()
            .await
            .map_err(|e| classify_upload_transport(&e))?;

        check(response)
            .await?
            .json::<UploadedBlob>()
            .await
            .map_err(|e| SyncError::UploadFailed(format!("Malformed upload response: {e}")))
    }

    fn is_configured(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_with_single_slash() {
        assert_eq!(
            endpoint("http://localhost:3000/api", "inspections"),
            "http://localhost:3000/api/inspections"
        );
        assert_eq!(
            endpoint("http://localhost:3000/api/", "/media/sync"),
            "http://localhost:3000/api/media/sync"
        );
    }

    #[test]
    fn test_classify_status_keeps_message() {
        match classify_status(422, " missing address \n") {
            SyncError::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "missing address");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_status_bounds_and_fills_message() {
        let long = "é".repeat(MAX_ERROR_BODY);
        match classify_status(500, &long) {
            SyncError::Rejected { message, .. } => assert!(message.len() <= MAX_ERROR_BODY),
            other => panic!("unexpected error: {other:?}"),
        }

        match classify_status(503, "") {
            SyncError::Rejected { message, .. } => assert_eq!(message, "no response body"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_unavailable() {
        // Port 9 on loopback is the discard service and is not listening.
        let client = build_client(Duration::from_secs(2)).unwrap();
        let api = HttpSubmissionApi::new(client, "http://127.0.0.1:9/api");
        let pin = MapPin {
            id: "p1".into(),
            location: fieldsync_core::GeoPoint { lat: 1.0, lng: 2.0 },
            description: "Downed line".into(),
            media: vec![],
            created_at: chrono::Utc::now(),
            is_urgent: false,
        };

        let err = api.save_pin(&pin).await.unwrap_err();
        assert!(matches!(err, SyncError::NetworkUnavailable));
    }

    #[tokio::test]
    async fn test_unreachable_blob_host_is_upload_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("porch.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let client = build_client(Duration::from_secs(2)).unwrap();
        let uploader = HttpBlobUploader::new(client, "http://127.0.0.1:9/upload");
        let options = UploadOptions {
            filename: "porch.jpg".into(),
            content_type: "image/jpeg".into(),
            quality: fieldsync_core::MediaQuality::Medium,
        };

        let err = uploader.upload(&path, &options).await.unwrap_err();
        match err {
            SyncError::UploadFailed(message) => assert!(message.contains("unreachable")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_upload() {
        let client = build_client(Duration::from_secs(2)).unwrap();
        let uploader = HttpBlobUploader::new(client, "http://127.0.0.1:9/upload");
        let options = UploadOptions {
            filename: "gone.jpg".into(),
            content_type: "image/jpeg".into(),
            quality: fieldsync_core::MediaQuality::Medium,
        };

        let err = uploader
            .upload(Path::new("/nonexistent/gone.jpg"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UploadFailed(_)));
        assert!(uploader.is_configured());
    }
}
