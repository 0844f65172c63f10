//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Delivery     │  │     Local state         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  NetworkUnavail │  │  PersistenceWrite       │ │
//! │  │  MissingDeviceId│  │  UploadFailed   │  │  PersistenceRead        │ │
//! │  │  InvalidUrl     │  │  Rejected       │  │  ItemNotFound           │ │
//! │  │  ConfigLoad/Save│  │  PermanentSync  │  │  Internal               │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Permission and validation failures belong to the layers that can hit
//! them: `fieldsync_drafts::LocationError` and `fieldsync_core::ValidationError`.

use thiserror::Error;

use fieldsync_core::Tombstone;
use fieldsync_db::StoreError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID.
    #[error("Device ID not configured. Run initial setup first.")]
    MissingDeviceId,

    /// Invalid API or upload URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Delivery Errors
    // =========================================================================
    /// The device is offline.
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// A blob upload or endpoint call failed; the item will be retried.
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The server refused the request outright.
    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// An item exhausted its attempts and was moved to the tombstone log.
    #[error("Sync item {id} failed permanently after {attempts} attempts: {last_error}")]
    PermanentSyncFailure {
        id: String,
        attempts: u32,
        last_error: String,
    },

    /// No blob upload endpoint is configured.
    #[error("Blob upload is not configured")]
    UploaderNotConfigured,

    // =========================================================================
    // Local State Errors
    // =========================================================================
    /// A checkpoint write failed. Non-fatal; in-memory state is kept.
    #[error("Persistence write failed: {0}")]
    PersistenceWriteFailure(String),

    /// A checkpoint could not be read or decoded.
    #[error("Persistence read failed: {0}")]
    PersistenceReadFailure(String),

    /// No queued item has the given id.
    #[error("Sync item not found: {0}")]
    ItemNotFound(String),

    /// Internal synchronizer error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WriteFailed { .. } => SyncError::PersistenceWriteFailure(err.to_string()),
            other => SyncError::PersistenceReadFailure(other.to_string()),
        }
    }
}

impl From<&Tombstone> for SyncError {
    fn from(tombstone: &Tombstone) -> Self {
        SyncError::PermanentSyncFailure {
            id: tombstone.item.id.clone(),
            attempts: tombstone.item.attempts,
            last_error: tombstone.last_error.clone(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Internal(format!("serialization: {}", err))
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if a later drain cycle may succeed where this one failed.
    ///
    /// ## Retryable Errors
    /// - Network loss and timeouts
    /// - Failed uploads
    /// - Server errors (5xx) and throttling (429)
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Client errors (4xx) from the server
    /// - Exhausted items
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::NetworkUnavailable | SyncError::UploadFailed(_) => true,
            SyncError::Rejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::UploaderNotConfigured
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::NetworkUnavailable.is_retryable());
        assert!(SyncError::UploadFailed("timeout".into()).is_retryable());
        assert!(SyncError::Rejected {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());

        assert!(!SyncError::Rejected {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::MissingDeviceId.is_retryable());
    }

    #[test]
    fn test_store_write_failure_maps_to_persistence() {
        let err: SyncError = StoreError::write_failed("sync.queue", "disk full").into();
        assert!(matches!(err, SyncError::PersistenceWriteFailure(_)));
        assert!(err.to_string().contains("sync.queue"));
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::PermanentSyncFailure {
            id: "abc-123".into(),
            attempts: 3,
            last_error: "boom".into(),
        };
        assert!(err.to_string().contains("abc-123"));
        assert!(err.to_string().contains("3 attempts"));
    }
}
