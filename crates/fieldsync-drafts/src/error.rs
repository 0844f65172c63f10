//! # Draft Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Draft Error Categories                            │
//! │                                                                         │
//! │  DraftError                                                            │
//! │  ├── NoCurrentDraft          - mutation with nothing being authored    │
//! │  ├── DraftNotFound           - unknown archive id                      │
//! │  ├── InvalidStatusTransition - backwards status change                 │
//! │  ├── UnknownTemplate         - no damage template with that id         │
//! │  ├── MediaFile               - captured file missing or unreadable     │
//! │  ├── Location(LocationError) - coordinate acquisition failed           │
//! │  └── Sync(SyncError)         - upload collaborator failed              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Location failures never reach callers of the engine: they degrade to
//! "no location". They surface only from the provider itself. Archive
//! checkpoint failures are logged, not returned.

use std::time::Duration;
use thiserror::Error;

use fieldsync_core::{CoreError, InspectionStatus, ValidationError};
use fieldsync_sync::SyncError;

/// Result type alias for draft operations.
pub type DraftResult<T> = Result<T, DraftError>;

/// Result type alias for coordinate acquisition.
pub type LocationResult<T> = Result<T, LocationError>;

// =============================================================================
// Location Error
// =============================================================================

/// Why the device position could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user refused location access.
    #[error("Location permission denied")]
    PermissionDenied,

    /// No fix within the bounded wait.
    #[error("Location request timed out after {0:?}")]
    Timeout(Duration),

    /// The platform could not produce a position.
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// Draft Error
// =============================================================================

#[derive(Debug, Error)]
pub enum DraftError {
    /// The operation needs a current draft and there is none.
    #[error("No inspection is currently being edited")]
    NoCurrentDraft,

    /// No archived inspection with the given id.
    #[error("Inspection not found: {0}")]
    DraftNotFound(String),

    /// A status change that would move an inspection backwards.
    #[error("Cannot move inspection from {from} to {to}")]
    InvalidStatusTransition {
        from: InspectionStatus,
        to: InspectionStatus,
    },

    #[error("Unknown damage template: {0}")]
    UnknownTemplate(String),

    /// A captured file could not be read.
    #[error("Cannot use media file {path}: {reason}")]
    MediaFile { path: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

impl From<CoreError> for DraftError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidStatusTransition { from, to } => {
                DraftError::InvalidStatusTransition { from, to }
            }
            CoreError::UnknownTemplate(id) => DraftError::UnknownTemplate(id),
            CoreError::Validation(e) => DraftError::Validation(e),
        }
    }
}

impl DraftError {
    /// True for errors caused by the caller's request rather than the device.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DraftError::NoCurrentDraft
                | DraftError::DraftNotFound(_)
                | DraftError::InvalidStatusTransition { .. }
                | DraftError::UnknownTemplate(_)
                | DraftError::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_conversion() {
        let err: DraftError = CoreError::InvalidStatusTransition {
            from: InspectionStatus::Completed,
            to: InspectionStatus::UnderReview,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Cannot move inspection from completed to under-review"
        );
        assert!(err.is_user_error());
    }

    #[test]
    fn test_sync_errors_are_not_user_errors() {
        let err: DraftError = SyncError::NetworkUnavailable.into();
        assert!(!err.is_user_error());
    }
}
