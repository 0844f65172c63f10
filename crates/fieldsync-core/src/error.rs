//! # Error Types
//!
//! Domain-specific error types for fieldsync-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fieldsync-core errors (this file)                                     │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  fieldsync-db         └── StoreError  - Persistence failures           │
//! │  fieldsync-sync       └── SyncError   - Delivery / network failures    │
//! │  fieldsync-drafts     └── DraftError  - Draft lifecycle failures       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::InspectionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status change that would move an inspection backwards.
    ///
    /// ## When This Occurs
    /// - A review collaborator reports `under-review` for an inspection
    ///   that is already `completed`
    /// - A stale status is replayed after a newer one was persisted
    #[error("Cannot move inspection from {from} to {to}")]
    InvalidStatusTransition {
        from: InspectionStatus,
        to: InspectionStatus,
    },

    /// No damage template with the given id.
    #[error("Unknown damage template: {0}")]
    UnknownTemplate(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the UI layer before submission; the draft engine does not
/// re-validate.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., blank tag).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
