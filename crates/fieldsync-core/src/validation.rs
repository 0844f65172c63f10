//! # Validation Module
//!
//! Submission checks for inspections.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI layer                                                     │
//! │  ├── Calls validate_submission() before enabling "Submit"              │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Draft Engine                                                 │
//! │  └── submit() trusts the UI and always succeeds locally                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Server                                                       │
//! │  └── Rejections surface as delivery failures of the sync item          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::InspectionDraft;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text note accepted.
pub const MAX_NOTES_LENGTH: usize = 10_000;

/// Checks that a draft is complete enough to submit.
///
/// ## Rules
/// - An address must have been entered
/// - At least one photo or video must be attached
/// - Notes must not exceed [`MAX_NOTES_LENGTH`] characters
///
/// ## Example
/// ```rust
/// use fieldsync_core::validation::validate_submission;
/// use fieldsync_core::InspectionDraft;
///
/// let draft = InspectionDraft::new(Default::default());
/// assert!(validate_submission(&draft).is_err());
/// ```
pub fn validate_submission(draft: &InspectionDraft) -> ValidationResult<()> {
    if draft.address.is_blank() {
        return Err(ValidationError::Required {
            field: "address".to_string(),
        });
    }

    if draft.media.is_empty() {
        return Err(ValidationError::Required {
            field: "media".to_string(),
        });
    }

    if draft.notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LENGTH,
        });
    }

    Ok(())
}

/// Validates a user-entered tag (non-blank after trimming).
pub fn validate_tag(tag: &str) -> ValidationResult<()> {
    if tag.trim().is_empty() {
        return Err(ValidationError::InvalidFormat {
            field: "tag".to_string(),
            reason: "must not be blank".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, MediaItem, MediaQuality, MediaType, UploadStatus};
    use chrono::Utc;

    fn photo() -> MediaItem {
        MediaItem {
            id: "m1".into(),
            media_type: MediaType::Photo,
            url: "https://cdn.example/m1.jpg".into(),
            thumbnail_url: "https://cdn.example/m1.jpg".into(),
            filename: "m1.jpg".into(),
            size: 1024,
            compressed_size: None,
            captured_at: Utc::now(),
            location: None,
            tags: vec![],
            owner_info: None,
            upload_status: UploadStatus::Completed,
            quality: MediaQuality::Medium,
            local_path: None,
        }
    }

    #[test]
    fn test_missing_address() {
        let draft = InspectionDraft::new(Address::default());
        let err = validate_submission(&draft).unwrap_err();
        assert_eq!(err.to_string(), "address is required");
    }

    #[test]
    fn test_missing_media() {
        let mut draft = InspectionDraft::new(Address::default());
        draft.address.formatted = "12 Elm St, Springfield".into();
        let err = validate_submission(&draft).unwrap_err();
        assert_eq!(err.to_string(), "media is required");
    }

    #[test]
    fn test_complete_draft_passes() {
        let mut draft = InspectionDraft::new(Address::default());
        draft.address.street = "12 Elm St".into();
        draft.media.push(photo());
        assert!(validate_submission(&draft).is_ok());
    }

    #[test]
    fn test_blank_tag_rejected() {
        assert!(validate_tag("  ").is_err());
        assert!(validate_tag("Mold").is_ok());
    }
}
