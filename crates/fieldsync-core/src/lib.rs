//! # fieldsync-core: Pure Domain Model for FieldSync
//!
//! Field workers capture property-damage inspections on devices with
//! unreliable connectivity. This crate holds the types every other layer
//! agrees on: the inspection draft being authored, its media and map pins,
//! and the sync items that carry finished work to the server.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FieldSync Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI layer (out of scope)                      │   │
//! │  │    Address ──► Media ──► Map pins ──► Review & submit           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   fieldsync-drafts (Draft Engine, Archive, autosave)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ submit / offline mutations             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   fieldsync-sync (Sync Queue, Synchronizer)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   fieldsync-db (persistent key-value checkpoints)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │   ★ fieldsync-core (THIS CRATE): types shared by all of the above ★    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Inspection, media, pin and sync item types
//! - [`templates`] - Fixed damage templates applied to draft tags
//! - [`error`] - Domain error types
//! - [`validation`] - Submission checks used by the UI layer
//!
//! ## Example Usage
//!
//! ```rust
//! use fieldsync_core::{InspectionDraft, SyncItem, SyncPayload};
//!
//! let draft = InspectionDraft::new(Default::default());
//! let item = SyncItem::new(SyncPayload::Inspection(draft), 3, 3);
//!
//! assert_eq!(item.attempts, 0);
//! assert_eq!(item.kind().to_string(), "inspection");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod templates;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use templates::{find_template, DamageTemplate, DAMAGE_TEMPLATES};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default delivery attempts before a sync item is declared permanently failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Queue priority of a submitted inspection.
///
/// ## Business Reason
/// A submitted inspection references its media by id, so it is reconciled
/// ahead of individual media and pin items.
pub const INSPECTION_PRIORITY: i32 = 3;

/// Queue priority of a media item captured while offline.
pub const MEDIA_UPLOAD_PRIORITY: i32 = 2;

/// Queue priority of a map pin added while offline.
pub const PIN_SAVE_PRIORITY: i32 = 1;

/// Number of authoring steps a new draft starts with.
pub const DEFAULT_TOTAL_STEPS: u32 = 3;

/// Highest step an inspection can reach; larger requests are clamped.
pub const MAX_STEPS: u32 = 32;
