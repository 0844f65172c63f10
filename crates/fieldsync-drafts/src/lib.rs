//! # fieldsync-drafts: Inspection Draft Engine for FieldSync
//!
//! Owns the inspection currently being authored, autosaves it, and hands it
//! to the sync queue on submit. Keeps every saved draft and submitted
//! inspection in a durable archive.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Draft Layer Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                        DraftEngine                               │  │
//! │  │                                                                  │  │
//! │  │  current draft (one at a time)    AutosaveScheduler             │  │
//! │  │  start_new / mutate / submit      periodic 30s + debounced      │  │
//! │  └──────┬───────────────┬───────────────────┬───────────────────────┘  │
//! │         │               │                   │                          │
//! │         ▼               ▼                   ▼                          │
//! │  ┌─────────────┐ ┌──────────────┐ ┌──────────────────────────────┐    │
//! │  │ Inspection  │ │ Cached       │ │ Synchronizer (fieldsync-sync)│    │
//! │  │ Archive     │ │ Location     │ │                              │    │
//! │  │             │ │ Provider     │ │ submit       → priority 3    │    │
//! │  │ drafts +    │ │              │ │ offline media → priority 2   │    │
//! │  │ submitted   │ │ 10s/15s wait │ │ offline pin   → priority 1   │    │
//! │  └─────────────┘ └──────────────┘ └──────────────────────────────┘    │
//! │                                                                         │
//! │  PreviewArena: local previews of queued media, released on confirm    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldsync_drafts::{CachedLocationProvider, DraftEngine, InspectionArchive};
//!
//! let archive = InspectionArchive::restore(store.clone()).await;
//! let location = CachedLocationProvider::restore(gps, store, config.location.clone()).await;
//! let engine = DraftEngine::new(archive, sync, location, config.autosave.clone());
//!
//! engine.start_new().await;
//! engine.update_notes("Water stain on ceiling").await?;
//! engine.submit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod archive;
pub mod autosave;
pub mod engine;
pub mod error;
pub mod fake;
pub mod location;
pub mod preview;

// =============================================================================
// Re-exports
// =============================================================================

pub use archive::{InspectionArchive, InspectionFilter};
pub use autosave::{AutosaveScheduler, SaveDelay};
pub use engine::{AddMediaReport, DraftEngine, FailedFile, MediaFile};
pub use error::{DraftError, DraftResult, LocationError, LocationResult};
pub use location::{CachedLocationProvider, CoordinateProvider, LocationOptions, NoLocation};
pub use preview::{PreviewArena, PreviewHandle};
