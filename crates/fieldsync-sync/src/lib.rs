//! # fieldsync-sync: Offline Sync Queue for FieldSync
//!
//! Guarantees that work produced offline eventually reaches the server
//! exactly once, in priority order, without being lost across restarts.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    Synchronizer (orchestrator)                    │  │
//! │  │                                                                  │  │
//! │  │  Online/offline/foreground signals, force-sync, run loop         │  │
//! │  │  One drain cycle at a time, snapshot ordered by priority         │  │
//! │  └─────────────┬──────────────────────────────┬─────────────────────┘  │
//! │                │                              │                         │
//! │                ▼                              ▼                         │
//! │  ┌────────────────────────┐     ┌──────────────────────────────────┐   │
//! │  │ SyncQueue              │     │ Collaborators (transport.rs)     │   │
//! │  │                        │     │                                  │   │
//! │  │ enqueue/remove/        │     │ SubmissionApi: inspection,       │   │
//! │  │ record_attempt_failure │     │   media-sync, pin-save           │   │
//! │  │ TombstoneLog           │     │ BlobUploader: file upload        │   │
//! │  │ checkpoint → KvStore   │     │                                  │   │
//! │  └────────────────────────┘     └──────────────────────────────────┘   │
//! │                                                                         │
//! │  EVENTS (subscribe()):                                                 │
//! │  • Status            - every status change                             │
//! │  • ItemSynced        - an item was delivered                           │
//! │  • PermanentFailure  - an item exhausted its attempts                  │
//! │  • MediaConfirmed    - a queued media file has a remote URL            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldsync_sync::{FieldSyncConfig, SyncQueue, Synchronizer};
//!
//! let config = FieldSyncConfig::load_or_default(None);
//! let queue = SyncQueue::restore(store, config.sync.max_attempts, config.sync.tombstone_limit).await;
//! let sync = Synchronizer::restore(queue, api, uploader).await;
//!
//! let mut events = sync.subscribe();
//! sync.set_online(true).await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod events;
pub mod fake;
pub mod queue;
pub mod synchronizer;
pub mod tombstone;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AutosaveSettings, FieldSyncConfig, LocationSettings, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use events::{DeviceEvent, SyncEvent};
pub use queue::{AttemptOutcome, SyncQueue};
pub use synchronizer::{DrainOutcome, Synchronizer};
pub use tombstone::TombstoneLog;
pub use transport::{
    BlobUploader, SubmissionApi, UnconfiguredUploader, UploadOptions, UploadedBlob,
};
