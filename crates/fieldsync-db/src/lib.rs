//! # fieldsync-db: Persistent Local Store for FieldSync
//!
//! Durable checkpoints for the sync queue, tombstone log, inspection archive
//! and cached device location. SQLite (via sqlx) on the device, an in-memory
//! map in tests.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FieldSync Data Flow                              │
//! │                                                                         │
//! │  SyncQueue / InspectionArchive / CachedLocationProvider                │
//! │       │  save_json(key, snapshot)         load_json(key) at startup    │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   fieldsync-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │   KvStore     │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │───►│ SqliteKvStore │    │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ MemoryKvStore │    │ 001_kv.sql   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldsync_db::{Database, DbConfig, KvStore};
//!
//! let db = Database::new(DbConfig::new("fieldsync.db")).await?;
//! let store = db.kv();
//! store.put("sync.queue", "[]").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod kv;
pub mod memory;
pub mod migrations;
pub mod pool;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use kv::{load_json, save_json, KvStore, SqliteKvStore};
pub use memory::MemoryKvStore;
pub use pool::{Database, DbConfig};
