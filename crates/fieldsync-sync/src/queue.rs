//! # Sync Queue
//!
//! The durable, priority-ordered set of pending work items.
//!
//! ## Queue Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SyncQueue (in memory)                           │
//! │                                                                         │
//! │   idx │ kind         │ priority │ attempts │ enqueued                   │
//! │   ────┼──────────────┼──────────┼──────────┼─────────                   │
//! │   0   │ inspection   │ 3        │ 0        │ 09:12:04                   │
//! │   1   │ media-upload │ 2        │ 1        │ 09:10:51                   │
//! │   2   │ media-upload │ 2        │ 0        │ 09:11:30                   │
//! │   3   │ pin-save     │ 1        │ 0        │ 09:09:02                   │
//! │                                                                         │
//! │   Sorted by descending priority; ties keep insertion order.            │
//! │                                                                         │
//! │   Every mutation ──► save_json("sync.queue", items)                    │
//! │   Exhaustion     ──► TombstoneLog ──► save_json("sync.tombstones")     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//! The in-memory queue is the source of truth for the running process. A
//! failed checkpoint write is logged and the change is kept; the persisted
//! copy is only read back at startup.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use fieldsync_core::{SyncItem, SyncKind, SyncPayload, Tombstone, DEFAULT_MAX_ATTEMPTS};
use fieldsync_db::kv::{SYNC_QUEUE_KEY, TOMBSTONES_KEY};
use fieldsync_db::{load_json, save_json, KvStore};

use crate::error::{SyncError, SyncResult};
use crate::tombstone::TombstoneLog;

/// Result of recording a failed delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The item stays queued for the next trigger.
    Retry { attempts: u32, max_attempts: u32 },
    /// The item hit its ceiling and was moved to the tombstone log.
    PermanentFailure(Tombstone),
    /// No item with that id is queued.
    NotFound,
}

struct QueueState {
    items: Vec<SyncItem>,
    tombstones: TombstoneLog,
}

/// Durable priority queue of [`SyncItem`]s.
pub struct SyncQueue {
    store: Arc<dyn KvStore>,
    state: Mutex<QueueState>,
    max_attempts: u32,
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl SyncQueue {
    /// Creates an empty queue. Nothing is read from `store`.
    pub fn new(store: Arc<dyn KvStore>, max_attempts: u32, tombstone_limit: usize) -> Self {
        SyncQueue {
            store,
            state: Mutex::new(QueueState {
                items: Vec::new(),
                tombstones: TombstoneLog::new(tombstone_limit),
            }),
            max_attempts: if max_attempts == 0 {
                DEFAULT_MAX_ATTEMPTS
            } else {
                max_attempts
            },
        }
    }

    /// Rebuilds the queue and tombstone log from their last checkpoints.
    ///
    /// An unreadable checkpoint is logged and treated as empty.
    pub async fn restore(
        store: Arc<dyn KvStore>,
        max_attempts: u32,
        tombstone_limit: usize,
    ) -> Self {
        let queue = SyncQueue::new(store, max_attempts, tombstone_limit);

        let items: Vec<SyncItem> = match load_json(queue.store.as_ref(), SYNC_QUEUE_KEY).await {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Queue checkpoint unreadable, starting empty");
                Vec::new()
            }
        };

        let tombstones: Vec<Tombstone> =
            match load_json(queue.store.as_ref(), TOMBSTONES_KEY).await {
                Ok(entries) => entries.unwrap_or_default(),
                Err(e) => {
                    warn!(error = %e, "Tombstone checkpoint unreadable, starting empty");
                    Vec::new()
                }
            };

        {
            let mut state = queue.state.lock().await;
            for item in items {
                if state.items.iter().any(|existing| existing.id == item.id) {
                    warn!(id = %item.id, "Dropping duplicate item from checkpoint");
                    continue;
                }
                state.items.push(item);
            }
            sort_by_priority(&mut state.items);
            state.tombstones = TombstoneLog::from_entries(tombstones, tombstone_limit);

            info!(
                pending = state.items.len(),
                tombstones = state.tombstones.len(),
                "Sync queue restored"
            );
        }

        queue
    }

    /// The store checkpoints are written to.
    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Queues `payload` and returns the new item's id.
    ///
    /// The kind is carried by the payload variant. The checkpoint is written
    /// before this returns.
    pub async fn enqueue(&self, payload: SyncPayload, priority: i32) -> String {
        let item = SyncItem::new(payload, priority, self.max_attempts);
        let id = item.id.clone();

        let mut state = self.state.lock().await;
        debug!(
            id = %id,
            kind = %item.kind(),
            priority,
            "Enqueuing sync item"
        );
        state.items.push(item);
        sort_by_priority(&mut state.items);
        self.checkpoint_items(&state).await;

        id
    }

    /// Removes the item; returns false if it was not queued.
    pub async fn remove(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|item| item.id != id);

        if state.items.len() == before {
            return false;
        }

        debug!(id = %id, "Removed sync item");
        self.checkpoint_items(&state).await;
        true
    }

    /// Counts a failed attempt against the item.
    ///
    /// Once `attempts >= max_attempts` the item leaves the queue and a
    /// tombstone is returned, so exhaustion is always reported.
    pub async fn record_attempt_failure(&self, id: &str, error: &str) -> AttemptOutcome {
        let mut state = self.state.lock().await;

        let Some(index) = state.items.iter().position(|item| item.id == id) else {
            return AttemptOutcome::NotFound;
        };

        let item = &mut state.items[index];
        item.attempts += 1;
        item.last_attempt_at = Some(Utc::now());
        item.last_error = Some(error.to_string());

        if !item.is_exhausted() {
            let outcome = AttemptOutcome::Retry {
                attempts: item.attempts,
                max_attempts: item.max_attempts,
            };
            debug!(id = %id, attempts = item.attempts, error = %error, "Delivery attempt failed");
            self.checkpoint_items(&state).await;
            return outcome;
        }

        let item = state.items.remove(index);
        warn!(
            id = %item.id,
            kind = %item.kind(),
            attempts = item.attempts,
            error = %error,
            "Sync item failed permanently"
        );
        let tombstone = state.tombstones.bury(item, error);

        self.checkpoint_items(&state).await;
        self.checkpoint_tombstones(&state).await;

        AttemptOutcome::PermanentFailure(tombstone)
    }

    /// Clears the attempt counter and last error of a queued item.
    pub async fn reset_attempts(&self, id: &str) -> SyncResult<()> {
        let mut state = self.state.lock().await;

        let item = state
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| SyncError::ItemNotFound(id.to_string()))?;
        item.attempts = 0;
        item.last_error = None;
        item.last_attempt_at = None;

        self.checkpoint_items(&state).await;
        Ok(())
    }

    /// Removes every item. Used for explicit resets only.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.items.len();
        state.items.clear();
        info!(dropped, "Sync queue cleared");
        self.checkpoint_items(&state).await;
    }

    pub async fn clear_tombstones(&self) {
        let mut state = self.state.lock().await;
        state.tombstones.clear();
        self.checkpoint_tombstones(&state).await;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Ordered snapshot of the queue.
    pub async fn peek_all(&self) -> Vec<SyncItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn get(&self, id: &str) -> Option<SyncItem> {
        let state = self.state.lock().await;
        state.items.iter().find(|item| item.id == id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        let state = self.state.lock().await;
        state.items.iter().any(|item| item.id == id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    /// Queued items of one kind, in drain order.
    pub async fn pending_by_kind(&self, kind: SyncKind) -> Vec<SyncItem> {
        let state = self.state.lock().await;
        state
            .items
            .iter()
            .filter(|item| item.kind() == kind)
            .cloned()
            .collect()
    }

    /// Permanently failed items, oldest first.
    pub async fn tombstones(&self) -> Vec<Tombstone> {
        self.state.lock().await.tombstones.list()
    }

    // =========================================================================
    // Checkpoints
    // =========================================================================

    async fn checkpoint_items(&self, state: &QueueState) {
        if let Err(e) = save_json(self.store.as_ref(), SYNC_QUEUE_KEY, &state.items).await {
            error!(
                error = %e,
                pending = state.items.len(),
                "Failed to checkpoint sync queue; keeping in-memory state"
            );
        }
    }

    async fn checkpoint_tombstones(&self, state: &QueueState) {
        let entries = state.tombstones.list();
        if let Err(e) = save_json(self.store.as_ref(), TOMBSTONES_KEY, &entries).await {
            error!(error = %e, "Failed to checkpoint tombstone log");
        }
    }
}

/// Descending priority; `sort_by` is stable so ties keep insertion order.
fn sort_by_priority(items: &mut [SyncItem]) {
    items.sort_by(|a, b| b.priority.cmp(&a.priority));
}

// =============================================================================
// Unit Tests
// =============================================================================
