//! # Key-Value Store
//!
//! The persistent local store used to checkpoint the sync queue and the
//! inspection archive across restarts.
//!
//! ## Checkpoint Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Checkpoint Pattern                                   │
//! │                                                                         │
//! │  STARTUP                                                               │
//! │    load_json("sync.queue")          ──► SyncQueue in memory            │
//! │    load_json("archive.inspections") ──► InspectionArchive in memory    │
//! │                                                                         │
//! │  EVERY MUTATION                                                        │
//! │    1. mutate in-memory state (source of truth for the process)         │
//! │    2. save_json(key, snapshot)  ── failure is logged, never rolled back │
//! │                                                                         │
//! │  kv_store table                                                        │
//! │  key                   │ value (JSON)          │ updated_at             │
//! │  ──────────────────────┼───────────────────────┼─────────────────────── │
//! │  sync.queue            │ [{"id":..}, ..]       │ 2026-10-18T09:12:00Z   │
//! │  archive.inspections   │ [{"id":..}, ..]       │ 2026-10-18T09:11:58Z   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Well-Known Keys
// =============================================================================

/// Priority-ordered sync queue snapshot.
pub const SYNC_QUEUE_KEY: &str = "sync.queue";
/// Completion time of the last drain cycle.
pub const LAST_SYNC_TIME_KEY: &str = "sync.last_sync_time";
/// Bounded log of permanently failed sync items.
pub const TOMBSTONES_KEY: &str = "sync.tombstones";
/// All drafts and submitted inspections.
pub const ARCHIVE_KEY: &str = "archive.inspections";
/// Last known device coordinates.
pub const LAST_LOCATION_KEY: &str = "location.last_known";

// =============================================================================
// Store Trait
// =============================================================================

/// A durable string-to-string store.
///
/// Read once at startup, written after every mutating operation.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Inserts or replaces the value under `key`.
    async fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`; a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Lists keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        (**self).keys_with_prefix(prefix).await
    }
}

// =============================================================================
// JSON Helpers
// =============================================================================

/// Loads and decodes the JSON document stored under `key`.
pub async fn load_json<T, S>(store: &S, key: &str) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    S: KvStore + ?Sized,
{
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encodes `value` as JSON and stores it under `key`.
pub async fn save_json<T, S>(store: &S, key: &str, value: &T) -> StoreResult<()>
where
    T: Serialize + ?Sized,
    S: KvStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw).await
}

// =============================================================================
// SQLite Implementation
// =============================================================================

/// [`KvStore`] backed by the `kv_store` table.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Creates a new SqliteKvStore over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        SqliteKvStore { pool }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        debug!(key = %key, bytes = value.len(), "Writing checkpoint");

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::write_failed(key, StoreError::from(e).to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::write_failed(key, StoreError::from(e).to_string()))?;

        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Checkpoint {
        items: Vec<String>,
    }

    async fn store() -> SqliteKvStore {
        Database::new(DbConfig::in_memory()).await.unwrap().kv()
    }

    #[tokio::test]
    async fn test_put_get_upsert() {
        let kv = store().await;
        assert_eq!(kv.get("a").await.unwrap(), None);

        kv.put("a", "1").await.unwrap();
        kv.put("a", "2").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let kv = store().await;
        kv.put("a", "1").await.unwrap();
        kv.delete("a").await.unwrap();
        kv.delete("a").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let kv = store().await;
        kv.put("sync.queue", "[]").await.unwrap();
        kv.put("sync.tombstones", "[]").await.unwrap();
        kv.put("archive.inspections", "[]").await.unwrap();

        let keys = kv.keys_with_prefix("sync.").await.unwrap();
        assert_eq!(keys, vec!["sync.queue", "sync.tombstones"]);
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let kv = store().await;
        let checkpoint = Checkpoint {
            items: vec!["a".into(), "b".into()],
        };

        save_json(&kv, SYNC_QUEUE_KEY, &checkpoint).await.unwrap();
        let loaded: Option<Checkpoint> = load_json(&kv, SYNC_QUEUE_KEY).await.unwrap();
        assert_eq!(loaded, Some(checkpoint));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_serialization_error() {
        let kv = store().await;
        kv.put(SYNC_QUEUE_KEY, "{not json").await.unwrap();

        let result: StoreResult<Option<Checkpoint>> = load_json(&kv, SYNC_QUEUE_KEY).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
