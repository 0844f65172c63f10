//! Checkpoints written to a database file are visible after reopening it.

use fieldsync_db::kv::{ARCHIVE_KEY, SYNC_QUEUE_KEY};
use fieldsync_db::{load_json, save_json, Database, DbConfig, KvStore};

#[tokio::test]
async fn checkpoints_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldsync.db");

    {
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let store = db.kv();
        save_json(&store, SYNC_QUEUE_KEY, &vec!["a", "b"]).await.unwrap();
        store.put(ARCHIVE_KEY, "[]").await.unwrap();
        db.close().await;
    }

    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    let store = db.kv();

    let queue: Option<Vec<String>> = load_json(&store, SYNC_QUEUE_KEY).await.unwrap();
    assert_eq!(queue, Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(store.get(ARCHIVE_KEY).await.unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn reopening_reruns_migrations_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldsync.db");

    let first = Database::new(DbConfig::new(&path)).await.unwrap();
    first.close().await;

    let second = Database::new(DbConfig::new(&path)).await.unwrap();
    assert!(second.health_check().await);
}
