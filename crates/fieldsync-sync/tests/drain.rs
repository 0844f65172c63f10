//! End-to-end drain behaviour against the fake collaborators.

use std::sync::Arc;

use fieldsync_core::{GeoPoint, NewMapPin, SyncPayload};
use fieldsync_db::{Database, DbConfig, MemoryKvStore};
use fieldsync_sync::fake::{FakeBlobUploader, FakeSubmissionApi};
use fieldsync_sync::{SyncQueue, Synchronizer};

fn pin(description: &str) -> SyncPayload {
    SyncPayload::PinSave(
        NewMapPin {
            location: GeoPoint {
                lat: 29.76,
                lng: -95.36,
            },
            description: description.to_string(),
            media: vec![],
            is_urgent: false,
        }
        .into_pin(),
    )
}

#[tokio::test]
async fn drains_in_priority_order_with_stable_ties() {
    let api = FakeSubmissionApi::new();
    let queue = SyncQueue::new(Arc::new(MemoryKvStore::new()), 3, 50);
    let sync = Synchronizer::new(queue, Arc::new(api.clone()), Arc::new(FakeBlobUploader::new()));

    let a = pin("A");
    let b = pin("B");
    let c = pin("C");
    let expected = vec![
        b.subject_id().to_string(),
        a.subject_id().to_string(),
        c.subject_id().to_string(),
    ];

    sync.enqueue(a, 1).await;
    sync.enqueue(b, 3).await;
    sync.enqueue(c, 1).await;

    sync.set_online(true).await.unwrap().await.unwrap();

    let order: Vec<String> = api.calls().into_iter().map(|c| c.subject_id).collect();
    assert_eq!(order, expected);
}

#[tokio::test]
async fn failed_item_alone_remains_after_cycle() {
    let api = FakeSubmissionApi::new();
    let queue = SyncQueue::new(Arc::new(MemoryKvStore::new()), 3, 50);
    let sync = Synchronizer::new(queue, Arc::new(api.clone()), Arc::new(FakeBlobUploader::new()));

    let payloads: Vec<SyncPayload> = (1..=5).map(|i| pin(&i.to_string())).collect();
    api.fake_fail(payloads[1].subject_id());

    let mut ids = Vec::new();
    for payload in payloads {
        ids.push(sync.enqueue(payload, 2).await);
    }

    let outcome = sync.set_online(true).await.unwrap().await.unwrap();
    assert_eq!(outcome.delivered, 4);

    let left = sync.peek_all().await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, ids[1]);
    assert_eq!(left[0].attempts, 1);
    assert_eq!(sync.status().await.pending_items, 1);
}

#[tokio::test]
async fn queue_survives_restart_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldsync.db");

    let before = {
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let queue = SyncQueue::new(Arc::new(db.kv()), 3, 50);
        queue.enqueue(pin("one"), 1).await;
        let two = queue.enqueue(pin("two"), 2).await;
        queue.record_attempt_failure(&two, "503").await;
        let items = queue.peek_all().await;
        db.close().await;
        items
    };

    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    let restored = SyncQueue::restore(Arc::new(db.kv()), 3, 50).await;

    assert_eq!(restored.peek_all().await, before);
    assert_eq!(before.len(), 2);
    assert_eq!(before[0].attempts, 1);
}
