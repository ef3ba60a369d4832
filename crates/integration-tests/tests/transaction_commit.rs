//! Transaction coordinator integration tests
//!
//! Full engine wiring: coordinator -> queue -> executor -> mock record
//! store, with the in-memory snapshot store standing in for local
//! persistence.

use std::sync::{Arc, Mutex};

use recall_core::application::queue::QueueSettings;
use recall_core::application::transaction::rollback_action;
use recall_core::application::SyncEngine;
use recall_core::domain::{CachedDocument, Card, DocumentWrite, TopicShell, UserIdentity};
use recall_core::port::credential_provider::mocks::MockCredentialProvider;
use recall_core::port::record_store::mocks::MockRecordStore;
use recall_core::port::record_store::{fields, FieldMap};
use recall_core::port::snapshot_store::mocks::MemorySnapshotStore;
use recall_core::port::SnapshotStore;
use recall_core::SyncError;
use recall_infra_file::FileSnapshotStore;
use serde_json::Value;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_user() -> UserIdentity {
    UserIdentity::with_email("user-1", "user-1@example.com")
}

fn seeded_records(user: &UserIdentity) -> Arc<MockRecordStore> {
    let mut record_fields = FieldMap::new();
    record_fields.insert(fields::USER_ID.to_string(), Value::String(user.id.clone()));
    if let Some(email) = &user.email {
        record_fields.insert(fields::USER_EMAIL.to_string(), Value::String(email.clone()));
    }
    Arc::new(MockRecordStore::new().with_record("rec-1", record_fields))
}

fn build_engine(
    records: Arc<MockRecordStore>,
    credentials: Arc<MockCredentialProvider>,
    snapshots: Arc<MemorySnapshotStore>,
) -> SyncEngine {
    SyncEngine::new(
        records,
        credentials,
        snapshots,
        test_user(),
        QueueSettings {
            retry_delay_ms: 10,
            ..Default::default()
        },
    )
}

fn card(id: &str) -> Card {
    Card {
        id: id.to_string(),
        topic_id: "topic-1".to_string(),
        front: format!("front {id}"),
        back: format!("back {id}"),
        bucket: 0,
        created_at: 1_000,
    }
}

fn remote_cards(records: &MockRecordStore) -> Vec<Card> {
    let record_fields = records.record("rec-1").expect("record exists");
    let Value::String(json) = &record_fields[fields::CARDS] else {
        panic!("cards field is not JSON text");
    };
    serde_json::from_str(json).expect("cards parse")
}

#[tokio::test(start_paused = true)]
async fn test_commit_persists_cards_and_snapshot() {
    init_logging();
    let user = test_user();
    let records = seeded_records(&user);
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let engine = build_engine(
        Arc::clone(&records),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::clone(&snapshots),
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    coordinator.commit().await.unwrap();

    // record id was resolved through one search, then one consolidated
    // card save went out
    assert_eq!(records.search_count(), 1);
    assert_eq!(records.update_count(), 1);
    assert_eq!(remote_cards(&records), vec![card("card-a")]);

    // the committed document was snapshotted and carries the record id
    let blob = snapshots.read("document.user-1").unwrap().expect("snapshot");
    let snapshot: CachedDocument = serde_json::from_slice(&blob).unwrap();
    assert_eq!(snapshot.cards, vec![card("card-a")]);
    assert_eq!(
        coordinator.document().record_id.as_deref(),
        Some("rec-1")
    );

    shutdown.shutdown();
    driver.await.unwrap();
}

/// Scenario C: a permanently failing save rejects the commit and the
/// card collection reverts to its pre-begin value
#[tokio::test(start_paused = true)]
async fn test_failed_commit_rolls_back_document() {
    let user = test_user();
    let records = seeded_records(&user);
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let engine = build_engine(
        Arc::clone(&records),
        Arc::new(MockCredentialProvider::new("token-0")),
        snapshots,
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    records.set_fail_all_updates(true);

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    let err = coordinator.commit().await.unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));

    assert!(coordinator.document().cards.is_empty());
    // the transaction slot was released
    assert!(coordinator.begin());

    shutdown.shutdown();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_begin_while_active_returns_false_and_keeps_buffer() {
    let user = test_user();
    let records = seeded_records(&user);
    let engine = build_engine(
        Arc::clone(&records),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));

    assert!(!coordinator.begin());

    // the original buffer is what commits
    coordinator.commit().await.unwrap();
    assert_eq!(remote_cards(&records), vec![card("card-a")]);

    shutdown.shutdown();
    driver.await.unwrap();
}

#[tokio::test]
async fn test_commit_without_begin_is_validation_error() {
    let user = test_user();
    let engine = build_engine(
        seeded_records(&user),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();

    let err = coordinator.commit().await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
}

#[tokio::test]
async fn test_empty_commit_touches_nothing() {
    let user = test_user();
    let records = seeded_records(&user);
    let engine = build_engine(
        Arc::clone(&records),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();

    assert!(coordinator.begin());
    coordinator.commit().await.unwrap();

    assert_eq!(records.search_count(), 0);
    assert_eq!(records.update_count(), 0);
    assert!(coordinator.begin());
}

#[tokio::test(start_paused = true)]
async fn test_staged_writes_are_visible_before_commit() {
    let user = test_user();
    let engine = build_engine(
        seeded_records(&user),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    assert_eq!(coordinator.document().cards, vec![card("card-a")]);

    coordinator.rollback().await;
    assert!(coordinator.document().cards.is_empty());
}

#[tokio::test]
async fn test_stage_without_transaction_is_ignored() {
    let user = test_user();
    let engine = build_engine(
        seeded_records(&user),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();

    assert!(!coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    assert!(coordinator.document().cards.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_full_save_supersedes_class_saves() {
    let user = test_user();
    let records = seeded_records(&user);
    let engine = build_engine(
        Arc::clone(&records),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    assert!(coordinator.stage(
        DocumentWrite::ReplaceTopics(vec![TopicShell {
            id: "topic-1".to_string(),
            subject: "biology".to_string(),
            name: "Cells".to_string(),
            color_key: None,
        }]),
        None
    ));
    assert!(coordinator.stage(
        DocumentWrite::ReplaceDocument(coordinator.document()),
        None
    ));
    coordinator.commit().await.unwrap();

    // one comprehensive save instead of one per class
    assert_eq!(records.update_count(), 1);
    let record_fields = records.record("rec-1").unwrap();
    for name in [
        fields::CARDS,
        fields::TOPICS,
        fields::COLOR_MAP,
        fields::METADATA,
        fields::BUCKETS,
    ] {
        assert!(record_fields.contains_key(name), "missing field {name}");
    }

    shutdown.shutdown();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_rollback_actions_run_in_order_and_failures_are_swallowed() {
    let user = test_user();
    let records = seeded_records(&user);
    let engine = build_engine(
        Arc::clone(&records),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    records.set_fail_all_updates(true);
    let order: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));

    assert!(coordinator.begin());
    {
        let order = Arc::clone(&order);
        assert!(coordinator.stage(
            DocumentWrite::ReplaceCards(vec![card("card-a")]),
            Some(rollback_action(move || async move {
                order.lock().unwrap().push(1);
                Ok(())
            })),
        ));
    }
    assert!(coordinator.stage(
        DocumentWrite::ReplaceColors(Default::default()),
        Some(rollback_action(|| async {
            Err(SyncError::Internal("compensation failed".to_string()))
        })),
    ));
    {
        let order = Arc::clone(&order);
        assert!(coordinator.stage(
            DocumentWrite::ReplaceCards(vec![card("card-b")]),
            Some(rollback_action(move || async move {
                order.lock().unwrap().push(3);
                Ok(())
            })),
        ));
    }

    coordinator.commit().await.unwrap_err();

    assert_eq!(*order.lock().unwrap(), vec![1, 3]);
    // failed compensation did not keep the slot locked
    assert!(coordinator.begin());

    shutdown.shutdown();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_commit_refreshes_credential_once_on_auth_failure() {
    let user = test_user();
    let records = seeded_records(&user);
    let credentials = Arc::new(MockCredentialProvider::new("token-0"));
    let engine = build_engine(
        Arc::clone(&records),
        Arc::clone(&credentials),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    records.push_update_failure(SyncError::NotAuthorized("token expired".to_string()));

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    coordinator.commit().await.unwrap();

    assert_eq!(credentials.refresh_count(), 1);

    shutdown.shutdown();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_final_flush_bypasses_queue() {
    let user = test_user();
    let records = seeded_records(&user);
    let engine = build_engine(
        Arc::clone(&records),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    coordinator.commit().await.unwrap();
    let updates_after_commit = records.update_count();

    // the driver is stopped: the flush must not go through the queue
    shutdown.shutdown();
    driver.await.unwrap();

    coordinator.final_flush().await;
    assert_eq!(records.update_count(), updates_after_commit + 1);
}

#[tokio::test(start_paused = true)]
async fn test_restore_from_snapshot_round_trip() {
    let user = test_user();
    let records = seeded_records(&user);
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let engine = build_engine(
        Arc::clone(&records),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::clone(&snapshots),
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    coordinator.commit().await.unwrap();
    shutdown.shutdown();
    driver.await.unwrap();

    // a fresh engine sharing the snapshot store sees the committed state
    let second = build_engine(
        records,
        Arc::new(MockCredentialProvider::new("token-0")),
        snapshots,
    );
    let restored = second.coordinator();
    assert!(restored.restore_from_snapshot().unwrap());
    assert_eq!(restored.document().cards, vec![card("card-a")]);
}

/// Same round trip with the real file-backed snapshot store
#[tokio::test(start_paused = true)]
async fn test_commit_snapshots_to_disk() {
    let user = test_user();
    let records = seeded_records(&user);
    let dir = tempfile::tempdir().unwrap();
    let snapshots = Arc::new(FileSnapshotStore::new(dir.path()));

    let engine = SyncEngine::new(
        Arc::clone(&records) as Arc<dyn recall_core::port::RecordStore>,
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
        user,
        QueueSettings {
            retry_delay_ms: 10,
            ..Default::default()
        },
    );
    let coordinator = engine.coordinator();
    let (shutdown, driver) = engine.start();

    assert!(coordinator.begin());
    assert!(coordinator.stage(DocumentWrite::ReplaceCards(vec![card("card-a")]), None));
    coordinator.commit().await.unwrap();
    shutdown.shutdown();
    driver.await.unwrap();

    let blob = snapshots.read("document.user-1").unwrap().expect("snapshot file");
    let snapshot: CachedDocument = serde_json::from_slice(&blob).unwrap();
    assert_eq!(snapshot.cards, vec![card("card-a")]);
}

#[tokio::test]
async fn test_hydrate_refused_during_transaction() {
    let user = test_user();
    let engine = build_engine(
        seeded_records(&user),
        Arc::new(MockCredentialProvider::new("token-0")),
        Arc::new(MemorySnapshotStore::new()),
    );
    let coordinator = engine.coordinator();

    assert!(coordinator.begin());
    assert!(!coordinator.hydrate(CachedDocument::default()));
    coordinator.rollback().await;
    assert!(coordinator.hydrate(CachedDocument::default()));
}
