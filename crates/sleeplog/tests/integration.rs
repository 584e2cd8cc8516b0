//! Integration tests for sleeplog
//!
//! These tests drive the store end to end: real files in a temp directory,
//! several store instances, concurrent callers and subscribers.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sleeplog_api::{EndOutcome, LoadOutcome, Record, SessionState, Snapshot, DEFAULT_FILE_NAME};
use sleeplog_store::{DataDirProvider, SleepStore, StoreError};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 22, 0, 0).unwrap()
}

fn hours(h: i64) -> DateTime<Utc> {
    base() + Duration::hours(h)
}

fn spawn_store(dir: &Path) -> SleepStore {
    SleepStore::spawn(Arc::new(DataDirProvider::new(dir)), DEFAULT_FILE_NAME)
}

async fn open_store(dir: &TempDir) -> SleepStore {
    let store = spawn_store(dir.path());
    store.load_from_disk().await.unwrap();
    store
}

fn read_file(dir: &TempDir) -> Snapshot {
    let bytes = std::fs::read(dir.path().join(DEFAULT_FILE_NAME)).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_reload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    store.create_record(hours(0), hours(8), "first night").await.unwrap();
    store.create_record(hours(24), hours(31), "").await.unwrap();
    store.start_sleep(hours(48)).await.unwrap();
    let expected = store.snapshot();
    store.shutdown().await.unwrap();

    let reopened = spawn_store(dir.path());
    let outcome = reopened.load_from_disk().await.unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            records: 2,
            dropped: vec![],
        }
    );
    assert_eq!(reopened.snapshot(), expected);
}

#[tokio::test]
async fn test_load_normalizes_hand_edited_file() {
    let dir = tempfile::tempdir().unwrap();
    let older = Record::new(hours(0), hours(8), "", hours(9));
    let newer = Record::new(hours(24), hours(30), "", hours(31));
    let broken = Record::new(hours(12), hours(10), "", hours(31));
    let on_disk = Snapshot {
        records: vec![older.clone(), broken.clone(), newer.clone()],
        active: SessionState::Idle,
    };
    std::fs::write(
        dir.path().join(DEFAULT_FILE_NAME),
        serde_json::to_vec_pretty(&on_disk).unwrap(),
    )
    .unwrap();

    let store = spawn_store(dir.path());
    let outcome = store.load_from_disk().await.unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            records: 2,
            dropped: vec![broken.id()],
        }
    );
    assert_eq!(store.snapshot().records, vec![newer, older]);
}

#[tokio::test]
async fn test_file_layout() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let record = store.create_record(hours(0), hours(8), "note").await.unwrap();

    let text = std::fs::read_to_string(dir.path().join(DEFAULT_FILE_NAME)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert!(value["activeSleepStart"].is_null());
    let stored = &value["records"][0];
    assert_eq!(stored["id"], record.id().to_string());
    assert_eq!(stored["startDate"], "2026-02-01T22:00:00Z");
    assert_eq!(stored["endDate"], "2026-02-02T06:00:00Z");
    assert_eq!(stored["note"], "note");
    assert!(text.find("activeSleepStart").unwrap() < text.find("records").unwrap());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    assert_eq!(store.end_sleep(hours(1)).await.unwrap(), EndOutcome::NothingActive);

    store.start_sleep(hours(0)).await.unwrap();
    assert!(matches!(
        store.start_sleep(hours(1)).await,
        Err(StoreError::SessionAlreadyActive { .. })
    ));
    assert_eq!(read_file(&dir).active.started_at(), Some(hours(0)));

    let EndOutcome::Ended(record) = store.end_sleep(hours(7)).await.unwrap() else {
        panic!("session should have ended");
    };
    assert_eq!(record.duration(), Duration::hours(7));

    let on_disk = read_file(&dir);
    assert_eq!(on_disk.active, SessionState::Idle);
    assert_eq!(on_disk.records, vec![record]);
}

#[tokio::test]
async fn test_subscriber_counts_and_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut steady = store.subscribe();
    let quitter = store.subscribe();

    let first = store.create_record(hours(0), hours(8), "").await.unwrap();
    store.start_sleep(hours(20)).await.unwrap();

    quitter.cancel();

    store.end_sleep(hours(27)).await.unwrap();
    store.delete_record(first.id()).await.unwrap();

    assert_eq!(store.subscriber_count().await.unwrap(), 1);

    let mut seen = Vec::new();
    while let Some(snapshot) = steady.try_recv() {
        seen.push(snapshot);
    }

    // Initial snapshot plus one per mutation, in commit order
    assert_eq!(seen.len(), 5);
    assert_eq!(seen[0], Snapshot::default());
    assert_eq!(seen[1].records.len(), 1);
    assert!(seen[2].active.is_active());
    assert!(!seen[3].active.is_active());
    assert_eq!(seen[3].records.len(), 2);
    assert_eq!(seen[4].records.len(), 1);
    assert_eq!(seen[4], store.snapshot());
}

#[tokio::test]
async fn test_subscriber_joins_late() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    store.create_record(hours(0), hours(8), "").await.unwrap();

    let mut late = store.subscribe();

    assert_eq!(late.recv().await.unwrap(), store.snapshot());
}

#[tokio::test]
async fn test_idle_subscriber_does_not_block_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let mut idle = store.subscribe();

    for day in 0..50 {
        let start = hours(24 * day);
        store.create_record(start, start + Duration::hours(7), "").await.unwrap();
    }

    let mut received = 0;
    while idle.try_recv().is_some() {
        received += 1;
    }
    assert_eq!(received, 51);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_and_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut doomed = Vec::new();
    for i in 0..10 {
        let start = hours(-1000 + i * 24);
        doomed.push(store.create_record(start, start + Duration::hours(6), "doomed").await.unwrap());
    }

    let mut handles = Vec::new();
    for worker in 0..8i64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10i64 {
                let start = hours(worker * 1000 + i * 24);
                store
                    .create_record(start, start + Duration::hours(8), format!("w{worker}-{i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for record in doomed {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            assert!(store.delete_record(record.id()).await.unwrap());
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = store.snapshot();
    assert_eq!(snapshot.records.len(), 80);
    assert!(snapshot.records.iter().all(|r| r.note != "doomed"));
    assert!(snapshot.is_normalized());
    assert_eq!(read_file(&dir), snapshot);
}

#[tokio::test]
async fn test_ordering_holds_after_mixed_operations() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    // Deterministic pseudo-random offsets
    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) as i64
    };

    let mut ids = Vec::new();
    for _ in 0..30 {
        let start = hours(next() % 2000);
        let length = 1 + next() % 10;
        let record = store
            .create_record(start, start + Duration::hours(length), "")
            .await
            .unwrap();
        ids.push(record);

        if next() % 3 == 0 {
            let victim = ids.remove((next() as usize) % ids.len());
            store.delete_record(victim.id()).await.unwrap();
        }

        if next() % 4 == 0 && !ids.is_empty() {
            let index = (next() as usize) % ids.len();
            let mut edited = ids[index].clone();
            edited.start_date = hours(next() % 2000);
            edited.end_date = edited.start_date + Duration::hours(2);
            ids[index] = store.update_record(edited).await.unwrap();
        }

        let snapshot = store.snapshot();
        assert!(snapshot.is_normalized());
        assert_eq!(snapshot.records.len(), ids.len());
    }

    assert_eq!(read_file(&dir), store.snapshot());
}

#[tokio::test]
async fn test_dropping_all_handles_ends_subscriptions() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let mut subscription = store.subscribe();
    assert!(subscription.recv().await.is_some());

    drop(store);

    assert_eq!(subscription.recv().await, None);
}
