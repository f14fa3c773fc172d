//! Integration tests for the storage contract
//!
//! These tests verify that:
//! - Every backend honors the same read/write contract
//! - Concurrent updates lose nothing
//! - A restart restores exactly the persisted metric set
//! - The backend selector degrades gracefully

use std::sync::Arc;
use std::time::Duration;

use metric_tracker::config::StorageSettings;
use metric_tracker::storage::{FileStorage, FlushPolicy, MemoryStorage, StorageBackend, connect};
use metric_tracker::{MetricKind, MetricRecord};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn sorted(mut records: Vec<MetricRecord>) -> Vec<MetricRecord> {
    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

/// Exercise the shared contract against a fresh backend instance.
async fn exercise_contract(storage: &dyn StorageBackend) {
    // counters accumulate
    for _ in 0..3 {
        storage.update_counter("PollCount", 1).await.unwrap();
    }
    assert_eq!(storage.get_counter("PollCount").await.unwrap(), Some(3));

    // gauges overwrite
    storage.update_gauge("Alloc", 120.5).await.unwrap();
    storage.update_gauge("Alloc", 98.2).await.unwrap();
    assert_eq!(storage.get_gauge("Alloc").await.unwrap(), Some(98.2));

    // lookup by name alone
    let record = storage.get_metric("Alloc").await.unwrap().unwrap();
    assert_eq!(record.kind, MetricKind::Gauge);
    assert_eq!(record.value, Some(98.2));

    // absent names read as none, not as errors
    assert_eq!(storage.get_metric("Missing").await.unwrap(), None);

    // the full set contains both kinds
    let records = sorted(storage.all_metrics().await.unwrap());
    assert_eq!(
        records,
        vec![
            MetricRecord::gauge("Alloc", 98.2),
            MetricRecord::counter("PollCount", 3),
        ]
    );

    // batches merge counters and overwrite gauges
    storage
        .update_batch(vec![
            MetricRecord::counter("PollCount", 4),
            MetricRecord::gauge("Alloc", 50.0),
        ])
        .await
        .unwrap();
    assert_eq!(storage.get_counter("PollCount").await.unwrap(), Some(7));
    assert_eq!(storage.get_gauge("Alloc").await.unwrap(), Some(50.0));
}

#[tokio::test]
async fn test_memory_backend_contract() {
    init_tracing();
    let storage = MemoryStorage::new();
    exercise_contract(&storage).await;
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_file_backend_contract_write_through() {
    init_tracing();
    let dir = tempdir().unwrap();
    let storage = FileStorage::open(
        dir.path().join("metrics.json"),
        FlushPolicy::WriteThrough,
        false,
    )
    .await
    .unwrap();

    exercise_contract(&storage).await;
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_file_backend_contract_write_back() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::open(
        dir.path().join("metrics.json"),
        FlushPolicy::Periodic(Duration::from_secs(3600)),
        false,
    )
    .await
    .unwrap();

    exercise_contract(&storage).await;
    storage.close().await.unwrap();
}

#[cfg(feature = "storage-sqlite")]
#[tokio::test]
async fn test_sqlite_backend_contract() {
    use metric_tracker::storage::sqlite::SqliteStorage;

    let dir = tempdir().unwrap();
    let storage = SqliteStorage::connect(dir.path().join("metrics.db"))
        .await
        .unwrap();

    exercise_contract(&storage).await;
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_counter_updates_sum_correctly() {
    const TASKS: usize = 8;
    const INCREMENTS: usize = 100;

    let storage = Arc::new(MemoryStorage::new());

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                for _ in 0..INCREMENTS {
                    storage.update_counter("PollCount", 1).await.unwrap();
                }
            })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        handle.unwrap();
    }

    assert_eq!(
        storage.get_counter("PollCount").await.unwrap(),
        Some((TASKS * INCREMENTS) as i64)
    );
}

#[tokio::test]
async fn test_concurrent_disjoint_updates_lose_nothing() {
    const TASKS: usize = 10;

    let dir = tempdir().unwrap();
    let storage = Arc::new(
        FileStorage::open(
            dir.path().join("metrics.json"),
            FlushPolicy::Periodic(Duration::from_secs(3600)),
            false,
        )
        .await
        .unwrap(),
    );

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                storage
                    .update_gauge(&format!("Gauge{i}"), i as f64)
                    .await
                    .unwrap();
                storage
                    .update_counter(&format!("Counter{i}"), i as i64)
                    .await
                    .unwrap();
            })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        handle.unwrap();
    }

    for i in 0..TASKS {
        assert_eq!(
            storage.get_gauge(&format!("Gauge{i}")).await.unwrap(),
            Some(i as f64)
        );
        assert_eq!(
            storage.get_counter(&format!("Counter{i}")).await.unwrap(),
            Some(i as i64)
        );
    }

    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_restart_restores_persisted_metric_set() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.json");

    let storage = FileStorage::open(&path, FlushPolicy::WriteThrough, false)
        .await
        .unwrap();
    storage.update_gauge("Alloc", 98.2).await.unwrap();
    storage.update_counter("PollCount", 3).await.unwrap();
    storage.close().await.unwrap();

    let restored = FileStorage::open(&path, FlushPolicy::WriteThrough, true)
        .await
        .unwrap();
    let records = sorted(restored.all_metrics().await.unwrap());

    assert_eq!(
        records,
        vec![
            MetricRecord::gauge("Alloc", 98.2),
            MetricRecord::counter("PollCount", 3),
        ]
    );
    restored.close().await.unwrap();
}

#[cfg(feature = "storage-sqlite")]
#[tokio::test]
async fn test_selector_fallback_survives_restart() {
    let dir = tempdir().unwrap();
    let settings = StorageSettings {
        // unreachable: parent directory does not exist
        database_path: Some(dir.path().join("no-such-dir").join("metrics.db")),
        snapshot_path: dir.path().join("metrics.json"),
        flush_interval: 0,
        restore: true,
    };

    let storage = connect(&settings).await.unwrap();
    storage.update_counter("PollCount", 3).await.unwrap();
    storage.update_gauge("Alloc", 98.2).await.unwrap();
    storage.close().await.unwrap();

    // a second startup hydrates the downgraded store from its snapshot
    let storage = connect(&settings).await.unwrap();
    assert_eq!(storage.get_counter("PollCount").await.unwrap(), Some(3));
    assert_eq!(storage.get_gauge("Alloc").await.unwrap(), Some(98.2));
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_selector_without_database_uses_file_backend() {
    let dir = tempdir().unwrap();
    let settings = StorageSettings {
        database_path: None,
        snapshot_path: dir.path().join("metrics.json"),
        flush_interval: 0,
        restore: true,
    };

    let storage = connect(&settings).await.unwrap();
    storage.update_counter("PollCount", 1).await.unwrap();
    storage.close().await.unwrap();

    assert!(settings.snapshot_path.exists());
}
