//! Concurrent writers against the SQLite store
//!
//! These tests verify that the collector and the activity sink can write at
//! the same time without losing or mangling rows:
//! - Two event producers, 1000 events each
//! - Metric and event streams interleaved
//! - Readers running while writers commit

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use host_telemetry::ActivityCategory;
use host_telemetry::storage::TelemetryStore;
use host_telemetry::storage::sqlite::SqliteStore;

use super::helpers::*;

async fn open_store(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
    Arc::new(
        SqliteStore::new(dir.path().join("telemetry.db"))
            .await
            .unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_producers_persist_every_event() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut tasks = vec![];
    for producer in 0..2 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let category = if producer == 0 {
                ActivityCategory::Keyboard
            } else {
                ActivityCategory::Mouse
            };
            for i in 0..1000 {
                store
                    .append_event(category, &format!("producer-{producer} event-{i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for result in futures::future::join_all(tasks).await {
        result.unwrap();
    }

    let events = store.query_events(Duration::ZERO).await.unwrap();
    assert_eq!(events.len(), 2000);

    // every row is intact and belongs to the producer that wrote it
    let mut seen = HashSet::new();
    for event in &events {
        let (producer, index) = event
            .description
            .strip_prefix("producer-")
            .and_then(|rest| rest.split_once(" event-"))
            .expect("mangled description");
        let expected = if producer == "0" {
            ActivityCategory::Keyboard
        } else {
            ActivityCategory::Mouse
        };
        assert_eq!(event.category, expected);
        assert!(index.parse::<u32>().unwrap() < 1000);
        assert!(seen.insert(event.description.clone()));
    }

    // newest first
    assert!(events.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_metric_and_event_streams_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let metrics = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                store
                    .append_metric(&create_test_sample(i as f64 / 2.0))
                    .await
                    .unwrap();
            }
        })
    };
    let events = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                store
                    .append_event(ActivityCategory::Screenshot, &format!("capture {i}"))
                    .await
                    .unwrap();
            }
        })
    };
    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                store.query_metrics(Duration::from_secs(3600)).await.unwrap();
                store.query_active_alerts().await.unwrap();
            }
        })
    };

    metrics.await.unwrap();
    events.await.unwrap();
    reader.await.unwrap();

    let samples = store.query_metrics(Duration::ZERO).await.unwrap();
    assert_eq!(samples.len(), 200);
    assert_eq!(samples[0].cpu_percent, 99.5);
    assert_eq!(store.query_events(Duration::ZERO).await.unwrap().len(), 200);
}

#[tokio::test]
async fn test_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let sample = create_test_sample(42.0);
    {
        let store = open_store(&dir).await;
        store.append_metric(&sample).await.unwrap();
        store
            .append_event(ActivityCategory::Other, "before restart")
            .await
            .unwrap();
        store.close().await.unwrap();
    }

    let store = open_store(&dir).await;
    let samples = store.query_metrics(Duration::ZERO).await.unwrap();
    assert_eq!(samples, vec![sample]);
    assert_eq!(
        store.query_events(Duration::ZERO).await.unwrap()[0].description,
        "before restart"
    );
}
