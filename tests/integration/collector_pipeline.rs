//! End-to-end collector tests: provider → store → evaluator → alerts

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use host_telemetry::actors::collector::{CollectorHandle, CollectorSettings};
use host_telemetry::actors::messages::{TickOutcome, TickStage};
use host_telemetry::alerts::Thresholds;
use host_telemetry::config::DashboardConfig;
use host_telemetry::dashboard::{self, OperationalSummary};
use host_telemetry::storage::{MemoryStore, TelemetryStore};
use host_telemetry::AlertLevel;
use tokio_util::sync::CancellationToken;

use super::helpers::*;

fn settings() -> CollectorSettings {
    CollectorSettings {
        interval: Duration::from_secs(60),
        provider_timeout: Some(Duration::from_secs(5)),
        thresholds: Thresholds::default(),
    }
}

#[tokio::test]
async fn test_high_cpu_raises_one_warning() {
    let store = Arc::new(MemoryStore::new());
    let (handle, task) = CollectorHandle::spawn(
        Arc::new(StaticProvider::with_cpu(81.0)),
        store.clone(),
        settings(),
        CancellationToken::new(),
    );

    let report = handle.poll_now().await.unwrap();
    assert_matches!(report.outcome, TickOutcome::Completed { ref alerts, .. } if alerts.len() == 1);

    let alerts = store.query_active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].id, "cpu_high");
    assert_eq!(alerts[0].level, AlertLevel::Warning);
    assert!(alerts[0].message.contains("81.0"));

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_repeated_trigger_refreshes_single_row() {
    let store = Arc::new(MemoryStore::new());
    let (handle, task) = CollectorHandle::spawn(
        Arc::new(StaticProvider::with_cpu(95.0)),
        store.clone(),
        settings(),
        CancellationToken::new(),
    );

    let first = handle.poll_now().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = handle.poll_now().await.unwrap();

    let alerts = store.query_active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].timestamp >= second.started_at);
    assert!(second.started_at > first.started_at);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_recovery_does_not_resolve_alert() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StaticProvider::with_cpu(99.0));
    let (handle, task) = CollectorHandle::spawn(
        provider.clone(),
        store.clone(),
        settings(),
        CancellationToken::new(),
    );

    handle.poll_now().await.unwrap();
    provider.set_cpu(5.0);
    let report = handle.poll_now().await.unwrap();

    assert_matches!(report.outcome, TickOutcome::Completed { ref alerts, .. } if alerts.is_empty());
    assert_eq!(store.query_active_alerts().await.unwrap().len(), 1);

    assert!(store.resolve_alert("cpu_high").await.unwrap());
    assert!(store.query_active_alerts().await.unwrap().is_empty());

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_nominal_host_produces_no_alerts() {
    let store = Arc::new(MemoryStore::new());
    let (handle, task) = CollectorHandle::spawn(
        Arc::new(StaticProvider::nominal()),
        store.clone(),
        settings(),
        CancellationToken::new(),
    );

    handle.poll_now().await.unwrap();

    assert!(store.query_active_alerts().await.unwrap().is_empty());
    let samples = store.query_metrics(Duration::ZERO).await.unwrap();
    assert!(!samples.is_empty());
    assert_eq!(samples[0].process_count, 128);
    assert_eq!(samples[0].temperature_celsius, None);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_closed_store_keeps_loop_alive() {
    let store = Arc::new(MemoryStore::new());
    store.close().await.unwrap();

    let (handle, task) = CollectorHandle::spawn(
        Arc::new(StaticProvider::nominal()),
        store,
        settings(),
        CancellationToken::new(),
    );

    for _ in 0..3 {
        let report = handle.poll_now().await.unwrap();
        assert_matches!(
            report.outcome,
            TickOutcome::Failed {
                stage: TickStage::Store,
                ..
            }
        );
    }
    assert!(handle.is_running());

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stalled_provider_does_not_block_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.append_metric(&create_test_sample(12.0)).await.unwrap();

    let provider = StaticProvider {
        delay: Some(Duration::from_secs(3)),
        ..StaticProvider::nominal()
    };
    let shutdown = CancellationToken::new();
    let (_handle, collector_task) = CollectorHandle::spawn(
        Arc::new(provider),
        store.clone(),
        CollectorSettings {
            provider_timeout: None,
            ..settings()
        },
        shutdown.child_token(),
    );

    let config = DashboardConfig {
        port: 0,
        fallback_ports: Vec::new(),
        discovery_file: dir.path().join(".telemetry_port"),
        ..DashboardConfig::default()
    };
    let server = dashboard::spawn_dashboard(
        &config,
        store,
        OperationalSummary {
            collection_interval: Duration::from_secs(60),
            refresh_secs: 15,
            stop_hint: "press Ctrl-C".to_string(),
        },
        shutdown.child_token(),
    )
    .await
    .unwrap();

    let started = Instant::now();
    let response = reqwest::get(server.url()).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("12.0%"));
    assert!(started.elapsed() < Duration::from_secs(2));

    shutdown.cancel();
    server.join().await;
    collector_task.await.unwrap();
}
