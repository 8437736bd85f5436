//! Dashboard tests over a real socket

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use host_telemetry::config::DashboardConfig;
use host_telemetry::dashboard::{self, DashboardError, DashboardHandle, OperationalSummary};
use host_telemetry::storage::{MemoryStore, TelemetryStore};
use host_telemetry::{Alert, AlertLevel, timestamp_now};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::helpers::*;

fn summary() -> OperationalSummary {
    OperationalSummary {
        collection_interval: Duration::from_secs(10),
        refresh_secs: 15,
        stop_hint: "press Ctrl-C".to_string(),
    }
}

fn config(dir: &tempfile::TempDir, port: u16, fallback_ports: Vec<u16>) -> DashboardConfig {
    DashboardConfig {
        port,
        fallback_ports,
        discovery_file: dir.path().join("run/.telemetry_port"),
        ..DashboardConfig::default()
    }
}

async fn start(
    config: &DashboardConfig,
    store: Arc<dyn TelemetryStore>,
) -> (DashboardHandle, CancellationToken) {
    let shutdown = CancellationToken::new();
    let handle = dashboard::spawn_dashboard(config, store, summary(), shutdown.clone())
        .await
        .unwrap();
    (handle, shutdown)
}

#[tokio::test]
async fn test_empty_store_renders_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let (server, shutdown) = start(&config(&dir, 0, vec![]), Arc::new(MemoryStore::new())).await;

    let response = reqwest::get(server.url()).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=utf-8"
    );
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let body = response.text().await.unwrap();
    assert_eq!(body.matches("0.0%").count(), 3);
    assert!(body.contains("No security threats detected"));

    shutdown.cancel();
    server.join().await;
}

#[tokio::test]
async fn test_page_shows_latest_sample_and_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.append_metric(&create_test_sample(20.0)).await.unwrap();
    store.append_metric(&create_test_sample(77.7)).await.unwrap();
    store
        .upsert_alert(&Alert {
            id: "disk_high".to_string(),
            level: AlertLevel::Critical,
            message: "High disk usage: 93.0%".to_string(),
            timestamp: timestamp_now(),
            resolved: false,
        })
        .await
        .unwrap();

    let (server, shutdown) = start(&config(&dir, 0, vec![]), store).await;

    let body = reqwest::get(format!("http://{}/dashboard", server.local_addr()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("77.7%"));
    assert!(body.contains("High disk usage: 93.0%"));
    assert!(body.contains("Active Alerts (1)"));
    assert!(body.contains("Data points (last hour):</strong> 2"));

    shutdown.cancel();
    server.join().await;
}

#[tokio::test]
async fn test_unknown_path_and_verb() {
    let dir = tempfile::tempdir().unwrap();
    let (server, shutdown) = start(&config(&dir, 0, vec![]), Arc::new(MemoryStore::new())).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", server.local_addr());

    let missing = client.get(format!("{base}/favicon.ico")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let post = client.post(format!("{base}/")).send().await.unwrap();
    assert_eq!(post.status(), 405);

    shutdown.cancel();
    server.join().await;
}

#[tokio::test]
async fn test_discovery_file_holds_bound_port() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 0, vec![]);
    let (server, shutdown) = start(&config, Arc::new(MemoryStore::new())).await;

    let content = std::fs::read_to_string(&config.discovery_file).unwrap();
    assert_eq!(content, server.local_addr().port().to_string());
    assert_eq!(server.discovery_file_error(), None);

    shutdown.cancel();
    server.join().await;
}

#[tokio::test]
async fn test_unwritable_discovery_file_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let mut config = config(&dir, 0, vec![]);
    config.discovery_file = blocker.join(".telemetry_port");
    let (server, shutdown) = start(&config, Arc::new(MemoryStore::new())).await;

    let error = server.discovery_file_error().expect("write failure not recorded");
    assert!(error.contains("blocker"), "unexpected error: {error}");
    assert_eq!(reqwest::get(server.url()).await.unwrap().status(), 200);

    shutdown.cancel();
    server.join().await;
}

#[tokio::test]
async fn test_falls_back_when_primary_port_is_taken() {
    let dir = tempfile::tempdir().unwrap();
    let taken = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let taken_port = taken.local_addr().unwrap().port();

    let (server, shutdown) = start(
        &config(&dir, taken_port, vec![taken_port, 0]),
        Arc::new(MemoryStore::new()),
    )
    .await;

    assert_ne!(server.local_addr().port(), taken_port);
    assert_eq!(reqwest::get(server.url()).await.unwrap().status(), 200);

    shutdown.cancel();
    server.join().await;
}

#[tokio::test]
async fn test_exhausted_ports_fail_startup() {
    let dir = tempfile::tempdir().unwrap();
    let first = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let second = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let ports = vec![
        first.local_addr().unwrap().port(),
        second.local_addr().unwrap().port(),
    ];

    let config = config(&dir, ports[0], vec![ports[1]]);
    let result = dashboard::spawn_dashboard(
        &config,
        Arc::new(MemoryStore::new()),
        summary(),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(DashboardError::NoFreePort(tried)) if tried == ports));
    assert!(!config.discovery_file.exists());
}

#[tokio::test]
async fn test_stop_closes_listening_socket() {
    let dir = tempfile::tempdir().unwrap();
    let (server, shutdown) = start(&config(&dir, 0, vec![]), Arc::new(MemoryStore::new())).await;
    let addr = server.local_addr();

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server.join())
        .await
        .expect("dashboard did not stop");

    // the port is free again
    let rebound = TcpListener::bind(addr).await;
    assert!(rebound.is_ok());
    assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
}
