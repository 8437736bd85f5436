//! Supervisor start/stop tests
//!
//! These tests verify the lifecycle contract:
//! - Every producer starts and reports running
//! - Stop is idempotent and clears every running flag
//! - A dashboard that cannot bind leaves the other producers running
//! - Status artifacts follow the lifecycle

use std::io::Cursor;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use host_telemetry::ActivityCategory;
use host_telemetry::actors::capture::{ActivityProvider, LineActivityProvider};
use host_telemetry::status;
use host_telemetry::storage::{MemoryStore, TelemetryStore};
use host_telemetry::supervisor::Supervisor;
use tokio::net::TcpListener;

use super::helpers::*;

async fn start(
    dir: &tempfile::TempDir,
    store: Arc<MemoryStore>,
    activity: Vec<Box<dyn ActivityProvider>>,
) -> Supervisor {
    Supervisor::start(
        &create_test_config(dir.path()),
        store,
        Arc::new(StaticProvider::nominal()),
        activity,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_stop_twice_clears_every_flag() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = start(&dir, Arc::new(MemoryStore::new()), vec![]).await;

    assert!(supervisor.is_running());
    assert!(supervisor.producer_states().iter().all(|p| p.running));

    supervisor.stop();
    supervisor.stop();

    assert!(!supervisor.is_running());
    let states = supervisor.producer_states();
    assert_eq!(states.len(), 3);
    assert!(states.iter().all(|p| !p.running), "still running: {states:?}");

    tokio::time::timeout(Duration::from_secs(5), supervisor.join())
        .await
        .expect("producers did not stop");
}

#[tokio::test]
async fn test_status_file_follows_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let supervisor = start(&dir, Arc::new(MemoryStore::new()), vec![]).await;

    let written = status::read_status(&config.agent.status_file).await.unwrap();
    let addr = supervisor.dashboard_addr().unwrap();
    assert_eq!(written.dashboard_url, Some(format!("http://{addr}/")));
    assert_eq!(written.pid, std::process::id());

    let port = std::fs::read_to_string(&config.dashboard.discovery_file).unwrap();
    assert_eq!(port, addr.port().to_string());
    assert_eq!(written.discovery_file_error, None);

    supervisor.join().await;
    assert!(!config.agent.status_file.exists());
}

#[tokio::test]
async fn test_status_file_records_discovery_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let mut config = create_test_config(dir.path());
    config.dashboard.discovery_file = blocker.join(".telemetry_port");
    let supervisor = Supervisor::start(
        &config,
        Arc::new(MemoryStore::new()),
        Arc::new(StaticProvider::nominal()),
        vec![],
    )
    .await
    .unwrap();

    let written = status::read_status(&config.agent.status_file).await.unwrap();
    assert!(written.dashboard_url.is_some());
    assert!(
        written
            .discovery_file_error
            .is_some_and(|e| e.contains(".telemetry_port"))
    );

    supervisor.join().await;
}

#[tokio::test]
async fn test_collector_runs_while_dashboard_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let taken = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();

    let mut config = create_test_config(dir.path());
    config.dashboard.port = taken.local_addr().unwrap().port();

    let store = Arc::new(MemoryStore::new());
    let supervisor = Supervisor::start(
        &config,
        store.clone(),
        Arc::new(StaticProvider::with_cpu(90.0)),
        vec![],
    )
    .await
    .unwrap();

    assert!(supervisor.dashboard_addr().is_none());
    let states = supervisor.producer_states();
    assert!(states.iter().any(|p| p.name == "dashboard" && !p.running));
    assert!(states.iter().any(|p| p.name == "collector" && p.running));

    let report = supervisor.collector().poll_now().await.unwrap();
    assert!(report.is_success());
    assert_eq!(store.query_active_alerts().await.unwrap().len(), 1);

    let written = status::read_status(&config.agent.status_file).await.unwrap();
    assert_eq!(written.dashboard_url, None);

    supervisor.join().await;
}

#[tokio::test]
async fn test_activity_reaches_store_before_join_returns() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let input = Cursor::new("keyboard key pressed\nmouse left click\n");
    let provider: Box<dyn ActivityProvider> = Box::new(LineActivityProvider::new("fixture", input));
    let supervisor = start(&dir, store.clone(), vec![provider]).await;

    let sink = supervisor.activity_sink();
    sink.record(ActivityCategory::Screenshot, "saved screen.png");

    // the fixture provider exits at end of input
    let mut finished = false;
    for _ in 0..100 {
        if supervisor
            .producer_states()
            .iter()
            .any(|p| p.name == "provider:fixture" && !p.running)
        {
            finished = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(finished);

    supervisor.join().await;

    let events = store.query_events(Duration::ZERO).await.unwrap();
    assert_eq!(events.len(), 3);
    assert!(!sink.is_running());
}

#[tokio::test]
async fn test_stop_file_triggers_stop() {
    let dir = tempfile::tempdir().unwrap();
    let stop_file = dir.path().join("stop");

    let mut config = create_test_config(dir.path());
    config.agent.stop_file = Some(stop_file.clone());

    let supervisor = Supervisor::start(
        &config,
        Arc::new(MemoryStore::new()),
        Arc::new(StaticProvider::nominal()),
        vec![],
    )
    .await
    .unwrap();

    std::fs::write(&stop_file, "").unwrap();
    tokio::time::timeout(Duration::from_secs(5), supervisor.run())
        .await
        .expect("stop file was not noticed");

    assert!(!stop_file.exists());
    assert!(!config.agent.status_file.exists());
}
