//! Loopback HTML dashboard
//!
//! ## Endpoints
//!
//! - `GET /` - Dashboard page
//! - `GET /dashboard` - Same page
//!
//! Other methods on these paths answer 405; every other path answers 404.
//!
//! ## Port selection
//!
//! The primary port and then each fallback are tried in order; the first one
//! that binds wins and is written to the discovery file. When none binds,
//! startup fails with [`DashboardError::NoFreePort`] and the caller carries on
//! without a dashboard.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::DashboardConfig;
use crate::storage::TelemetryStore;

pub mod error;
pub mod render;
pub mod routes;

pub use error::DashboardError;
pub use render::{OperationalSummary, StatusBand};
pub use routes::DashboardState;

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(routes::dashboard_page))
        .route("/dashboard", get(routes::dashboard_page))
        .fallback(routes::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind the first candidate port that is free
pub async fn bind_first_available(
    address: IpAddr,
    ports: &[u16],
) -> Result<TcpListener, DashboardError> {
    for &port in ports {
        match TcpListener::bind(SocketAddr::new(address, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => debug!("port {port} unavailable: {e}"),
        }
    }

    Err(DashboardError::NoFreePort(ports.to_vec()))
}

/// Write the bound port as plain text
pub async fn write_discovery_file(path: &Path, port: u16) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, port.to_string()).await
}

/// A running dashboard server
pub struct DashboardHandle {
    addr: SocketAddr,
    discovery_error: Option<String>,
    task: JoinHandle<()>,
}

impl DashboardHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Set when the bound port could not be written to the discovery file
    pub fn discovery_file_error(&self) -> Option<&str> {
        self.discovery_error.as_deref()
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Wait until the server has closed its socket
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("dashboard task panicked: {e}");
        }
    }
}

/// Bind, publish the port and serve until `shutdown` is cancelled
///
/// `shutdown` is also cancelled when the server exits on its own, so it can
/// serve as the dashboard's running flag.
pub async fn spawn_dashboard(
    config: &DashboardConfig,
    store: Arc<dyn TelemetryStore>,
    summary: OperationalSummary,
    shutdown: CancellationToken,
) -> Result<DashboardHandle, DashboardError> {
    if !config.address.is_loopback() {
        return Err(DashboardError::NotLoopback(config.address));
    }

    let listener = bind_first_available(config.address, &config.candidate_ports()).await?;
    let addr = listener.local_addr()?;
    info!("dashboard listening on http://{addr}/");

    let discovery_error = match write_discovery_file(&config.discovery_file, addr.port()).await {
        Ok(()) => None,
        Err(e) => {
            let error = format!("{}: {e}", config.discovery_file.display());
            warn!("failed to write discovery file {error}");
            Some(error)
        }
    };

    let app = router(DashboardState {
        store,
        summary: Arc::new(summary),
    });

    let task = tokio::spawn(async move {
        let signal = shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await;

        if let Err(e) = result {
            error!("dashboard server failed: {e}");
        }
        shutdown.cancel();
        debug!("dashboard server stopped");
    });

    Ok(DashboardHandle {
        addr,
        discovery_error,
        task,
    })
}
