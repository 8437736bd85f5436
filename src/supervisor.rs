//! Agent supervisor
//!
//! Owns the stop signal and the lifecycle of every producer:
//!
//! - the metric collector (tokio task)
//! - the activity intake (tokio task) and one OS thread per capture provider
//! - the dashboard server (tokio task, optional)
//!
//! Every producer gets a child of the supervisor's cancellation token. The
//! child doubles as the producer's running flag: it is cancelled by
//! [`Supervisor::stop`] and by the producer itself when it exits.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actors::activity::ActivitySink;
use crate::actors::capture::{self, ActivityProvider};
use crate::actors::collector::{CollectorHandle, CollectorSettings};
use crate::actors::messages::TickReport;
use crate::config::{AgentConfig, AgentSettings};
use crate::dashboard::{self, DashboardHandle, OperationalSummary};
use crate::monitors::MetricsProvider;
use crate::status::{self, AgentStatus};
use crate::storage::TelemetryStore;

/// How often the stop file is looked for
const STOP_FILE_POLL: Duration = Duration::from_secs(1);

/// Running flag of one producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerState {
    pub name: String,
    pub running: bool,
}

/// Operator-facing description of the stop triggers
pub fn stop_hint(settings: &AgentSettings) -> String {
    match &settings.stop_file {
        Some(path) => format!("press Ctrl-C or create {}", path.display()),
        None => "press Ctrl-C".to_string(),
    }
}

pub struct Supervisor {
    shutdown: CancellationToken,

    collector: CollectorHandle,
    collector_task: JoinHandle<()>,

    sink: ActivitySink,
    intake_task: JoinHandle<()>,

    /// Capture threads are not joined: a provider blocked on a read would
    /// hold up the stop. Only their running flags are tracked.
    providers: Vec<(String, CancellationToken)>,

    dashboard: Option<DashboardHandle>,
    dashboard_running: CancellationToken,

    status_file: PathBuf,
    stop_file: Option<PathBuf>,
}

impl Supervisor {
    /// Launch every producer
    ///
    /// A dashboard that cannot start is logged and left out; the other
    /// producers run regardless.
    pub async fn start(
        config: &AgentConfig,
        store: Arc<dyn TelemetryStore>,
        metrics: Arc<dyn MetricsProvider>,
        activity: Vec<Box<dyn ActivityProvider>>,
    ) -> Result<Self> {
        let shutdown = CancellationToken::new();

        if let Some(stop_file) = &config.agent.stop_file {
            // a leftover from the last run would stop us right away
            if stop_file.exists() {
                debug!("removing stale stop file {}", stop_file.display());
                tokio::fs::remove_file(stop_file).await?;
            }
        }

        let (collector, collector_task) = CollectorHandle::spawn(
            metrics,
            store.clone(),
            CollectorSettings::from_config(&config.collector, &config.thresholds),
            shutdown.child_token(),
        );

        let (sink, intake_task) = ActivitySink::spawn(store.clone(), shutdown.child_token());

        let mut providers = Vec::with_capacity(activity.len());
        for provider in activity {
            let name = provider.name().to_string();
            let running = shutdown.child_token();

            match capture::spawn_provider(provider, sink.clone(), running.clone()) {
                Ok(_detached) => providers.push((name, running)),
                Err(e) => warn!("failed to start activity provider {name}: {e}"),
            }
        }

        let hint = stop_hint(&config.agent);
        let dashboard_running = shutdown.child_token();
        let dashboard = if config.dashboard.enabled {
            let summary = OperationalSummary {
                collection_interval: config.collector.interval(),
                refresh_secs: config.dashboard.refresh_secs,
                stop_hint: hint.clone(),
            };

            match dashboard::spawn_dashboard(
                &config.dashboard,
                store.clone(),
                summary,
                dashboard_running.clone(),
            )
            .await
            {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("dashboard unavailable: {e}");
                    dashboard_running.cancel();
                    None
                }
            }
        } else {
            debug!("dashboard disabled");
            dashboard_running.cancel();
            None
        };

        let supervisor = Self {
            shutdown,
            collector,
            collector_task,
            sink,
            intake_task,
            providers,
            dashboard,
            dashboard_running,
            status_file: config.agent.status_file.clone(),
            stop_file: config.agent.stop_file.clone(),
        };

        let agent_status = AgentStatus::new(supervisor.dashboard.as_ref().map(|d| d.url()), hint)
            .with_discovery_file_error(
                supervisor
                    .dashboard
                    .as_ref()
                    .and_then(|d| d.discovery_file_error().map(str::to_string)),
            );
        if let Err(e) = status::write_status(&supervisor.status_file, &agent_status).await {
            warn!(
                "failed to write status file {}: {e}",
                supervisor.status_file.display()
            );
        }

        info!(
            "agent started ({} activity providers, dashboard {})",
            supervisor.providers.len(),
            supervisor
                .dashboard
                .as_ref()
                .map(|d| d.url())
                .unwrap_or_else(|| "unavailable".to_string())
        );

        Ok(supervisor)
    }

    /// Sink for events from sources that are not providers
    pub fn activity_sink(&self) -> ActivitySink {
        self.sink.clone()
    }

    pub fn collector(&self) -> &CollectorHandle {
        &self.collector
    }

    pub fn dashboard_addr(&self) -> Option<SocketAddr> {
        self.dashboard.as_ref().map(|d| d.local_addr())
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<TickReport> {
        self.collector.subscribe()
    }

    /// Signal every producer to stop. Idempotent.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!("stopping agent");
        }
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    pub fn producer_states(&self) -> Vec<ProducerState> {
        let mut states = vec![
            ProducerState {
                name: "collector".to_string(),
                running: self.collector.is_running(),
            },
            ProducerState {
                name: "activity".to_string(),
                running: self.sink.is_running(),
            },
            ProducerState {
                name: "dashboard".to_string(),
                running: !self.dashboard_running.is_cancelled(),
            },
        ];

        states.extend(self.providers.iter().map(|(name, running)| ProducerState {
            name: format!("provider:{name}"),
            running: !running.is_cancelled(),
        }));
        states
    }

    /// Wait for a stop trigger, then signal the stop
    ///
    /// Triggers: Ctrl-C, SIGTERM (unix), the stop file appearing, or
    /// [`Supervisor::stop`] from elsewhere.
    pub async fn wait_for_stop(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = ctrl_c() => info!("received Ctrl-C"),
            _ = terminate() => info!("received SIGTERM"),
            _ = watch_stop_file(self.stop_file.as_deref()) => info!("stop file appeared"),
        }

        self.stop();
    }

    /// Stop and wait for the producers to finish
    ///
    /// Queued activity events are persisted before this returns.
    pub async fn join(self) {
        self.stop();

        if let Err(e) = self.collector_task.await {
            error!("collector task panicked: {e}");
        }
        if let Err(e) = self.intake_task.await {
            error!("activity intake task panicked: {e}");
        }
        if let Some(dashboard) = self.dashboard {
            dashboard.join().await;
        }

        if let Err(e) = status::remove_status(&self.status_file).await {
            warn!(
                "failed to remove status file {}: {e}",
                self.status_file.display()
            );
        }
        debug!("all producers stopped");
    }

    /// Wait for a stop trigger and shut down
    pub async fn run(self) {
        self.wait_for_stop().await;
        self.join().await;
    }
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("cannot listen for SIGTERM: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Resolves once `path` exists; never resolves without a path
async fn watch_stop_file(path: Option<&Path>) {
    let Some(path) = path else {
        return std::future::pending().await;
    };

    let mut poll = time::interval(STOP_FILE_POLL);
    loop {
        poll.tick().await;
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!("could not remove stop file {}: {e}", path.display());
            }
            return;
        }
    }
}
