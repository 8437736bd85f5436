//! MetricCollectorActor - Samples the host, persists, evaluates
//!
//! ## Message Flow
//!
//! ```text
//! tick → provider (blocking pool, optional timeout) → append_metric → evaluate → upsert_alert*
//!   ↑                                                                              │
//!   └── fixed sleep ◄──────────────────────── TickReport (broadcast + tracing) ◄───┘
//!   └── Commands (PollNow)
//! ```
//!
//! ## Scheduling
//!
//! The sleep between two ticks is the full configured interval, measured from
//! the end of one tick. A slow tick therefore pushes every following tick back;
//! the loop does not try to hold a precise period.
//!
//! A failed tick is reported and abandoned. It never ends the loop.
//!
//! ## Stopping
//!
//! A stop is observed during the sleep and while waiting on the provider.
//! Once a sample has been read the tick runs to completion, so a stored
//! sample always has its alerts upserted alongside it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::alerts::{self, Thresholds};
use crate::config::CollectorConfig;
use crate::monitors::{HostSample, MetricsProvider, sample_host};
use crate::storage::TelemetryStore;
use crate::timestamp_now;

use super::messages::{CollectorCommand, TickOutcome, TickReport, TickStage};

/// Capacity of the tick report channel; slow observers lag instead of blocking
const REPORT_CHANNEL_CAPACITY: usize = 64;

/// Timing and threshold settings for one collector
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub interval: Duration,
    pub provider_timeout: Option<Duration>,
    pub thresholds: Thresholds,
}

impl CollectorSettings {
    pub fn from_config(config: &CollectorConfig, thresholds: &Thresholds) -> Self {
        Self {
            interval: config.interval(),
            provider_timeout: config.provider_timeout(),
            thresholds: *thresholds,
        }
    }
}

/// Actor that periodically samples the host
pub struct MetricCollectorActor {
    provider: Arc<dyn MetricsProvider>,

    /// Store shared with the other producers and the dashboard
    store: Arc<dyn TelemetryStore>,

    settings: CollectorSettings,

    command_rx: mpsc::Receiver<CollectorCommand>,

    /// Per-tick outcomes
    report_tx: broadcast::Sender<TickReport>,

    /// Running flag; cancelled by the supervisor or on exit
    shutdown: CancellationToken,

    ticks: u64,
}

impl MetricCollectorActor {
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        store: Arc<dyn TelemetryStore>,
        settings: CollectorSettings,
        command_rx: mpsc::Receiver<CollectorCommand>,
        report_tx: broadcast::Sender<TickReport>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
            command_rx,
            report_tx,
            shutdown,
            ticks: 0,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until the shutdown token is cancelled or every handle is dropped.
    /// A stop interrupts the sleep and a pending provider read, never the
    /// store writes of a tick already under way.
    #[instrument(skip(self), name = "collector")]
    pub async fn run(mut self) {
        debug!(
            "starting collector actor (interval {:?}, provider timeout {:?})",
            self.settings.interval, self.settings.provider_timeout
        );

        'collect: loop {
            self.ticks += 1;
            let Some(report) = self.tick(self.ticks).await else {
                break 'collect;
            };
            self.publish(&report);

            let sleep = time::sleep(self.settings.interval);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break 'collect,

                    _ = &mut sleep => break,

                    cmd = self.command_rx.recv() => match cmd {
                        Some(CollectorCommand::PollNow { respond_to }) => {
                            debug!("received PollNow command");
                            self.ticks += 1;
                            let Some(report) = self.tick(self.ticks).await else {
                                break 'collect;
                            };
                            self.publish(&report);
                            let _ = respond_to.send(report);
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break 'collect;
                        }
                    },
                }
            }
        }

        // reflect the stop in every handle, whatever caused it
        self.shutdown.cancel();
        debug!("collector actor stopped after {} ticks", self.ticks);
    }

    /// `None` when a stop arrived before the provider answered
    async fn tick(&self, tick: u64) -> Option<TickReport> {
        let started_at = timestamp_now();

        let outcome = match self.collect(started_at).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                debug!(tick, "stopped while waiting on the provider");
                return None;
            }
            Err((stage, reason)) => TickOutcome::Failed { stage, reason },
        };

        Some(TickReport {
            tick,
            started_at,
            outcome,
        })
    }

    /// One iteration: sample, persist, evaluate, upsert
    async fn collect(
        &self,
        started_at: DateTime<Utc>,
    ) -> Result<Option<TickOutcome>, (TickStage, String)> {
        let Some(HostSample { sample, degraded }) = self
            .read_provider(started_at)
            .await
            .map_err(|reason| (TickStage::Provider, reason))?
        else {
            return Ok(None);
        };

        self.store
            .append_metric(&sample)
            .await
            .map_err(|e| (TickStage::Store, e.to_string()))?;

        let raised = alerts::evaluate(&sample, &self.settings.thresholds);
        let mut ids = Vec::with_capacity(raised.len());
        for alert in raised {
            self.store
                .upsert_alert(&alert)
                .await
                .map_err(|e| (TickStage::Alerts, format!("{}: {e}", alert.id)))?;
            ids.push(alert.id);
        }

        Ok(Some(TickOutcome::Completed {
            alerts: ids,
            degraded,
        }))
    }

    /// Call the provider on the blocking pool, bounded by the optional timeout
    ///
    /// On timeout or stop the blocking call is left to finish on its own; its
    /// result is discarded. `Ok(None)` means the stop came first.
    async fn read_provider(&self, started_at: DateTime<Utc>) -> Result<Option<HostSample>, String> {
        let provider = self.provider.clone();
        let task = tokio::task::spawn_blocking(move || sample_host(provider.as_ref(), started_at));

        let bounded = async {
            let joined = match self.settings.provider_timeout {
                Some(limit) => match time::timeout(limit, task).await {
                    Ok(joined) => joined,
                    Err(_) => return Err(format!("provider did not answer within {limit:?}")),
                },
                None => task.await,
            };
            joined.map_err(|e| format!("provider task failed: {e}"))
        };

        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(None),
            joined = bounded => joined.map(Some),
        }
    }

    fn publish(&self, report: &TickReport) {
        match &report.outcome {
            TickOutcome::Completed { alerts, degraded } => {
                debug!(
                    tick = report.tick,
                    alerts = alerts.len(),
                    degraded = degraded.len(),
                    "tick completed"
                );
            }
            TickOutcome::Failed { stage, reason } => {
                warn!(tick = report.tick, %stage, "tick failed: {reason}");
            }
        }

        // no subscribers is fine
        if let Ok(receivers) = self.report_tx.send(report.clone()) {
            trace!("published tick report to {receivers} receivers");
        }
    }
}

/// Handle for controlling a MetricCollectorActor
///
/// Cheap to clone and shareable across tasks.
#[derive(Clone)]
pub struct CollectorHandle {
    sender: mpsc::Sender<CollectorCommand>,
    report_tx: broadcast::Sender<TickReport>,
    shutdown: CancellationToken,
}

impl CollectorHandle {
    /// Spawn a new collector actor
    ///
    /// The first tick runs immediately. Cancelling `shutdown` stops the actor.
    pub fn spawn(
        provider: Arc<dyn MetricsProvider>,
        store: Arc<dyn TelemetryStore>,
        settings: CollectorSettings,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (report_tx, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);

        let actor = MetricCollectorActor::new(
            provider,
            store,
            settings,
            cmd_rx,
            report_tx.clone(),
            shutdown.clone(),
        );
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender: cmd_tx,
                report_tx,
                shutdown,
            },
            task,
        )
    }

    /// Trigger an immediate tick and wait for its report
    ///
    /// Only served while the actor sleeps between ticks.
    pub async fn poll_now(&self) -> Result<TickReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CollectorCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive tick report")
    }

    /// Subscribe to the reports of every following tick
    pub fn subscribe(&self) -> broadcast::Receiver<TickReport> {
        self.report_tx.subscribe()
    }

    /// Stop the collector. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}
