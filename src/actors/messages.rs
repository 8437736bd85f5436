//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to specific actors via mpsc
//! 2. **Reports**: Per-tick outcomes broadcast to any number of observers
//! 3. **Immutability**: Reports are cloneable for multi-subscriber patterns

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::monitors::Reading;

/// Commands that can be sent to a MetricCollectorActor
#[derive(Debug)]
pub enum CollectorCommand {
    /// Run one tick now, outside the regular schedule
    ///
    /// The regular sleep keeps running; it is not restarted.
    PollNow {
        /// Channel to send the report back
        respond_to: oneshot::Sender<TickReport>,
    },
}

/// Stage of a tick that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStage {
    /// The provider call failed, panicked or timed out
    Provider,
    /// The sample could not be persisted
    Store,
    /// An alert upsert failed (the sample itself was stored)
    Alerts,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickStage::Provider => write!(f, "provider"),
            TickStage::Store => write!(f, "store"),
            TickStage::Alerts => write!(f, "alerts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickOutcome {
    Completed {
        /// Identifiers of the alerts upserted this tick
        alerts: Vec<String>,
        /// Sub-readings that fell back to defaults
        degraded: Vec<Reading>,
    },
    Failed {
        stage: TickStage,
        reason: String,
    },
}

/// Outcome of one collection tick
///
/// Published on the collector's report channel after every tick, whether it
/// succeeded or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Sequence number of the tick, starting at 1
    pub tick: u64,

    /// When the tick started
    pub started_at: DateTime<Utc>,

    pub outcome: TickOutcome,
}

impl TickReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TickOutcome::Completed { .. })
    }
}
