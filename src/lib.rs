pub mod actors;
pub mod alerts;
pub mod config;
pub mod dashboard;
pub mod monitors;
pub mod status;
pub mod storage;
pub mod supervisor;
pub mod util;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current UTC time.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now()
}

/// One reading of the host, taken once per collection tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_usage_percent: f64,
    /// Bytes sent since boot, summed over all interfaces.
    pub network_bytes_sent: u64,
    /// Bytes received since boot, summed over all interfaces.
    pub network_bytes_recv: u64,
    pub process_count: u64,
    /// `None` when the host exposes no temperature sensor.
    pub temperature_celsius: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Keyboard,
    Mouse,
    Screenshot,
    Other,
}

impl ActivityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Keyboard => "keyboard",
            ActivityCategory::Mouse => "mouse",
            ActivityCategory::Screenshot => "screenshot",
            ActivityCategory::Other => "other",
        }
    }

    /// Case-insensitive parse; anything unrecognised lands in `Other`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyboard" => ActivityCategory::Keyboard,
            "mouse" => ActivityCategory::Mouse,
            "screenshot" => ActivityCategory::Screenshot,
            _ => ActivityCategory::Other,
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete, externally supplied occurrence recorded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    pub category: ActivityCategory,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(AlertLevel::Info),
            "WARNING" => Ok(AlertLevel::Warning),
            "CRITICAL" => Ok(AlertLevel::Critical),
            other => Err(format!("unknown alert level: {other}")),
        }
    }
}

/// Alert row. At most one row exists per `id`; a re-trigger replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub level: AlertLevel,
    pub message: String,
    /// Time of the most recent trigger.
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}
