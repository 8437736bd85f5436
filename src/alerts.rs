//! Threshold evaluation for metric samples
//!
//! Evaluation is a pure function of a sample and a [`Thresholds`] table. Every
//! exceeded threshold yields exactly one [`Alert`] keyed by a fixed identifier,
//! so storing the result as an upsert keeps one row per identifier.
//!
//! There is no hysteresis: a value that stays above its threshold refreshes the
//! alert on every tick, and nothing here ever marks an alert resolved.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Alert, AlertLevel, MetricSample};

/// The fixed set of alert identifiers the evaluator can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    CpuHigh,
    MemoryHigh,
    DiskHigh,
    TemperatureHigh,
}

impl AlertKind {
    pub const ALL: [AlertKind; 4] = [
        AlertKind::CpuHigh,
        AlertKind::MemoryHigh,
        AlertKind::DiskHigh,
        AlertKind::TemperatureHigh,
    ];

    /// Stable identifier used as the alert's primary key.
    pub fn id(self) -> &'static str {
        match self {
            AlertKind::CpuHigh => "cpu_high",
            AlertKind::MemoryHigh => "memory_high",
            AlertKind::DiskHigh => "disk_high",
            AlertKind::TemperatureHigh => "temperature_high",
        }
    }

    /// Severity table. Levels are assigned per identifier, not derived from the value.
    pub fn level(self) -> AlertLevel {
        match self {
            AlertKind::CpuHigh => AlertLevel::Warning,
            AlertKind::MemoryHigh => AlertLevel::Critical,
            AlertKind::DiskHigh => AlertLevel::Critical,
            AlertKind::TemperatureHigh => AlertLevel::Warning,
        }
    }

    fn message(self, value: f64) -> String {
        match self {
            AlertKind::CpuHigh => format!("High CPU usage: {value:.1}%"),
            AlertKind::MemoryHigh => format!("High memory usage: {value:.1}%"),
            AlertKind::DiskHigh => format!("High disk usage: {value:.1}%"),
            AlertKind::TemperatureHigh => format!("High temperature: {value:.1}°C"),
        }
    }

    /// The value of the sample this kind watches. `None` skips the check.
    fn observe(self, sample: &MetricSample) -> Option<f64> {
        match self {
            AlertKind::CpuHigh => Some(sample.cpu_percent),
            AlertKind::MemoryHigh => Some(sample.memory_percent),
            AlertKind::DiskHigh => Some(sample.disk_usage_percent),
            AlertKind::TemperatureHigh => sample.temperature_celsius,
        }
    }
}

/// Alerting thresholds. A value strictly above its limit raises the alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// CPU usage in percent
    pub cpu: f64,
    /// Memory usage in percent
    pub memory: f64,
    /// Disk usage in percent
    pub disk: f64,
    /// Temperature in degrees Celsius
    pub temperature: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: 80.0,
            memory: 85.0,
            disk: 90.0,
            temperature: 70.0,
        }
    }
}

impl Thresholds {
    pub fn limit(&self, kind: AlertKind) -> f64 {
        match kind {
            AlertKind::CpuHigh => self.cpu,
            AlertKind::MemoryHigh => self.memory,
            AlertKind::DiskHigh => self.disk,
            AlertKind::TemperatureHigh => self.temperature,
        }
    }
}

/// Evaluate a sample against the thresholds.
///
/// Returns one alert per exceeded threshold, in [`AlertKind::ALL`] order, each
/// stamped with the sample's timestamp.
pub fn evaluate(sample: &MetricSample, thresholds: &Thresholds) -> Vec<Alert> {
    AlertKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let value = kind.observe(sample)?;
            let limit = thresholds.limit(kind);

            if value > limit {
                trace!("{}: {value:.1} exceeds {limit:.1}", kind.id());
                Some(Alert {
                    id: kind.id().to_string(),
                    level: kind.level(),
                    message: kind.message(value),
                    timestamp: sample.timestamp,
                    resolved: false,
                })
            } else {
                None
            }
        })
        .collect()
}
