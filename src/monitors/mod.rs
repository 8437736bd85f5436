//! Host metric providers
//!
//! The collector does not probe the operating system itself. It asks a
//! [`MetricsProvider`] for each sub-reading and assembles a [`MetricSample`]
//! with [`sample_host`]. A failed sub-reading falls back to a default value
//! and is reported as degraded instead of failing the whole sample.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::MetricSample;

pub mod system;

pub use system::SysinfoProvider;

/// Errors a provider can report for a single sub-reading
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The host exposes nothing for this reading (e.g. unknown mount point)
    Unavailable(String),

    /// The reading exists but could not be taken
    ReadFailed(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Unavailable(msg) => write!(f, "reading unavailable: {}", msg),
            ProviderError::ReadFailed(msg) => write!(f, "reading failed: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Network byte totals since boot, summed over all interfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkTotals {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Sub-readings that make up one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reading {
    Cpu,
    Memory,
    Disk,
    Network,
    Processes,
    Temperature,
}

/// Source of raw host metrics
///
/// Calls may block (the sysinfo implementation touches `/proc` and `/sys`),
/// so the collector runs them on the blocking thread pool.
pub trait MetricsProvider: Send + Sync {
    /// Global CPU usage in percent (0-100)
    fn cpu_percent(&self) -> Result<f64, ProviderError>;

    /// Used memory in percent (0-100)
    fn memory_percent(&self) -> Result<f64, ProviderError>;

    /// Usage of the configured mount in percent (0-100)
    fn disk_percent(&self) -> Result<f64, ProviderError>;

    fn network_totals(&self) -> Result<NetworkTotals, ProviderError>;

    fn process_count(&self) -> Result<u64, ProviderError>;

    /// `Ok(None)` when the host has no temperature sensor
    fn temperature(&self) -> Result<Option<f64>, ProviderError>;
}

/// A sample plus the sub-readings that fell back to defaults
#[derive(Debug, Clone)]
pub struct HostSample {
    pub sample: MetricSample,
    pub degraded: Vec<Reading>,
}

/// NaN and infinities count as failed readings; the store only takes finite values
fn finite(value: f64) -> Result<f64, ProviderError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProviderError::ReadFailed(format!("non-finite value {value}")))
    }
}

/// Take one sample from the provider
///
/// Each failed or non-finite sub-reading is logged, recorded in `degraded` and
/// replaced by zero (or no temperature).
pub fn sample_host(provider: &dyn MetricsProvider, timestamp: DateTime<Utc>) -> HostSample {
    let mut degraded = Vec::new();

    let mut or_default = |reading: Reading, result: Result<f64, ProviderError>| {
        result.and_then(finite).unwrap_or_else(|e| {
            warn!("{reading:?} reading failed: {e}");
            degraded.push(reading);
            0.0
        })
    };

    let cpu_percent = or_default(Reading::Cpu, provider.cpu_percent());
    let memory_percent = or_default(Reading::Memory, provider.memory_percent());
    let disk_usage_percent = or_default(Reading::Disk, provider.disk_percent());

    let network = provider.network_totals().unwrap_or_else(|e| {
        warn!("network reading failed: {e}");
        degraded.push(Reading::Network);
        NetworkTotals::default()
    });

    let process_count = provider.process_count().unwrap_or_else(|e| {
        warn!("process reading failed: {e}");
        degraded.push(Reading::Processes);
        0
    });

    let temperature_celsius = provider
        .temperature()
        .and_then(|reading| reading.map(finite).transpose())
        .unwrap_or_else(|e| {
            warn!("temperature reading failed: {e}");
            degraded.push(Reading::Temperature);
            None
        });

    HostSample {
        sample: MetricSample {
            timestamp,
            cpu_percent,
            memory_percent,
            disk_usage_percent,
            network_bytes_sent: network.bytes_sent,
            network_bytes_recv: network.bytes_recv,
            process_count,
            temperature_celsius,
        },
        degraded,
    }
}
