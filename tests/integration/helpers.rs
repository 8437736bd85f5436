//! Helper functions for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use host_telemetry::config::{AgentConfig, StorageConfig};
use host_telemetry::monitors::{MetricsProvider, NetworkTotals, ProviderError};
use host_telemetry::{MetricSample, timestamp_now};

/// Provider returning fixed readings, optionally after a delay
pub struct StaticProvider {
    pub cpu: Mutex<f64>,
    pub memory: f64,
    pub disk: f64,
    pub temperature: Option<f64>,
    pub delay: Option<Duration>,
}

impl StaticProvider {
    pub fn nominal() -> Self {
        Self {
            cpu: Mutex::new(10.0),
            memory: 50.0,
            disk: 10.0,
            temperature: None,
            delay: None,
        }
    }

    pub fn with_cpu(cpu: f64) -> Self {
        Self {
            cpu: Mutex::new(cpu),
            ..Self::nominal()
        }
    }

    pub fn set_cpu(&self, cpu: f64) {
        *self.cpu.lock().unwrap() = cpu;
    }
}

impl MetricsProvider for StaticProvider {
    fn cpu_percent(&self) -> Result<f64, ProviderError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(*self.cpu.lock().unwrap())
    }

    fn memory_percent(&self) -> Result<f64, ProviderError> {
        Ok(self.memory)
    }

    fn disk_percent(&self) -> Result<f64, ProviderError> {
        Ok(self.disk)
    }

    fn network_totals(&self) -> Result<NetworkTotals, ProviderError> {
        Ok(NetworkTotals {
            bytes_sent: 1_000,
            bytes_recv: 2_000,
        })
    }

    fn process_count(&self) -> Result<u64, ProviderError> {
        Ok(128)
    }

    fn temperature(&self) -> Result<Option<f64>, ProviderError> {
        Ok(self.temperature)
    }
}

pub fn create_test_sample(cpu: f64) -> MetricSample {
    MetricSample {
        timestamp: timestamp_now(),
        cpu_percent: cpu,
        memory_percent: 40.0,
        disk_usage_percent: 30.0,
        network_bytes_sent: 10,
        network_bytes_recv: 20,
        process_count: 64,
        temperature_celsius: None,
    }
}

/// Config with every artifact inside `dir` and an ephemeral dashboard port
pub fn create_test_config(dir: &Path) -> AgentConfig {
    let mut config = AgentConfig::default();

    config.storage = StorageConfig::None;
    config.collector.interval_secs = 1;
    config.collector.provider_timeout_secs = 5;
    config.dashboard.port = 0;
    config.dashboard.fallback_ports = Vec::new();
    config.dashboard.discovery_file = dir.join(".telemetry_port");
    config.agent.status_file = dir.join(".telemetry_status");
    config.agent.error_file = dir.join(".telemetry_error");

    config
}
