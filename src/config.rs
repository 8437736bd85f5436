use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::alerts::Thresholds;
use crate::util;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./telemetry.db")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Sleep between two ticks, in seconds
    pub interval_secs: u64,

    /// Mount point whose usage is reported as disk usage
    pub disk_mount: PathBuf,

    /// Upper bound for one provider call; 0 disables the bound
    pub provider_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            disk_mount: default_disk_mount(),
            provider_timeout_secs: 30,
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn provider_timeout(&self) -> Option<Duration> {
        (self.provider_timeout_secs > 0).then(|| Duration::from_secs(self.provider_timeout_secs))
    }
}

fn default_disk_mount() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,

    /// Must be a loopback address
    pub address: IpAddr,

    /// Primary port, tried first
    pub port: u16,

    /// Tried in order when the primary port is taken
    pub fallback_ports: Vec<u16>,

    /// Client-side reload period of the page, in seconds
    pub refresh_secs: u64,

    /// Where the bound port is written for other local tools
    pub discovery_file: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            fallback_ports: (8081..=8099).collect(),
            refresh_secs: 15,
            discovery_file: PathBuf::from("./.telemetry_port"),
        }
    }
}

impl DashboardConfig {
    /// Primary port followed by the fallbacks, without duplicates.
    pub fn candidate_ports(&self) -> Vec<u16> {
        let mut ports = vec![self.port];
        for port in &self.fallback_ports {
            if !ports.contains(port) {
                ports.push(*port);
            }
        }
        ports
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Written on startup, removed on clean shutdown
    pub status_file: PathBuf,

    /// Written when setup fails
    pub error_file: PathBuf,

    /// When this file appears the agent stops
    pub stop_file: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            status_file: PathBuf::from("./.telemetry_status"),
            error_file: PathBuf::from("./.telemetry_error"),
            stop_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub storage: StorageConfig,
    pub collector: CollectorConfig,
    pub thresholds: Thresholds,
    pub dashboard: DashboardConfig,
    pub agent: AgentSettings,
}

impl AgentConfig {
    /// Load configuration from file, or use defaults if no file is found
    ///
    /// Without an explicit path, `~/.config/host-telemetry/agent.toml` is used
    /// when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            let home = dirs::home_dir()?;
            let default_path = home.join(".config/host-telemetry/agent.toml");
            default_path.exists().then_some(default_path)
        });

        let mut config = if let Some(path) = config_path {
            debug!("reading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        trace!("loaded config: {config:?}");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TELEMETRY_DB`, `TELEMETRY_PORT` and `TELEMETRY_INTERVAL`
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = util::get_db_path() {
            self.storage = StorageConfig::Sqlite { path };
        }

        if let Some(port) = util::get_port() {
            self.dashboard.port = port;
        }

        if let Some(interval) = util::get_interval() {
            self.collector.interval_secs = interval;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.collector.interval_secs == 0 {
            bail!("collector.interval_secs must be greater than zero");
        }

        if self.dashboard.enabled {
            if !self.dashboard.address.is_loopback() {
                bail!(
                    "dashboard.address must be a loopback address, got {}",
                    self.dashboard.address
                );
            }

            if self.dashboard.refresh_secs == 0 {
                bail!("dashboard.refresh_secs must be greater than zero");
            }
        }

        Ok(())
    }
}
