//! Status and error artifacts
//!
//! The agent has no interactive caller once it runs. Whatever an operator
//! needs to know about it (where the dashboard is, how to stop it, why setup
//! failed) is written to small local files instead.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::timestamp_now;

/// Content of the status file, written as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub started_at: DateTime<Utc>,
    pub pid: u32,
    /// Absent when the dashboard could not be started
    pub dashboard_url: Option<String>,
    pub stop_hint: String,
    /// Why the dashboard port could not be published, if it could not
    pub discovery_file_error: Option<String>,
}

impl AgentStatus {
    pub fn new(dashboard_url: Option<String>, stop_hint: impl Into<String>) -> Self {
        Self {
            started_at: timestamp_now(),
            pid: std::process::id(),
            dashboard_url,
            stop_hint: stop_hint.into(),
            discovery_file_error: None,
        }
    }

    pub fn with_discovery_file_error(mut self, error: Option<String>) -> Self {
        self.discovery_file_error = error;
        self
    }

    pub fn to_toml(&self) -> io::Result<String> {
        toml::to_string(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

async fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => tokio::fs::create_dir_all(parent).await,
        None => Ok(()),
    }
}

pub async fn write_status(path: &Path, status: &AgentStatus) -> io::Result<()> {
    create_parent(path).await?;
    tokio::fs::write(path, status.to_toml()?).await?;
    debug!("wrote status file {}", path.display());
    Ok(())
}

pub async fn read_status(path: &Path) -> io::Result<AgentStatus> {
    let content = tokio::fs::read_to_string(path).await?;
    toml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Remove the status file; a missing file is not an error
pub async fn remove_status(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Record a setup failure, with its full cause chain
pub async fn write_error(path: &Path, error: &anyhow::Error) -> io::Result<()> {
    create_parent(path).await?;
    let content = format!("{}: {:#}\n", timestamp_now().to_rfc3339(), error);
    tokio::fs::write(path, content).await
}
