//! Dashboard error types and conversions

use std::fmt;
use std::net::IpAddr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::storage::StorageError;

/// Errors raised while starting or serving the dashboard
#[derive(Debug)]
pub enum DashboardError {
    /// Reading the store for a page failed
    Storage(StorageError),

    /// Writing the page failed
    Render(fmt::Error),

    /// Every candidate port was already bound
    NoFreePort(Vec<u16>),

    /// The configured address is reachable from other hosts
    NotLoopback(IpAddr),

    Io(std::io::Error),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::Storage(err) => write!(f, "failed to read dashboard data: {}", err),
            DashboardError::Render(err) => write!(f, "failed to render dashboard: {}", err),
            DashboardError::NoFreePort(ports) => {
                write!(f, "no free port among {} candidates {:?}", ports.len(), ports)
            }
            DashboardError::NotLoopback(addr) => {
                write!(f, "refusing to serve the dashboard on non-loopback address {}", addr)
            }
            DashboardError::Io(err) => write!(f, "dashboard I/O error: {}", err),
        }
    }
}

impl std::error::Error for DashboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DashboardError::Storage(err) => Some(err),
            DashboardError::Render(err) => Some(err),
            DashboardError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        error!("dashboard request failed: {self}");

        (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error").into_response()
    }
}

impl From<StorageError> for DashboardError {
    fn from(err: StorageError) -> Self {
        DashboardError::Storage(err)
    }
}

impl From<fmt::Error> for DashboardError {
    fn from(err: fmt::Error) -> Self {
        DashboardError::Render(err)
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Io(err)
    }
}
