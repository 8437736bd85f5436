//! Storage backend trait definition
//!
//! This module defines the `TelemetryStore` trait shared by every producer
//! (collector, activity sink) and the dashboard reader.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::{ActivityCategory, ActivityEvent, Alert, MetricSample};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Durable append/query layer over metric samples, activity events and alerts
///
/// ## Atomicity
///
/// Every method is one short-lived atomic operation. No lock or transaction is
/// held across calls, so concurrent producers never starve each other and
/// readers only ever observe committed rows.
///
/// ## Durability
///
/// A write that returns `Ok` has been committed; a crash right after the call
/// does not lose it (the in-memory backend is the documented exception).
///
/// ## Time windows
///
/// `since` is measured back from now. `Duration::ZERO` means no lower bound.
/// Results are ordered by each row's own timestamp, most recent first.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Append one metric sample
    ///
    /// A sample that cannot be stored without loss (non-finite value, counter
    /// above `i64::MAX`, timestamp outside 1677-2262) fails with
    /// [`StorageError::InvalidRecord`](super::StorageError::InvalidRecord).
    async fn append_metric(&self, sample: &MetricSample) -> StorageResult<()>;

    /// Append one activity event stamped with the current time
    ///
    /// Returns the record as stored.
    async fn append_event(
        &self,
        category: ActivityCategory,
        description: &str,
    ) -> StorageResult<ActivityEvent>;

    /// Insert or replace the alert row with the same id
    async fn upsert_alert(&self, alert: &Alert) -> StorageResult<()>;

    /// Mark an alert resolved
    ///
    /// Returns `false` when no alert with this id exists.
    async fn resolve_alert(&self, id: &str) -> StorageResult<bool>;

    /// Metric samples within the window, most recent first
    async fn query_metrics(&self, since: Duration) -> StorageResult<Vec<MetricSample>>;

    /// Activity events within the window, most recent first
    async fn query_events(&self, since: Duration) -> StorageResult<Vec<ActivityEvent>>;

    /// All alerts with `resolved = false`, most recently triggered first
    async fn query_active_alerts(&self) -> StorageResult<Vec<Alert>>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend is operational.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
