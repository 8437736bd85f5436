//! Row layouts and timestamp encoding
//!
//! Timestamps are stored as Unix nanoseconds (UTC), so every instant between
//! 1677 and 2262 round-trips exactly. Integers compare the same way the
//! instants do, which keeps the timestamp indexes usable for window scans and
//! ordering.
//!
//! Records that cannot be stored without loss are rejected with
//! [`StorageError::InvalidRecord`] before they reach a backend: timestamps
//! outside the nanosecond range, counters above `i64::MAX` and non-finite
//! floats.
//!
//! | table           | kind        | key                    |
//! |-----------------|-------------|------------------------|
//! | `metrics`       | append-only | autoincrement `id`     |
//! | `activity_logs` | append-only | autoincrement `id`     |
//! | `alerts`        | upsert      | `id` (alert identifier)|

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::error::{StorageError, StorageResult};
use crate::{ActivityCategory, ActivityEvent, Alert, MetricSample};

pub fn timestamp_to_nanos(dt: &DateTime<Utc>) -> StorageResult<i64> {
    dt.timestamp_nanos_opt()
        .ok_or_else(|| StorageError::InvalidRecord(format!("timestamp out of range: {dt}")))
}

pub fn nanos_to_timestamp(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

/// Lower bound of a `since` window, or `None` for the full history.
pub fn window_start(now: DateTime<Utc>, since: Duration) -> Option<DateTime<Utc>> {
    if since.is_zero() {
        return None;
    }

    let since = chrono::Duration::from_std(since).ok()?;
    now.checked_sub_signed(since)
}

/// Window bound as stored nanoseconds; bounds before 1677 select everything
pub fn window_start_nanos(now: DateTime<Utc>, since: Duration) -> Option<i64> {
    window_start(now, since).and_then(|start| start.timestamp_nanos_opt())
}

/// Counters are `u64` in memory and `INTEGER` (signed 64-bit) on disk.
pub fn counter_to_i64(value: u64, column: &str) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidRecord(format!("{column} too large to store: {value}")))
}

pub fn i64_to_counter(value: i64, column: &str) -> StorageResult<u64> {
    u64::try_from(value)
        .map_err(|_| StorageError::CorruptRow(format!("negative value in {column}: {value}")))
}

fn finite(value: f64, column: &str) -> StorageResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StorageError::InvalidRecord(format!("{column} is not finite: {value}")))
    }
}

/// One row of the `metrics` table
#[cfg_attr(feature = "storage-sqlite", derive(sqlx::FromRow))]
#[derive(Debug, Clone)]
pub struct MetricRow {
    pub timestamp: i64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_usage: f64,
    pub network_sent: i64,
    pub network_recv: i64,
    pub processes_count: i64,
    pub temperature: Option<f64>,
}

impl TryFrom<&MetricSample> for MetricRow {
    type Error = StorageError;

    fn try_from(sample: &MetricSample) -> StorageResult<Self> {
        Ok(Self {
            timestamp: timestamp_to_nanos(&sample.timestamp)?,
            cpu_percent: finite(sample.cpu_percent, "cpu_percent")?,
            memory_percent: finite(sample.memory_percent, "memory_percent")?,
            disk_usage: finite(sample.disk_usage_percent, "disk_usage")?,
            network_sent: counter_to_i64(sample.network_bytes_sent, "network_sent")?,
            network_recv: counter_to_i64(sample.network_bytes_recv, "network_recv")?,
            processes_count: counter_to_i64(sample.process_count, "processes_count")?,
            temperature: sample
                .temperature_celsius
                .map(|t| finite(t, "temperature"))
                .transpose()?,
        })
    }
}

impl TryFrom<MetricRow> for MetricSample {
    type Error = StorageError;

    fn try_from(row: MetricRow) -> StorageResult<Self> {
        Ok(Self {
            timestamp: nanos_to_timestamp(row.timestamp),
            cpu_percent: row.cpu_percent,
            memory_percent: row.memory_percent,
            disk_usage_percent: row.disk_usage,
            network_bytes_sent: i64_to_counter(row.network_sent, "network_sent")?,
            network_bytes_recv: i64_to_counter(row.network_recv, "network_recv")?,
            process_count: i64_to_counter(row.processes_count, "processes_count")?,
            temperature_celsius: row.temperature,
        })
    }
}

/// One row of the `activity_logs` table
#[cfg_attr(feature = "storage-sqlite", derive(sqlx::FromRow))]
#[derive(Debug, Clone)]
pub struct EventRow {
    pub timestamp: i64,
    #[cfg_attr(feature = "storage-sqlite", sqlx(rename = "type"))]
    pub category: String,
    pub description: String,
}

impl TryFrom<EventRow> for ActivityEvent {
    type Error = StorageError;

    fn try_from(row: EventRow) -> StorageResult<Self> {
        Ok(Self {
            timestamp: nanos_to_timestamp(row.timestamp),
            category: ActivityCategory::parse_lossy(&row.category),
            description: row.description,
        })
    }
}

/// One row of the `alerts` table
#[cfg_attr(feature = "storage-sqlite", derive(sqlx::FromRow))]
#[derive(Debug, Clone)]
pub struct AlertRow {
    pub id: String,
    pub level: String,
    pub message: String,
    pub timestamp: i64,
    pub resolved: bool,
}

impl TryFrom<AlertRow> for Alert {
    type Error = StorageError;

    fn try_from(row: AlertRow) -> StorageResult<Self> {
        Ok(Self {
            level: row.level.parse().map_err(StorageError::CorruptRow)?,
            timestamp: nanos_to_timestamp(row.timestamp),
            id: row.id,
            message: row.message,
            resolved: row.resolved,
        })
    }
}
