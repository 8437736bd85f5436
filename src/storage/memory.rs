//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running on hosts with no writable location (`backend = "none"`)
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Unbounded**: Nothing is ever evicted
//!
//! Records are validated with the same rules as the SQLite backend: a sample
//! one backend rejects is rejected by both.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, TelemetryStore};
use super::error::{StorageError, StorageResult};
use super::schema::{MetricRow, timestamp_to_nanos, window_start};
use crate::{ActivityCategory, ActivityEvent, Alert, MetricSample, timestamp_now};

#[derive(Debug, Default)]
struct Tables {
    /// `(insertion sequence, sample)`
    metrics: Vec<(u64, MetricSample)>,
    events: Vec<(u64, ActivityEvent)>,
    alerts: BTreeMap<String, Alert>,
    next_seq: u64,
    closed: bool,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rows inside the window, ordered by timestamp then insertion, newest first.
fn newest_first<T: Clone>(
    rows: &[(u64, T)],
    since: Duration,
    timestamp: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let start = window_start(Utc::now(), since);

    let mut selected: Vec<&(u64, T)> = rows
        .iter()
        .filter(|(_, row)| start.is_none_or(|start| timestamp(row) >= start))
        .collect();
    selected.sort_by(|(seq_a, a), (seq_b, b)| {
        timestamp(b)
            .cmp(&timestamp(a))
            .then_with(|| seq_b.cmp(seq_a))
    });

    selected.into_iter().map(|(_, row)| row.clone()).collect()
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn append_metric(&self, sample: &MetricSample) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }
        // same acceptance rules as the durable backend
        MetricRow::try_from(sample)?;

        let seq = tables.next_seq();
        tables.metrics.push((seq, sample.clone()));
        Ok(())
    }

    async fn append_event(
        &self,
        category: ActivityCategory,
        description: &str,
    ) -> StorageResult<ActivityEvent> {
        let mut tables = self.tables.write().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }

        let event = ActivityEvent {
            timestamp: timestamp_now(),
            category,
            description: description.to_string(),
        };
        let seq = tables.next_seq();
        tables.events.push((seq, event.clone()));
        Ok(event)
    }

    async fn upsert_alert(&self, alert: &Alert) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }
        timestamp_to_nanos(&alert.timestamp)?;

        tables.alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    async fn resolve_alert(&self, id: &str) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }

        Ok(tables
            .alerts
            .get_mut(id)
            .map(|alert| alert.resolved = true)
            .is_some())
    }

    async fn query_metrics(&self, since: Duration) -> StorageResult<Vec<MetricSample>> {
        let tables = self.tables.read().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }

        Ok(newest_first(&tables.metrics, since, |s| s.timestamp))
    }

    async fn query_events(&self, since: Duration) -> StorageResult<Vec<ActivityEvent>> {
        let tables = self.tables.read().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }

        Ok(newest_first(&tables.events, since, |e| e.timestamp))
    }

    async fn query_active_alerts(&self) -> StorageResult<Vec<Alert>> {
        let tables = self.tables.read().await;
        if tables.closed {
            return Err(StorageError::Closed);
        }

        let mut active: Vec<Alert> = tables
            .alerts
            .values()
            .filter(|alert| !alert.resolved)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(active)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let tables = self.tables.read().await;

        Ok(HealthStatus {
            healthy: !tables.closed,
            message: if tables.closed {
                "In-memory storage closed".to_string()
            } else {
                "In-memory storage operational".to_string()
            },
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("metrics".to_string(), tables.metrics.len().to_string()),
                ("events".to_string(), tables.events.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store");
        self.tables.write().await.closed = true;
        Ok(())
    }
}
