//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `TelemetryStore` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers never block the writers and vice versa
//! - **synchronous = FULL**: A committed write survives a crash or power loss
//! - **Connection pooling**: Collector, activity sink and dashboard each grab
//!   a connection per operation and return it immediately
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Concurrency
//!
//! Every write is a single statement, which SQLite runs as its own
//! transaction. Concurrent writers serialise on the database lock; the busy
//! timeout makes them wait instead of failing.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, trace, warn};

use super::backend::{HealthStatus, TelemetryStore};
use super::error::{StorageError, StorageResult};
use super::schema::{AlertRow, EventRow, MetricRow, timestamp_to_nanos, window_start_nanos};
use crate::{ActivityCategory, ActivityEvent, Alert, MetricSample, timestamp_now};

/// SQLite storage backend
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`
    ///
    /// This will:
    /// 1. Create the parent directory and database file if missing
    /// 2. Configure WAL journaling with full synchronous commits
    /// 3. Run migrations to create the tables and indexes
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use host_telemetry::storage::sqlite::SqliteStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = SqliteStore::new("./telemetry.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref();
        let db_path_str = db_path.to_string_lossy().to_string();

        info!("initializing SQLite store at: {}", db_path_str);

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("SQLite store ready");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }
}

#[async_trait]
impl TelemetryStore for SqliteStore {
    #[instrument(skip_all, fields(timestamp = %sample.timestamp))]
    async fn append_metric(&self, sample: &MetricSample) -> StorageResult<()> {
        let row = MetricRow::try_from(sample)?;

        sqlx::query(
            r#"
            INSERT INTO metrics (
                timestamp, cpu_percent, memory_percent, disk_usage,
                network_sent, network_recv, processes_count, temperature
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.timestamp)
        .bind(row.cpu_percent)
        .bind(row.memory_percent)
        .bind(row.disk_usage)
        .bind(row.network_sent)
        .bind(row.network_recv)
        .bind(row.processes_count)
        .bind(row.temperature)
        .execute(&self.pool)
        .await?;

        trace!("metric sample committed");
        Ok(())
    }

    #[instrument(skip(self, description))]
    async fn append_event(
        &self,
        category: ActivityCategory,
        description: &str,
    ) -> StorageResult<ActivityEvent> {
        let event = ActivityEvent {
            timestamp: timestamp_now(),
            category,
            description: description.to_string(),
        };

        sqlx::query("INSERT INTO activity_logs (timestamp, type, description) VALUES (?, ?, ?)")
            .bind(timestamp_to_nanos(&event.timestamp)?)
            .bind(event.category.as_str())
            .bind(&event.description)
            .execute(&self.pool)
            .await?;

        Ok(event)
    }

    #[instrument(skip_all, fields(id = %alert.id))]
    async fn upsert_alert(&self, alert: &Alert) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, level, message, timestamp, resolved)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                level = excluded.level,
                message = excluded.message,
                timestamp = excluded.timestamp,
                resolved = excluded.resolved
            "#,
        )
        .bind(&alert.id)
        .bind(alert.level.as_str())
        .bind(&alert.message)
        .bind(timestamp_to_nanos(&alert.timestamp)?)
        .bind(alert.resolved)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn resolve_alert(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE alerts SET resolved = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn query_metrics(&self, since: Duration) -> StorageResult<Vec<MetricSample>> {
        let cutoff = window_start_nanos(Utc::now(), since).unwrap_or(i64::MIN);

        let rows: Vec<MetricRow> = sqlx::query_as(
            r#"
            SELECT timestamp, cpu_percent, memory_percent, disk_usage,
                   network_sent, network_recv, processes_count, temperature
            FROM metrics
            WHERE timestamp >= ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        debug!("query returned {} metrics", rows.len());
        rows.into_iter().map(MetricSample::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn query_events(&self, since: Duration) -> StorageResult<Vec<ActivityEvent>> {
        let cutoff = window_start_nanos(Utc::now(), since).unwrap_or(i64::MIN);

        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT timestamp, type, description
            FROM activity_logs
            WHERE timestamp >= ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        debug!("query returned {} events", rows.len());
        rows.into_iter().map(ActivityEvent::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn query_active_alerts(&self) -> StorageResult<Vec<Alert>> {
        let rows: Vec<AlertRow> = sqlx::query_as(
            r#"
            SELECT id, level, message, timestamp, resolved
            FROM alerts
            WHERE resolved = 0
            ORDER BY timestamp DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        // Simple ping query to verify connection
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite store");
        self.pool.close().await;
        Ok(())
    }
}
