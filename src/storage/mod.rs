//! Storage backends for telemetry persistence
//!
//! This module provides a trait-based abstraction over the store shared by
//! the collector, the activity sink and the dashboard.
//!
//! ## Design
//!
//! - **Trait-based**: `TelemetryStore` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio actors
//! - **Atomic per call**: Each append/upsert is one committed transaction
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded, durable, WAL journaling
//! - **In-Memory** (fallback): No persistence, for testing or diskless hosts
//!
//! ## Usage
//!
//! ```no_run
//! use host_telemetry::storage::{TelemetryStore, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::new("./telemetry.db").await?;
//!     let _alerts = store.query_active_alerts().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, TelemetryStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;

/// Open the backend selected by the configuration
pub async fn open(config: &StorageConfig) -> StorageResult<Arc<dyn TelemetryStore>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory store, samples will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => Ok(Arc::new(sqlite::SqliteStore::new(path).await?)),

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::BackendUnavailable(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}
