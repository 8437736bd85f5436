//! Error types for the telemetry store
//!
//! Write failures surface to the collector as a failed tick and to the
//! activity sink as a dropped event; neither stops its loop.

use std::fmt;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    /// The database could not be opened
    ConnectionFailed(String),

    /// A statement failed (constraint, lock timeout, disk full, ...)
    QueryFailed(String),

    MigrationFailed(String),

    /// The configured backend is not compiled into this build
    BackendUnavailable(String),

    /// The record cannot be stored without loss and was not written
    InvalidRecord(String),

    /// A stored row could not be turned back into a record
    CorruptRow(String),

    Io(std::io::Error),

    /// The store has been closed
    Closed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => write!(f, "cannot open telemetry store: {msg}"),
            StorageError::QueryFailed(msg) => write!(f, "telemetry store query failed: {msg}"),
            StorageError::MigrationFailed(msg) => write!(f, "schema migration failed: {msg}"),
            StorageError::BackendUnavailable(msg) => {
                write!(f, "storage backend unavailable: {msg}")
            }
            StorageError::InvalidRecord(msg) => write!(f, "record rejected: {msg}"),
            StorageError::CorruptRow(msg) => write!(f, "corrupt row: {msg}"),
            StorageError::Io(err) => write!(f, "storage I/O error: {err}"),
            StorageError::Closed => write!(f, "storage backend is closed"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::Io(io_err),
            sqlx::Error::PoolClosed => StorageError::Closed,
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::MigrationFailed(err.to_string())
    }
}
