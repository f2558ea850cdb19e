//! Storage error definitions.

use thiserror::Error;

/// Errors raised by the persistence layer.
///
/// These are more severe than device failures: losing breaker or cache
/// writes means the monitor can no longer trust its own state, so callers
/// always propagate them.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite rejected the statement or the connection failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value is outside its domain (e.g., unknown breaker state).
    #[error("Corrupt record in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    /// The database directory could not be created.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
