//! Error types for glimpse-sync

use thiserror::Error;

/// Result type alias using glimpse-sync's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in local storage and write-path operations
///
/// Remote failures never surface here: they are handled inside the sync
/// service per operation (see `service`). Callers of the write API only
/// ever see local storage failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
