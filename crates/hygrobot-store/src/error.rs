//! Error types for hygrobot-store.

use std::path::PathBuf;

/// Result type for hygrobot-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hygrobot-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored timestamp could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A stored row fails domain validation.
    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] hygrobot_types::ValidationError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
