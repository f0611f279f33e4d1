//! Error types for hygrobot-core.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Timeout`] | Keep polling | The sensor emits roughly once a second |
//! | [`Error::NotConnected`] | Reconnect with backoff | The link was lost |
//! | [`Error::ConnectionFailed`] | Reconnect with backoff | Port may be temporarily absent |
//! | [`Error::Io`] | Reconnect | Usually means the port went away |
//! | [`Error::InvalidFrame`] | Skip the frame | Corruption, the next frame is independent |
//! | [`Error::Cancelled`] | Stop | Intentional shutdown |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration and restart |
//!
//! Frame-level problems never tear down the link: [`crate::parse_frame`]
//! returns `None` for malformed frames and the reader moves on.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while reading the telemetry link or running the
/// alerting pipeline.
///
/// Marked `#[non_exhaustive]` to allow adding variants without breaking
/// downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Operation attempted while the link is not connected.
    #[error("Not connected to sensor link")]
    NotConnected,

    /// Opening the link failed.
    #[error("Connection failed on {port}: {reason}")]
    ConnectionFailed {
        /// Port path that failed to open.
        port: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A frame arrived but could not be interpreted.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error on the underlying port.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Domain validation failure.
    #[error(transparent)]
    Validation(#[from] hygrobot_types::ValidationError),

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap a storage backend error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
