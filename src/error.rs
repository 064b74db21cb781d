//! Error types for the stream core.

use std::time::Duration;
use thiserror::Error;

/// Main failure type carried by `Notification::Error`.
///
/// Every failure travels the reactive channel as a notification; the core
/// never panics across a subscription boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The per-item worker failed synchronously while producing an inner stream.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// The first notification did not arrive within the deadline.
    #[error("No notification within {0:?}")]
    Timeout(Duration),

    /// A source or inner stream signalled failure.
    #[error("Stream failed: {0}")]
    Stream(String),
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
