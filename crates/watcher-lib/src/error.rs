//! Error types for the watcher library

use thiserror::Error;

/// Errors that can occur while building a world or tracking deployments
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The metrics cache has no data yet
    #[error("cache is empty")]
    CacheEmpty,

    /// The metrics source failed to answer a query
    #[error("metrics source error for {query}: {reason}")]
    Source { query: String, reason: String },

    /// Malformed input data (identifiers, query results)
    #[error("parse error: {0}")]
    Parse(String),

    /// The durable store rejected an operation
    #[error("store error: {0}")]
    Store(String),

    /// A notification channel failed to deliver
    #[error("notification to {channel} failed: {reason}")]
    Notification { channel: String, reason: String },

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatcherError>;
