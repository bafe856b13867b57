//! Error types for the collector boundary
//!
//! Per-source failures never surface here; they are carried inside
//! [`RawFragment`](crate::types::RawFragment) values and the record status.

use thiserror::Error;

/// Collector result type
pub type CollectorResult<T> = std::result::Result<T, CollectorError>;

/// Errors raised by a collection call
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Batch contained no identifiers
    #[error("Empty batch: at least one identifier is required")]
    EmptyBatch,

    /// Identifier was empty or whitespace
    #[error("Invalid identifier at position {position}: identifiers must be non-empty")]
    InvalidIdentifier { position: usize },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every source failed for every identifier
    #[error("All sources failed for all {count} identifier(s)")]
    AllSourcesFailed { count: usize },

    /// Batch was cancelled before completion
    #[error("Collection cancelled")]
    Cancelled,

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Output rendering failed
    #[error("Output error: {0}")]
    Output(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// gameinsights-common error
    #[error("Common error: {0}")]
    Common(#[from] gameinsights_common::Error),
}

impl From<csv::Error> for CollectorError {
    fn from(err: csv::Error) -> Self {
        CollectorError::Output(err.to_string())
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::Output(err.to_string())
    }
}
