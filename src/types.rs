//! Error taxonomy and result alias
//!
//! Absent content is not an error: resolution APIs return `Option` and
//! origin failures collapse to a miss at the pipeline boundary. The
//! variants here are the conditions that are actually thrown.

use thiserror::Error;

use crate::model::StoreKey;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DepotError>;

/// Error types for the resolution and promotion engine
#[derive(Debug, Error)]
pub enum DepotError {
    /// Unknown store key (caller error, never retried)
    #[error("Store not found: {0}")]
    StoreNotFound(StoreKey),

    /// A group's constituents revisit a group already being expanded
    #[error("Group membership cycle: {0}")]
    Cycle(String),

    /// Backing store I/O failed (origin unreachable, filesystem error)
    #[error("I/O error: {0}")]
    Io(String),

    /// Origin fetch exceeded the configured per-request timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Operation not valid for this store type (e.g. write to a remote)
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Another promotion already holds the target store or result lease
    #[error("Concurrent promotion: {0}")]
    ConcurrentPromotion(String),

    /// Invalid store definition, rule set, or runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted record missing or unreadable
    #[error("Record error: {0}")]
    Record(String),

    /// Catch-all for internal invariant failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for DepotError {
    fn from(e: std::io::Error) -> Self {
        DepotError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for DepotError {
    fn from(e: serde_json::Error) -> Self {
        DepotError::Record(format!("JSON serialization failed: {e}"))
    }
}
