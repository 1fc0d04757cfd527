//! Error types for expense-sync.

use thiserror::Error;

/// Errors that can occur when building or decoding wire messages.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization or deserialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A batch must carry at least one record
    #[error("batch must contain at least one record")]
    EmptyBatch,

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}
