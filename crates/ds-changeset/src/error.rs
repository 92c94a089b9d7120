// error.rs — Error types for the changeset subsystem.

use thiserror::Error;

/// Errors that can occur while reading records or classification labels.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid or malformed data (e.g., an unknown diff kind label).
    #[error("invalid data: {0}")]
    InvalidData(String),
}
