//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write would duplicate a value that must be unique.
    #[error("duplicate value for {field} in {collection}")]
    DuplicateKey { collection: String, field: String },

    /// The collection was never registered with the store.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}
