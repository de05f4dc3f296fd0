//! Error types for access evaluation.

use lectern_types::Operation;
use thiserror::Error;

pub type AccessGateResult<T> = Result<T, AccessError>;

#[derive(Debug, Error)]
pub enum AccessError {
    /// A user-supplied predicate failed.
    #[error("{operation} access predicate failed: {source}")]
    Predicate {
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },

    /// A field-level predicate failed.
    #[error("{operation} access predicate on field {path} failed: {source}")]
    FieldPredicate {
        operation: Operation,
        path: String,
        #[source]
        source: anyhow::Error,
    },
}
