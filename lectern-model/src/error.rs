//! Error types for configuration sanitization.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when an entity or field configuration violates an
/// invariant of the field tree.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid entity slug: {0:?}")]
    InvalidSlug(String),

    #[error("duplicate field name at {path}")]
    DuplicateFieldName { path: String },

    #[error("field of kind '{kind}' at {path} requires a name")]
    MissingFieldName { path: String, kind: String },

    #[error("duplicate block slug '{slug}' in {path}")]
    DuplicateBlockSlug { path: String, slug: String },

    #[error("field {path} declares no options")]
    EmptyOptions { path: String },

    #[error("field {path} declares no relation target")]
    MissingRelationTarget { path: String },
}
