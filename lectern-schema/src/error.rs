//! Error types for schema compilation.

use thiserror::Error;

/// Result type for schema compilation.
pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// A field names a kind the compiler does not know.
    #[error("unknown field kind at {path}")]
    UnknownFieldKind { path: String },

    /// A relationship or upload points at an entity that is not registered.
    #[error("field {path} relates to unknown collection {target}")]
    UnknownRelation { path: String, target: String },

    /// A block slug is reused with a different field list.
    #[error("block {slug} is declared with conflicting fields at {path}")]
    ConflictingBlock { slug: String, path: String },

    /// A data-bearing field has no name.
    #[error("unnamed {kind} field at {path}")]
    UnnamedField { path: String, kind: String },
}
