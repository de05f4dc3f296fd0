//! Core type definitions for Lectern.
//!
//! This crate defines the small vocabulary shared by every other crate in
//! the engine:
//! - Document identifiers and the id types a collection may declare
//! - The lifecycle [`Operation`]s and field-processing [`Stage`]s
//! - [`Where`] query clauses used by access filters and persistence lookups
//!
//! Field configuration, schemas and the request pipeline live in their own
//! crates and build on these types.

mod ids;
mod operation;
mod query;

pub use ids::{DocumentId, IdType};
pub use operation::{Operation, Stage};
pub use query::{FieldCondition, Operator, Where};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid document id: {0}")]
    InvalidId(String),
}
