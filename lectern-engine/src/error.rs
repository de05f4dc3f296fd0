//! Error types for the engine.

use lectern_access::AccessError;
use lectern_model::ModelError;
use lectern_schema::SchemaError;
use lectern_storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path, e.g. `layout.1.heading`.
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every field that failed validation in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields().join(", ");
        write!(f, "invalid fields: {fields}")
    }
}

/// Errors that can occur while running an operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more fields failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    /// An upload collection was written without a file.
    #[error("no file was uploaded")]
    MissingFile,

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("unknown global: {0}")]
    UnknownGlobal(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    /// Document data that is not an object.
    #[error("invalid document data: {0}")]
    InvalidData(String),

    /// A user-supplied hook failed.
    #[error("{hook} hook failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The upload processor rejected or failed on a file.
    #[error("upload failed: {0}")]
    Upload(#[source] anyhow::Error),

    #[error("access error: {0}")]
    Access(#[from] AccessError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("configuration error: {0}")]
    Model(#[from] ModelError),

    /// Invalid engine configuration.
    #[error("invalid engine config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn hook(hook: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Hook { hook, source }
    }

    /// The validation entries, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
