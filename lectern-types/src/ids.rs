//! Document identifiers.
//!
//! Collections use opaque UUID v7 ids unless they declare a custom id type,
//! in which case the caller supplies the id on create.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::Error;

/// The identifier type a collection stores its documents under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    /// Store-assigned UUID v7, serialized as a string.
    #[default]
    Opaque,
    /// Caller-assigned integer id.
    Number,
    /// Caller-assigned free-form string id.
    Text,
}

impl IdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
            Self::Number => "number",
            Self::Text => "text",
        }
    }
}

/// Identifier of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Number(i64),
    Text(String),
}

impl DocumentId {
    /// Generates a fresh opaque id.
    #[must_use]
    pub fn generate() -> Self {
        Self::Text(Uuid::now_v7().to_string())
    }

    /// Reads an id out of a JSON value. Only integers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }

    /// Converts the id back into a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Coerces this id to the representation required by `id_type`.
    ///
    /// Numeric strings become numbers for `IdType::Number`, numbers become
    /// strings for `IdType::Text`, and `IdType::Opaque` requires a UUID.
    pub fn coerce(&self, id_type: IdType) -> Result<Self, Error> {
        match (id_type, self) {
            (IdType::Number, Self::Number(_)) => Ok(self.clone()),
            (IdType::Number, Self::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Self::Number)
                .map_err(|_| Error::InvalidId(format!("expected a numeric id, got {s:?}"))),
            (IdType::Text, Self::Text(_)) => Ok(self.clone()),
            (IdType::Text, Self::Number(n)) => Ok(Self::Text(n.to_string())),
            (IdType::Opaque, Self::Text(s)) => {
                Uuid::parse_str(s)?;
                Ok(self.clone())
            }
            (IdType::Opaque, Self::Number(n)) => {
                Err(Error::InvalidId(format!("expected an opaque id, got {n}")))
            }
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DocumentId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
