use serde::{Deserialize, Serialize};
use std::fmt;

/// A lifecycle operation performed against an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Whether this operation writes to persistence.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checkpoint in the document lifecycle at which field processing and
/// hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    BeforeValidate,
    BeforeChange,
    AfterChange,
    AfterRead,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeValidate => "beforeValidate",
            Self::BeforeChange => "beforeChange",
            Self::AfterChange => "afterChange",
            Self::AfterRead => "afterRead",
        }
    }

    /// Stages that run before the persistence step and shape the outgoing
    /// write payload.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::BeforeValidate | Self::BeforeChange)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
