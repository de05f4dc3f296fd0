//! Access predicate contract shared by entity- and field-level rules.

use crate::request::RequestContext;
use async_trait::async_trait;
use lectern_types::{DocumentId, Operation, Where};
use serde_json::Value;
use std::sync::Arc;

/// What an access predicate decided.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessResult {
    Allow,
    Deny,
    /// Allowed only for documents that also match this clause.
    Where(Where),
}

impl From<bool> for AccessResult {
    fn from(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

impl From<Where> for AccessResult {
    fn from(clause: Where) -> Self {
        Self::Where(clause)
    }
}

pub struct AccessArgs<'a> {
    pub req: &'a RequestContext,
    pub id: Option<&'a DocumentId>,
    pub data: Option<&'a Value>,
}

#[async_trait]
pub trait AccessPredicate: Send + Sync {
    async fn evaluate(&self, args: &AccessArgs<'_>) -> anyhow::Result<AccessResult>;
}

struct FnAccess<F>(F);

#[async_trait]
impl<F> AccessPredicate for FnAccess<F>
where
    F: Fn(&AccessArgs<'_>) -> AccessResult + Send + Sync,
{
    async fn evaluate(&self, args: &AccessArgs<'_>) -> anyhow::Result<AccessResult> {
        Ok((self.0)(args))
    }
}

/// Wraps a synchronous closure as an [`AccessPredicate`].
pub fn access_fn<F>(f: F) -> Arc<dyn AccessPredicate>
where
    F: Fn(&AccessArgs<'_>) -> AccessResult + Send + Sync + 'static,
{
    Arc::new(FnAccess(f))
}

/// A predicate that admits every request, signed in or not.
pub fn anyone() -> Arc<dyn AccessPredicate> {
    access_fn(|_| AccessResult::Allow)
}

/// Entity-level predicates per operation. Missing entries fall back to the
/// gate's default rule.
#[derive(Clone, Default)]
pub struct EntityAccess {
    pub create: Option<Arc<dyn AccessPredicate>>,
    pub read: Option<Arc<dyn AccessPredicate>>,
    pub update: Option<Arc<dyn AccessPredicate>>,
    pub delete: Option<Arc<dyn AccessPredicate>>,
}

impl EntityAccess {
    /// Every operation open to everyone.
    pub fn public() -> Self {
        Self {
            create: Some(anyone()),
            read: Some(anyone()),
            update: Some(anyone()),
            delete: Some(anyone()),
        }
    }

    pub fn for_operation(&self, operation: Operation) -> Option<&Arc<dyn AccessPredicate>> {
        match operation {
            Operation::Create => self.create.as_ref(),
            Operation::Read => self.read.as_ref(),
            Operation::Update => self.update.as_ref(),
            Operation::Delete => self.delete.as_ref(),
        }
    }
}
