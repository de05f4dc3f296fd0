use crate::error::{AccessError, AccessGateResult};
use lectern_model::{AccessArgs, AccessResult, EntityAccess, FieldAccess, RequestContext};
use lectern_types::{DocumentId, Operation, Where};
use serde_json::Value;
use tracing::debug;

/// Outcome of an entity-level access check.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    Allow,
    Deny,
    /// Allowed for documents matching the clause.
    AllowWithFilter(Where),
}

/// Outcome of a single-document lookup under an [`AccessDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    NotFound,
    Forbidden,
}

impl AccessDecision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny)
    }

    pub fn filter(&self) -> Option<&Where> {
        match self {
            Self::AllowWithFilter(clause) => Some(clause),
            _ => None,
        }
    }

    /// Narrows `query` by the access filter. `None` when denied outright.
    pub fn restrict(&self, query: Where) -> Option<Where> {
        match self {
            Self::Allow => Some(query),
            Self::Deny => None,
            Self::AllowWithFilter(clause) => Some(query.and_also(clause.clone())),
        }
    }

    /// Classifies a restricted lookup. A plain deny never discloses
    /// existence; a miss under a filter reports the document as forbidden.
    pub fn admit(&self, found: bool) -> Admission {
        match (self, found) {
            (Self::Deny, _) => Admission::NotFound,
            (_, true) => Admission::Admitted,
            (Self::Allow, false) => Admission::NotFound,
            (Self::AllowWithFilter(_), false) => Admission::Forbidden,
        }
    }
}

impl From<AccessResult> for AccessDecision {
    fn from(result: AccessResult) -> Self {
        match result {
            AccessResult::Allow => Self::Allow,
            AccessResult::Deny => Self::Deny,
            AccessResult::Where(clause) => Self::AllowWithFilter(clause),
        }
    }
}

/// Evaluates access predicates against a request.
///
/// Entities without a predicate for an operation admit signed-in users
/// only. Fields without a predicate admit everyone. `override_access`
/// on the request bypasses both.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    pub fn new() -> Self {
        Self
    }

    pub async fn check(
        &self,
        access: &EntityAccess,
        operation: Operation,
        req: &RequestContext,
        id: Option<&DocumentId>,
        data: Option<&Value>,
    ) -> AccessGateResult<AccessDecision> {
        if req.override_access {
            return Ok(AccessDecision::Allow);
        }

        let decision = match access.for_operation(operation) {
            Some(predicate) => predicate
                .evaluate(&AccessArgs { req, id, data })
                .await
                .map_err(|source| AccessError::Predicate { operation, source })?
                .into(),
            None if req.is_authenticated() => AccessDecision::Allow,
            None => AccessDecision::Deny,
        };

        debug!(%operation, ?decision, "entity access evaluated");
        Ok(decision)
    }

    /// Whether a field may take part in `operation`. A filter result counts
    /// as allowed.
    pub async fn check_field(
        &self,
        access: &FieldAccess,
        operation: Operation,
        path: &str,
        req: &RequestContext,
        id: Option<&DocumentId>,
        data: Option<&Value>,
    ) -> AccessGateResult<bool> {
        if req.override_access {
            return Ok(true);
        }
        let Some(predicate) = access.for_operation(operation) else {
            return Ok(true);
        };

        let result = predicate
            .evaluate(&AccessArgs { req, id, data })
            .await
            .map_err(|source| AccessError::FieldPredicate {
                operation,
                path: path.to_string(),
                source,
            })?;
        Ok(!matches!(result, AccessResult::Deny))
    }
}
