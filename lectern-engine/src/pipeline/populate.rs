use super::Walk;
use crate::error::EngineResult;
use async_trait::async_trait;
use lectern_model::{Field, FieldKind, RelationTo, RequestContext};
use lectern_types::DocumentId;
use serde_json::Value;

/// Resolves relationship ids into documents during `afterRead`.
///
/// Implementations read through the full read-by-id path, so nested reads
/// observe the target's access rules and hooks. `Ok(None)` leaves the raw
/// id in place.
#[async_trait]
pub trait RelationResolver: Send + Sync {
    async fn resolve(
        &self,
        collection: &str,
        id: &DocumentId,
        depth: u32,
        req: &RequestContext,
    ) -> EngineResult<Option<Value>>;
}

/// Resolves nothing; every reference stays a raw id.
pub struct NoPopulation;

#[async_trait]
impl RelationResolver for NoPopulation {
    async fn resolve(
        &self,
        _collection: &str,
        _id: &DocumentId,
        _depth: u32,
        _req: &RequestContext,
    ) -> EngineResult<Option<Value>> {
        Ok(None)
    }
}

impl Walk<'_> {
    pub(super) async fn populate(&self, field: &Field, value: &mut Value) -> EngineResult<()> {
        let depth = self.ctx.depth.saturating_sub(1);
        match &field.kind {
            FieldKind::Upload { relation_to } => self.populate_one(relation_to, value, depth).await,
            FieldKind::Relationship { relation_to: RelationTo::One(target), has_many } => {
                if *has_many {
                    if let Value::Array(items) = value {
                        for item in items {
                            self.populate_one(target, item, depth).await?;
                        }
                    }
                    Ok(())
                } else {
                    self.populate_one(target, value, depth).await
                }
            }
            FieldKind::Relationship { relation_to: RelationTo::Many(_), has_many } => {
                if *has_many {
                    if let Value::Array(items) = value {
                        for item in items {
                            self.populate_polymorphic(item, depth).await?;
                        }
                    }
                    Ok(())
                } else {
                    self.populate_polymorphic(value, depth).await
                }
            }
            _ => Ok(()),
        }
    }

    /// Populates the `value` of a `{relationTo, value}` pointer.
    async fn populate_polymorphic(&self, pointer: &mut Value, depth: u32) -> EngineResult<()> {
        let Some(target) = pointer
            .get("relationTo")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return Ok(());
        };
        match pointer.get_mut("value") {
            Some(value) => self.populate_one(&target, value, depth).await,
            None => Ok(()),
        }
    }

    async fn populate_one(&self, target: &str, value: &mut Value, depth: u32) -> EngineResult<()> {
        // Already-populated objects and nulls have no id to resolve.
        let Some(id) = DocumentId::from_value(value) else {
            return Ok(());
        };
        if let Some(doc) = self.resolver.resolve(target, &id, depth, self.ctx.req).await? {
            *value = doc;
        }
        Ok(())
    }
}
