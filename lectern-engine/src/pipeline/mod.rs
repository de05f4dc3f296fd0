//! Field operation pipeline.
//!
//! One pass walks a field tree over a document for a single [`Stage`].
//! Per field, in declared order:
//!
//! 1. `afterRead` flattens localized values to the request locale and
//!    drops hidden fields
//! 2. defaults fill absent values (`beforeValidate`)
//! 3. `admin.condition` excludes hidden fields from writes
//! 4. field access drops denied fields
//! 5. validation collects one error per failing field (`beforeValidate`)
//! 6. field hooks for the stage run in order
//! 7. structural kinds recurse; relations populate on `afterRead`
//! 8. `beforeChange` unflattens localized values into the stored map
//!
//! Validation never short-circuits: every field is visited and all errors
//! surface together as [`EngineError::Validation`]. Hook and access errors
//! abort the pass at once.

mod populate;
mod validate;

pub use populate::{NoPopulation, RelationResolver};
pub(crate) use validate::REQUIRED;

use crate::error::{EngineError, EngineResult, FieldError, ValidationErrors};
use crate::locale::{fill_locales, unflatten, ResolvedLocale};
use futures::future::{BoxFuture, FutureExt};
use lectern_access::AccessGate;
use lectern_model::{Field, FieldHookArgs, FieldKind, RequestContext, ValidateArgs};
use lectern_schema::BLOCK_DISCRIMINATOR;
use lectern_types::{DocumentId, Operation, Stage};
use serde_json::{Map, Value};

/// Everything one pipeline pass needs to know about its operation.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub stage: Stage,
    pub operation: Operation,
    pub req: &'a RequestContext,
    pub id: Option<&'a DocumentId>,
    /// The projected document before this update.
    pub original_doc: Option<&'a Value>,
    /// The stored document before this update, locale maps intact.
    pub stored_doc: Option<&'a Value>,
    /// `None` when localization is off.
    pub locale: Option<&'a ResolvedLocale>,
    pub override_access: bool,
    /// Keep `hidden` fields in `afterRead` output.
    pub show_hidden_fields: bool,
    /// Remaining population depth for `afterRead`.
    pub depth: u32,
}

impl<'a> StageContext<'a> {
    pub fn new(stage: Stage, operation: Operation, req: &'a RequestContext) -> Self {
        Self {
            stage,
            operation,
            req,
            id: None,
            original_doc: None,
            stored_doc: None,
            locale: None,
            override_access: req.override_access,
            show_hidden_fields: false,
            depth: 0,
        }
    }

    #[must_use]
    pub fn at(self, stage: Stage) -> Self {
        Self { stage, ..self }
    }
}

/// Walks field trees for one stage at a time.
#[derive(Debug, Clone, Default)]
pub struct FieldPipeline {
    locales: Vec<String>,
    gate: AccessGate,
}

impl FieldPipeline {
    pub fn new(locales: Vec<String>) -> Self {
        Self {
            locales,
            gate: AccessGate::new(),
        }
    }

    /// Runs one stage over `doc`. Non-object documents pass through.
    pub async fn run(
        &self,
        fields: &[Field],
        doc: Value,
        ctx: &StageContext<'_>,
        resolver: &dyn RelationResolver,
    ) -> EngineResult<Value> {
        let Value::Object(mut root) = doc else {
            return Ok(doc);
        };
        let snapshot = Value::Object(root.clone());
        let walk = Walk {
            pipeline: self,
            ctx,
            snapshot: &snapshot,
            resolver,
        };

        let mut errors = Vec::new();
        walk.fields(fields, &mut root, ctx.original_doc, ctx.stored_doc, "", &mut errors)
            .await?;
        if !errors.is_empty() {
            return Err(EngineError::Validation(ValidationErrors(errors)));
        }
        Ok(Value::Object(root))
    }
}

struct Walk<'a> {
    pipeline: &'a FieldPipeline,
    ctx: &'a StageContext<'a>,
    /// The whole document as it entered the stage.
    snapshot: &'a Value,
    resolver: &'a dyn RelationResolver,
}

impl Walk<'_> {
    fn fields<'b>(
        &'b self,
        fields: &'b [Field],
        sibling: &'b mut Map<String, Value>,
        original: Option<&'b Value>,
        stored: Option<&'b Value>,
        prefix: &'b str,
        errors: &'b mut Vec<FieldError>,
    ) -> BoxFuture<'b, EngineResult<()>> {
        async move {
            for field in fields {
                if field.is_transparent() {
                    let children = field.sub_fields().unwrap_or_default();
                    self.fields(children, sibling, original, stored, prefix, errors)
                        .await?;
                    continue;
                }
                let Some(name) = field.name() else {
                    continue;
                };
                if matches!(field.kind, FieldKind::Unknown) {
                    continue;
                }
                let path = join(prefix, name);
                self.field(field, name, &path, sibling, original, stored, errors)
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    #[allow(clippy::too_many_arguments)]
    async fn field(
        &self,
        field: &Field,
        name: &str,
        path: &str,
        sibling: &mut Map<String, Value>,
        original: Option<&Value>,
        stored: Option<&Value>,
        errors: &mut Vec<FieldError>,
    ) -> EngineResult<()> {
        let ctx = self.ctx;
        let stage = ctx.stage;
        let locale = ctx.locale.filter(|_| field.localized);
        let original_value = original.and_then(|o| o.get(name));
        let stored_value = stored.and_then(|s| s.get(name));

        if stage == Stage::AfterRead {
            if let Some(locale) = locale.filter(|l| l.flatten) {
                if let Some(value) = sibling.get_mut(name) {
                    *value = locale.flatten_value(value);
                }
            }
            if field.hidden && !ctx.show_hidden_fields {
                sibling.remove(name);
                return Ok(());
            }
            if !self.allowed(field, Operation::Read, path).await? {
                sibling.remove(name);
                return Ok(());
            }
        }

        if stage.is_write() {
            if stage == Stage::BeforeValidate && !sibling.contains_key(name) {
                if original_value.is_none() {
                    if let Some(default) = &field.default_value {
                        sibling.insert(name.to_string(), default.clone());
                    }
                }
                if ctx.operation == Operation::Create
                    && matches!(field.kind, FieldKind::Group { .. })
                    && !sibling.contains_key(name)
                {
                    sibling.insert(name.to_string(), Value::Object(Map::new()));
                }
            }

            if let Some(condition) = &field.admin.condition {
                let sibling_view = Value::Object(sibling.clone());
                if !condition.evaluate(self.snapshot, &sibling_view) {
                    if stage == Stage::BeforeChange {
                        restore(sibling, name, stored_value);
                    }
                    return Ok(());
                }
            }

            if !self.allowed(field, ctx.operation, path).await? {
                match stage {
                    Stage::BeforeChange => restore(sibling, name, stored_value),
                    _ => {
                        sibling.remove(name);
                    }
                }
                return Ok(());
            }
        }

        if stage == Stage::BeforeValidate {
            let sibling_view = Value::Object(sibling.clone());
            let value = sibling.get(name).or(original_value);
            let result = match &field.validate {
                Some(validator) => {
                    validator
                        .validate(&ValidateArgs {
                            value,
                            data: self.snapshot,
                            sibling_data: &sibling_view,
                            operation: ctx.operation,
                            req: ctx.req,
                        })
                        .await
                }
                None => validate::builtin(field, value),
            };
            if let Err(message) = result {
                errors.push(FieldError::new(path, message));
            }
        }

        for hook in field.hooks.for_stage(stage) {
            let sibling_view = Value::Object(sibling.clone());
            let replaced = hook
                .call(&FieldHookArgs {
                    value: sibling.get(name),
                    data: self.snapshot,
                    sibling_data: &sibling_view,
                    original_doc: ctx.original_doc,
                    operation: ctx.operation,
                    req: ctx.req,
                    path,
                })
                .await
                .map_err(EngineError::hook(stage.as_str()))?;
            if let Some(value) = replaced {
                sibling.insert(name.to_string(), value);
            }
        }

        // Storage-shaped values keep one entry per locale; recurse into each.
        let per_locale = locale.is_some_and(|l| {
            stage == Stage::AfterChange || (stage == Stage::AfterRead && !l.flatten)
        });
        if let Some(value) = sibling.get_mut(name) {
            if per_locale {
                if let Value::Object(entries) = value {
                    for entry in entries.values_mut() {
                        self.descend(field, entry, None, None, path, errors).await?;
                    }
                }
            } else {
                let stored_child = match locale {
                    Some(l) => stored_value.and_then(|m| m.get(&l.write_locale)),
                    None => stored_value,
                };
                self.descend(field, value, original_value, stored_child, path, errors)
                    .await?;
            }
        }

        if stage == Stage::BeforeChange {
            if let Some(locale) = locale {
                let mut map = match sibling.remove(name) {
                    Some(value) => unflatten(stored_value, value, &locale.write_locale),
                    None => stored_value.cloned().unwrap_or(Value::Null),
                };
                fill_locales(&mut map, &self.pipeline.locales);
                sibling.insert(name.to_string(), map);
            } else if !sibling.contains_key(name) {
                // Nested values the caller left out keep what is stored.
                restore(sibling, name, stored_value);
            }
        }
        Ok(())
    }

    async fn descend(
        &self,
        field: &Field,
        value: &mut Value,
        original: Option<&Value>,
        stored: Option<&Value>,
        path: &str,
        errors: &mut Vec<FieldError>,
    ) -> EngineResult<()> {
        match &field.kind {
            FieldKind::Group { fields } => {
                if let Value::Object(map) = value {
                    self.fields(fields, map, original, stored, path, errors).await?;
                }
            }
            FieldKind::Array { fields, .. } => {
                if let Value::Array(rows) = value {
                    for (index, row) in rows.iter_mut().enumerate() {
                        if let Value::Object(map) = row {
                            let row_path = format!("{path}.{index}");
                            let original_row = original.and_then(|o| o.get(index));
                            let stored_row = stored.and_then(|s| s.get(index));
                            self.fields(fields, map, original_row, stored_row, &row_path, errors)
                                .await?;
                        }
                    }
                }
            }
            FieldKind::Blocks { blocks, .. } => {
                if let Value::Array(items) = value {
                    for (index, item) in items.iter_mut().enumerate() {
                        let Value::Object(map) = item else {
                            continue;
                        };
                        let slug = map.get(BLOCK_DISCRIMINATOR).and_then(Value::as_str);
                        let Some(block) = blocks.iter().find(|b| Some(b.slug.as_str()) == slug) else {
                            continue;
                        };
                        let item_path = format!("{path}.{index}");
                        let original_item = original.and_then(|o| o.get(index));
                        let stored_item = stored.and_then(|s| s.get(index));
                        self.fields(&block.fields, map, original_item, stored_item, &item_path, errors)
                            .await?;
                    }
                }
            }
            FieldKind::Relationship { .. } | FieldKind::Upload { .. }
                if self.ctx.stage == Stage::AfterRead && self.ctx.depth > 0 =>
            {
                self.populate(field, value).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn allowed(&self, field: &Field, operation: Operation, path: &str) -> EngineResult<bool> {
        if self.ctx.override_access {
            return Ok(true);
        }
        let allowed = self
            .pipeline
            .gate
            .check_field(
                &field.access,
                operation,
                path,
                self.ctx.req,
                self.ctx.id,
                Some(self.snapshot),
            )
            .await?;
        Ok(allowed)
    }
}

/// Puts the stored value back, or drops the key when nothing is stored.
fn restore(sibling: &mut Map<String, Value>, name: &str, stored: Option<&Value>) {
    match stored {
        Some(value) => {
            sibling.insert(name.to_string(), value.clone());
        }
        None => {
            sibling.remove(name);
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
