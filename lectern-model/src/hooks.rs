//! Hook, validator and side-effect traits.
//!
//! Every hook returns `Ok(None)` to leave its input unchanged or
//! `Ok(Some(value))` to replace it. Hooks of one stage run strictly in
//! declared order, each seeing the output of the previous one.
//!
//! Most entities only need a few closures; the `*_fn` helpers adapt plain
//! synchronous closures to the async traits.

use crate::request::RequestContext;
use async_trait::async_trait;
use lectern_types::{DocumentId, Operation};
use serde_json::Value;
use std::sync::Arc;

// ── Collection-level hooks ───────────────────────────────────────

/// Arguments handed to collection- and global-level document hooks.
pub struct HookArgs<'a> {
    /// The working document (`data` for write stages, `doc` for read ones).
    pub doc: &'a Value,
    pub req: &'a RequestContext,
    pub operation: Operation,
    /// The projected document as it was before an update.
    pub original_doc: Option<&'a Value>,
}

/// A document hook for one lifecycle stage of an entity.
#[async_trait]
pub trait CollectionHook: Send + Sync {
    async fn call(&self, args: &HookArgs<'_>) -> anyhow::Result<Option<Value>>;
}

struct FnHook<F>(F);

#[async_trait]
impl<F> CollectionHook for FnHook<F>
where
    F: Fn(&HookArgs<'_>) -> anyhow::Result<Option<Value>> + Send + Sync,
{
    async fn call(&self, args: &HookArgs<'_>) -> anyhow::Result<Option<Value>> {
        (self.0)(args)
    }
}

/// Wraps a synchronous closure as a [`CollectionHook`].
pub fn hook_fn<F>(f: F) -> Arc<dyn CollectionHook>
where
    F: Fn(&HookArgs<'_>) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
{
    Arc::new(FnHook(f))
}

// ── beforeOperation ──────────────────────────────────────────────

/// The caller-supplied arguments of an operation, as seen by
/// `beforeOperation` hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationArgs {
    pub operation: Operation,
    pub id: Option<DocumentId>,
    pub data: Option<Value>,
    pub depth: Option<u32>,
    pub override_access: bool,
}

/// Runs before anything else in an operation and may rewrite its arguments.
#[async_trait]
pub trait BeforeOperationHook: Send + Sync {
    async fn call(
        &self,
        args: OperationArgs,
        req: &RequestContext,
    ) -> anyhow::Result<Option<OperationArgs>>;
}

struct FnOperationHook<F>(F);

#[async_trait]
impl<F> BeforeOperationHook for FnOperationHook<F>
where
    F: Fn(&OperationArgs, &RequestContext) -> anyhow::Result<Option<OperationArgs>> + Send + Sync,
{
    async fn call(
        &self,
        args: OperationArgs,
        req: &RequestContext,
    ) -> anyhow::Result<Option<OperationArgs>> {
        (self.0)(&args, req)
    }
}

pub fn operation_hook_fn<F>(f: F) -> Arc<dyn BeforeOperationHook>
where
    F: Fn(&OperationArgs, &RequestContext) -> anyhow::Result<Option<OperationArgs>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnOperationHook(f))
}

// ── Field-level hooks ────────────────────────────────────────────

/// Arguments handed to field-level hooks.
pub struct FieldHookArgs<'a> {
    /// The field's current value, `None` when absent.
    pub value: Option<&'a Value>,
    /// The whole in-progress document as it entered the stage.
    pub data: &'a Value,
    /// The object holding the field.
    pub sibling_data: &'a Value,
    pub original_doc: Option<&'a Value>,
    pub operation: Operation,
    pub req: &'a RequestContext,
    /// Dotted path of the field, e.g. `layout.2.heading`.
    pub path: &'a str,
}

#[async_trait]
pub trait FieldHook: Send + Sync {
    async fn call(&self, args: &FieldHookArgs<'_>) -> anyhow::Result<Option<Value>>;
}

struct FnFieldHook<F>(F);

#[async_trait]
impl<F> FieldHook for FnFieldHook<F>
where
    F: Fn(&FieldHookArgs<'_>) -> anyhow::Result<Option<Value>> + Send + Sync,
{
    async fn call(&self, args: &FieldHookArgs<'_>) -> anyhow::Result<Option<Value>> {
        (self.0)(args)
    }
}

pub fn field_hook_fn<F>(f: F) -> Arc<dyn FieldHook>
where
    F: Fn(&FieldHookArgs<'_>) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
{
    Arc::new(FnFieldHook(f))
}

// ── Validators ───────────────────────────────────────────────────

pub struct ValidateArgs<'a> {
    pub value: Option<&'a Value>,
    pub data: &'a Value,
    pub sibling_data: &'a Value,
    pub operation: Operation,
    pub req: &'a RequestContext,
}

/// Custom field validation. Replaces the kind's built-in validation.
/// Return `Err(message)` to reject the value.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, args: &ValidateArgs<'_>) -> Result<(), String>;
}

struct FnValidator<F>(F);

#[async_trait]
impl<F> Validator for FnValidator<F>
where
    F: Fn(&ValidateArgs<'_>) -> Result<(), String> + Send + Sync,
{
    async fn validate(&self, args: &ValidateArgs<'_>) -> Result<(), String> {
        (self.0)(args)
    }
}

pub fn validator_fn<F>(f: F) -> Arc<dyn Validator>
where
    F: Fn(&ValidateArgs<'_>) -> Result<(), String> + Send + Sync + 'static,
{
    Arc::new(FnValidator(f))
}

// ── Fire-and-forget side effects ─────────────────────────────────

/// Owned snapshot handed to a side effect; side effects outlive the request.
#[derive(Debug, Clone)]
pub struct SideEffectContext {
    pub collection: String,
    pub doc: Value,
    pub user: Option<Value>,
    pub locale: Option<String>,
}

/// Work scheduled after a document is persisted, e.g. a verification
/// notice. Never awaited by the operation and never retried.
#[async_trait]
pub trait SideEffect: Send + Sync {
    async fn run(&self, ctx: SideEffectContext) -> anyhow::Result<()>;
}
