//! Core configuration model for Lectern.
//!
//! Defines the immutable inputs every other subsystem consumes:
//! - [`Field`] / [`FieldKind`]: the recursive field configuration tree
//! - [`CollectionConfig`] / [`GlobalConfig`]: entity declarations with their
//!   access predicates and lifecycle hooks
//! - [`RequestContext`]: the per-request state threaded through every
//!   operation, including its request-scoped read cache
//! - the hook, validator and access traits user code implements
//!
//! Entity configs are built once at startup and are read-only afterwards.

mod access;
mod entity;
mod error;
mod field;
mod hooks;
mod request;
mod sanitize;
mod upload;

pub use access::{access_fn, anyone, AccessArgs, AccessPredicate, AccessResult, EntityAccess};
pub use entity::{CollectionConfig, EntityHooks, GlobalConfig};
pub use error::{ModelError, ModelResult};
pub use field::{
    Block, Condition, Field, FieldAccess, FieldAdmin, FieldHooks, FieldKind, RelationTo,
    SelectOption,
};
pub use hooks::{
    field_hook_fn, hook_fn, operation_hook_fn, validator_fn, BeforeOperationHook, CollectionHook,
    FieldHook, FieldHookArgs, HookArgs, OperationArgs, SideEffect, SideEffectContext,
    ValidateArgs, Validator,
};
pub use request::{FileInput, FindCache, RequestContext, ALL_LOCALES, DEFAULT_FIND_CACHE_SIZE};
pub use sanitize::sanitize_fields;
pub use upload::{FileMetadataProcessor, UploadConfig, UploadProcessor};
