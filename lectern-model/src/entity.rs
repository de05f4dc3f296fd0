use crate::access::EntityAccess;
use crate::error::{ModelError, ModelResult};
use crate::field::{Field, FieldKind};
use crate::hooks::{BeforeOperationHook, CollectionHook, SideEffect};
use crate::sanitize::sanitize_fields;
use crate::upload::{UploadConfig, UploadProcessor};
use lectern_types::IdType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Entity-level hooks, one ordered list per stage.
#[derive(Clone, Default)]
pub struct EntityHooks {
    pub before_operation: Vec<Arc<dyn BeforeOperationHook>>,
    pub before_validate: Vec<Arc<dyn CollectionHook>>,
    pub before_change: Vec<Arc<dyn CollectionHook>>,
    pub after_change: Vec<Arc<dyn CollectionHook>>,
    pub before_read: Vec<Arc<dyn CollectionHook>>,
    pub after_read: Vec<Arc<dyn CollectionHook>>,
}

fn default_true() -> bool {
    true
}

/// A collection: many documents sharing one field tree.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    pub slug: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Caller-assigned id type. A top-level `id` field implies one as well.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_type: Option<IdType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadConfig>,
    #[serde(skip)]
    pub access: EntityAccess,
    #[serde(skip)]
    pub hooks: EntityHooks,
    #[serde(skip)]
    pub upload_processor: Option<Arc<dyn UploadProcessor>>,
    #[serde(skip)]
    pub after_create_effects: Vec<Arc<dyn SideEffect>>,
}

impl CollectionConfig {
    pub fn new(slug: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            slug: slug.into(),
            fields,
            timestamps: true,
            id_type: None,
            upload: None,
            access: EntityAccess::default(),
            hooks: EntityHooks::default(),
            upload_processor: None,
            after_create_effects: Vec::new(),
        }
    }

    pub fn with_access(mut self, access: EntityAccess) -> Self {
        self.access = access;
        self
    }

    pub fn with_hooks(mut self, hooks: EntityHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_id_type(mut self, id_type: IdType) -> Self {
        self.id_type = Some(id_type);
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn with_upload(mut self, upload: UploadConfig) -> Self {
        self.upload = Some(upload);
        self
    }

    pub fn with_upload_processor(mut self, processor: Arc<dyn UploadProcessor>) -> Self {
        self.upload_processor = Some(processor);
        self
    }

    pub fn with_after_create_effect(mut self, effect: Arc<dyn SideEffect>) -> Self {
        self.after_create_effects.push(effect);
        self
    }

    /// The id type supplied by callers, if this collection uses custom ids.
    ///
    /// An explicit `id_type` wins; otherwise a top-level field named `id`
    /// makes ids numeric when it is a `number` field and text otherwise.
    pub fn custom_id_type(&self) -> Option<IdType> {
        self.id_type.or_else(|| {
            self.fields
                .iter()
                .find(|f| f.name() == Some("id"))
                .map(|f| match f.kind {
                    FieldKind::Number { .. } => IdType::Number,
                    _ => IdType::Text,
                })
        })
    }

    /// The id type documents of this collection are stored under.
    pub fn id_type(&self) -> IdType {
        self.custom_id_type().unwrap_or_default()
    }

    /// Checks the slug and the field tree invariants.
    pub fn sanitize(&self) -> ModelResult<()> {
        validate_slug(&self.slug)?;
        sanitize_fields(&self.fields)
    }
}

impl fmt::Debug for CollectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionConfig")
            .field("slug", &self.slug)
            .field("fields", &self.fields)
            .field("timestamps", &self.timestamps)
            .field("id_type", &self.id_type)
            .field("upload", &self.upload)
            .finish_non_exhaustive()
    }
}

/// A global: a singleton entity holding at most one document.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    pub slug: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub access: EntityAccess,
    #[serde(skip)]
    pub hooks: EntityHooks,
}

impl GlobalConfig {
    pub fn new(slug: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            slug: slug.into(),
            fields,
            access: EntityAccess::default(),
            hooks: EntityHooks::default(),
        }
    }

    pub fn with_access(mut self, access: EntityAccess) -> Self {
        self.access = access;
        self
    }

    pub fn with_hooks(mut self, hooks: EntityHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn sanitize(&self) -> ModelResult<()> {
        validate_slug(&self.slug)?;
        sanitize_fields(&self.fields)
    }
}

impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("slug", &self.slug)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

fn validate_slug(slug: &str) -> ModelResult<()> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidSlug(slug.to_string()))
    }
}
