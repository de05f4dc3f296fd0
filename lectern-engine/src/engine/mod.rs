//! Operation orchestrator.
//!
//! The engine owns the registered entities, their compiled schemas and the
//! document store. Every operation runs its stages strictly in sequence;
//! hooks of one stage fold over the working document in declared order.

mod collection;
mod global;

use crate::config::{ConfigFile, EngineConfig};
use crate::error::{EngineError, EngineResult, FieldError, ValidationErrors};
use crate::locale::ResolvedLocale;
use crate::pipeline::{FieldPipeline, RelationResolver};
use async_trait::async_trait;
use lectern_access::{AccessDecision, AccessGate};
use lectern_model::{
    BeforeOperationHook, CollectionConfig, CollectionHook, EntityAccess, Field, FieldKind,
    FileInput, FileMetadataProcessor, GlobalConfig, HookArgs, OperationArgs, RequestContext,
    UploadConfig, UploadProcessor,
};
use lectern_schema::{SchemaCompiler, StorageSchema, UnknownKindPolicy};
use lectern_storage::{DocumentStore, MemoryStore, StorageError};
use lectern_types::{DocumentId, Operation, Where};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Store collection holding one document per global, tagged by slug.
pub const GLOBALS_COLLECTION: &str = "globals";

const GLOBAL_TYPE_KEY: &str = "globalType";

const UNIQUE_MESSAGE: &str = "Value must be unique";

/// Options for reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Population depth; falls back to the request's, then the config's.
    pub depth: Option<u32>,
    /// Return fields marked `hidden`.
    pub show_hidden_fields: bool,
}

impl FindOptions {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_hidden_fields(mut self) -> Self {
        self.show_hidden_fields = true;
        self
    }
}

/// Options for creates and updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Population depth of the returned document.
    pub depth: Option<u32>,
    /// Return fields marked `hidden`.
    pub show_hidden_fields: bool,
}

impl WriteOptions {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_hidden_fields(mut self) -> Self {
        self.show_hidden_fields = true;
        self
    }
}

struct CollectionEntry {
    config: CollectionConfig,
    schema: StorageSchema,
}

struct GlobalEntry {
    config: GlobalConfig,
    schema: StorageSchema,
}

/// Runs create, read and update operations against registered entities.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn DocumentStore>,
    collections: HashMap<String, CollectionEntry>,
    globals: HashMap<String, GlobalEntry>,
    gate: AccessGate,
    pipeline: FieldPipeline,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A fresh request context with a find cache sized from the config.
    pub fn request(&self) -> RequestContext {
        RequestContext::new().with_cache_size(self.config.find_cache_size)
    }

    pub fn collection_schema(&self, slug: &str) -> Option<&StorageSchema> {
        self.collections.get(slug).map(|e| &e.schema)
    }

    pub fn global_schema(&self, slug: &str) -> Option<&StorageSchema> {
        self.globals.get(slug).map(|e| &e.schema)
    }

    pub fn collection_slugs(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn global_slugs(&self) -> impl Iterator<Item = &str> {
        self.globals.keys().map(String::as_str)
    }

    fn collection(&self, slug: &str) -> EngineResult<&CollectionEntry> {
        self.collections
            .get(slug)
            .ok_or_else(|| EngineError::UnknownCollection(slug.to_string()))
    }

    fn global(&self, slug: &str) -> EngineResult<&GlobalEntry> {
        self.globals
            .get(slug)
            .ok_or_else(|| EngineError::UnknownGlobal(slug.to_string()))
    }

    fn locale(&self, req: &RequestContext) -> Option<ResolvedLocale> {
        ResolvedLocale::resolve(self.config.localization.as_ref(), req)
    }

    fn depth(&self, requested: Option<u32>, req: &RequestContext) -> u32 {
        requested
            .or(req.depth)
            .unwrap_or(self.config.default_depth)
            .min(self.config.max_depth)
    }

    async fn authorize(
        &self,
        access: &EntityAccess,
        operation: Operation,
        req: &RequestContext,
        override_access: bool,
        id: Option<&DocumentId>,
        data: Option<&Value>,
    ) -> EngineResult<AccessDecision> {
        if override_access {
            return Ok(AccessDecision::Allow);
        }
        Ok(self.gate.check(access, operation, req, id, data).await?)
    }

    async fn before_operation(
        &self,
        hooks: &[Arc<dyn BeforeOperationHook>],
        mut args: OperationArgs,
        req: &RequestContext,
    ) -> EngineResult<OperationArgs> {
        for hook in hooks {
            let next = hook
                .call(args.clone(), req)
                .await
                .map_err(EngineError::hook("beforeOperation"))?;
            if let Some(next) = next {
                args = next;
            }
        }
        Ok(args)
    }

    async fn process_upload(
        &self,
        config: &CollectionConfig,
        upload: &UploadConfig,
        file: &FileInput,
        data: &mut Value,
    ) -> EngineResult<Vec<String>> {
        let metadata = match &config.upload_processor {
            Some(processor) => processor.process(file, upload).await,
            None => FileMetadataProcessor.process(file, upload).await,
        }
        .map_err(EngineError::Upload)?;

        let target = object_mut(data)?;
        let mut keys = Vec::new();
        if let Value::Object(fields) = metadata {
            keys.extend(fields.keys().cloned());
            target.extend(fields);
        }
        debug!(collection = %config.slug, file = %file.filename, "processed upload");
        Ok(keys)
    }
}

#[async_trait]
impl RelationResolver for Engine {
    async fn resolve(
        &self,
        collection: &str,
        id: &DocumentId,
        depth: u32,
        req: &RequestContext,
    ) -> EngineResult<Option<Value>> {
        if !self.collections.contains_key(collection) {
            return Ok(None);
        }
        self.try_find_by_id(collection, id, req, FindOptions::depth(depth))
            .await
    }
}

/// Folds `doc` through `hooks` in order; `None` keeps the previous value.
async fn run_hooks(
    hooks: &[Arc<dyn CollectionHook>],
    stage: &'static str,
    mut doc: Value,
    req: &RequestContext,
    operation: Operation,
    original_doc: Option<&Value>,
) -> EngineResult<Value> {
    for hook in hooks {
        let next = hook
            .call(&HookArgs {
                doc: &doc,
                req,
                operation,
                original_doc,
            })
            .await
            .map_err(EngineError::hook(stage))?;
        if let Some(next) = next {
            doc = next;
        }
    }
    Ok(doc)
}

/// Rewrites paths addressing localized top-level fields to the stored
/// entry of the request locale, unless already locale-qualified.
fn localize_query(schema: &StorageSchema, query: &Where, locale: Option<&ResolvedLocale>) -> Where {
    let Some(locale) = locale else {
        return query.clone();
    };
    let localized: Vec<&str> = schema.localized_fields().collect();
    if localized.is_empty() {
        return query.clone();
    }

    query.map_paths(&|path: &str| {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        if !localized.contains(&head) {
            return path.to_string();
        }
        match rest {
            Some(rest) if is_locale_segment(schema, head, rest) => path.to_string(),
            Some(rest) => format!("{head}.{}.{rest}", locale.write_locale),
            None => format!("{head}.{}", locale.write_locale),
        }
    })
}

fn is_locale_segment(schema: &StorageSchema, head: &str, rest: &str) -> bool {
    let segment = rest.split('.').next().unwrap_or(rest);
    schema.field(head).is_some_and(|f| match &f.slot {
        lectern_schema::Slot::Localized { locales } => locales.contains_key(segment),
        _ => false,
    })
}

/// Drops top-level keys that belong to no field and are not in `extra`.
fn retain_fields(fields: &[Field], doc: &mut Value, extra: &[String]) -> EngineResult<()> {
    let mut known = HashSet::new();
    collect_names(fields, &mut known);
    object_mut(doc)?.retain(|key, _| {
        let keep = known.contains(key.as_str()) || extra.iter().any(|k| k == key);
        if !keep {
            debug!(key = %key, "dropping unknown key");
        }
        keep
    });
    Ok(())
}

fn collect_names<'a>(fields: &'a [Field], names: &mut HashSet<&'a str>) {
    for field in fields {
        if field.is_transparent() {
            collect_names(field.sub_fields().unwrap_or_default(), names);
        } else if let Some(name) = field.name() {
            if !matches!(field.kind, FieldKind::Unknown) {
                names.insert(name);
            }
        }
    }
}

fn object_mut(doc: &mut Value) -> EngineResult<&mut Map<String, Value>> {
    match doc {
        Value::Object(map) => Ok(map),
        other => Err(EngineError::InvalidData(format!("expected an object, got {other}"))),
    }
}

/// Maps a duplicate-key signal to a validation error on the field.
fn unique_violation(err: StorageError) -> EngineError {
    match err {
        StorageError::DuplicateKey { field, .. } => {
            EngineError::Validation(ValidationErrors(vec![FieldError::new(field, UNIQUE_MESSAGE)]))
        }
        other => EngineError::Storage(other),
    }
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

/// Builds an [`Engine`]: sanitizes and compiles every entity, then
/// registers the compiled schemas with the store.
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn DocumentStore>>,
    collections: Vec<CollectionConfig>,
    globals: Vec<GlobalConfig>,
    unknown_kinds: UnknownKindPolicy,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: None,
            collections: Vec::new(),
            globals: Vec::new(),
            unknown_kinds: UnknownKindPolicy::default(),
        }
    }

    /// Starts from a parsed config file.
    pub fn from_config_file(file: ConfigFile) -> Self {
        let mut builder = Self::new(file.engine);
        builder.collections = file.collections;
        builder.globals = file.globals;
        builder
    }

    /// Uses `store` instead of a fresh [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn collection(mut self, collection: CollectionConfig) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn global(mut self, global: GlobalConfig) -> Self {
        self.globals.push(global);
        self
    }

    pub fn unknown_kind_policy(mut self, policy: UnknownKindPolicy) -> Self {
        self.unknown_kinds = policy;
        self
    }

    /// Attaches code-side settings (hooks, access, validators) to an entity
    /// loaded from a config file.
    pub fn configure_collection(
        mut self,
        slug: &str,
        f: impl FnOnce(CollectionConfig) -> CollectionConfig,
    ) -> Self {
        if let Some(index) = self.collections.iter().position(|c| c.slug == slug) {
            let collection = self.collections.remove(index);
            self.collections.insert(index, f(collection));
        }
        self
    }

    pub fn configure_global(
        mut self,
        slug: &str,
        f: impl FnOnce(GlobalConfig) -> GlobalConfig,
    ) -> Self {
        if let Some(index) = self.globals.iter().position(|g| g.slug == slug) {
            let global = self.globals.remove(index);
            self.globals.insert(index, f(global));
        }
        self
    }

    pub async fn build(self) -> EngineResult<Engine> {
        self.config.validate()?;

        let compiler = SchemaCompiler::new(self.config.locales().iter().cloned())
            .with_collections(&self.collections)
            .with_unknown_kind_policy(self.unknown_kinds);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn DocumentStore>);

        let mut collections = HashMap::new();
        for config in self.collections {
            config.sanitize()?;
            if collections.contains_key(&config.slug) {
                return Err(EngineError::Config(format!(
                    "collection {} is registered twice",
                    config.slug
                )));
            }
            let schema = compiler.compile_collection(&config)?;
            store.register(&config.slug, &schema).await?;
            collections.insert(config.slug.clone(), CollectionEntry { config, schema });
        }

        let mut globals = HashMap::new();
        for config in self.globals {
            config.sanitize()?;
            if globals.contains_key(&config.slug) {
                return Err(EngineError::Config(format!(
                    "global {} is registered twice",
                    config.slug
                )));
            }
            let schema = compiler.compile_global(&config)?;
            globals.insert(config.slug.clone(), GlobalEntry { config, schema });
        }
        if !globals.is_empty() {
            store
                .register(GLOBALS_COLLECTION, &StorageSchema::default())
                .await?;
        }

        info!(
            collections = collections.len(),
            globals = globals.len(),
            locales = self.config.locales().len(),
            "engine ready"
        );

        let pipeline = FieldPipeline::new(self.config.locales().to_vec());
        Ok(Engine {
            config: self.config,
            store,
            collections,
            globals,
            gate: AccessGate::new(),
            pipeline,
        })
    }
}
