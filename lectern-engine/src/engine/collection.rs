use super::{
    localize_query, now, object_mut, retain_fields, run_hooks, unique_violation, Engine,
    FindOptions, WriteOptions,
};
use crate::error::{EngineError, EngineResult, FieldError, ValidationErrors};
use crate::pipeline::{StageContext, REQUIRED};
use lectern_access::Admission;
use lectern_model::{OperationArgs, RequestContext, SideEffectContext};
use lectern_storage::ID_KEY;
use lectern_types::{DocumentId, Operation, Stage, Where};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

impl Engine {
    /// Creates a document in a collection and returns it projected for the
    /// request.
    pub async fn create(
        &self,
        slug: &str,
        data: Value,
        req: &RequestContext,
        opts: WriteOptions,
    ) -> EngineResult<Value> {
        let entry = self.collection(slug)?;
        let config = &entry.config;
        let hooks = &config.hooks;

        let args = self
            .before_operation(
                &hooks.before_operation,
                OperationArgs {
                    operation: Operation::Create,
                    id: None,
                    data: Some(data),
                    depth: opts.depth,
                    override_access: req.override_access,
                },
                req,
            )
            .await?;
        let override_access = args.override_access;
        let mut data = args.data.unwrap_or_else(|| Value::Object(Map::new()));
        object_mut(&mut data)?;

        let decision = self
            .authorize(&config.access, Operation::Create, req, override_access, None, Some(&data))
            .await?;
        if decision.is_denied() {
            return Err(EngineError::Forbidden);
        }

        let id = match config.custom_id_type() {
            Some(id_type) => {
                let raw = data.get(ID_KEY).and_then(DocumentId::from_value).ok_or_else(|| {
                    EngineError::Validation(ValidationErrors(vec![FieldError::new(ID_KEY, REQUIRED)]))
                })?;
                let id = raw
                    .coerce(id_type)
                    .map_err(|e| EngineError::InvalidId(e.to_string()))?;
                object_mut(&mut data)?.insert(ID_KEY.to_string(), id.to_value());
                Some(id)
            }
            None => {
                object_mut(&mut data)?.remove(ID_KEY);
                None
            }
        };

        let mut managed = Vec::new();
        if id.is_some() {
            managed.push(ID_KEY.to_string());
        }
        if let Some(upload) = &config.upload {
            let file = req.file.as_ref().ok_or(EngineError::MissingFile)?;
            managed.extend(self.process_upload(config, upload, file, &mut data).await?);
        }

        let locale = self.locale(req);
        let mut ctx = StageContext::new(Stage::BeforeValidate, Operation::Create, req);
        ctx.id = id.as_ref();
        ctx.locale = locale.as_ref();
        ctx.override_access = override_access;
        ctx.show_hidden_fields = opts.show_hidden_fields;
        ctx.depth = self.depth(args.depth, req);

        debug!(collection = slug, stage = "beforeValidate", "create");
        let data = self.pipeline.run(&config.fields, data, &ctx, self).await?;
        let data = run_hooks(
            &hooks.before_validate,
            "beforeValidate",
            data,
            req,
            Operation::Create,
            None,
        )
        .await?;

        debug!(collection = slug, stage = "beforeChange", "create");
        let data = run_hooks(
            &hooks.before_change,
            "beforeChange",
            data,
            req,
            Operation::Create,
            None,
        )
        .await?;
        let mut data = self
            .pipeline
            .run(&config.fields, data, &ctx.at(Stage::BeforeChange), self)
            .await?;
        retain_fields(&config.fields, &mut data, &managed)?;

        if config.timestamps {
            let stamp = now();
            let fields = object_mut(&mut data)?;
            fields.insert("createdAt".to_string(), stamp.clone());
            fields.insert("updatedAt".to_string(), stamp);
        }

        let stored = self.store.insert(slug, data).await.map_err(unique_violation)?;
        let stored_id = stored.get(ID_KEY).and_then(DocumentId::from_value);
        debug!(collection = slug, id = ?stored_id, "inserted document");
        ctx.id = stored_id.as_ref();

        let doc = self
            .pipeline
            .run(&config.fields, stored, &ctx.at(Stage::AfterChange), self)
            .await?;
        let doc = run_hooks(
            &hooks.after_change,
            "afterChange",
            doc,
            req,
            Operation::Create,
            None,
        )
        .await?;

        for effect in &config.after_create_effects {
            let effect = Arc::clone(effect);
            let effect_ctx = SideEffectContext {
                collection: slug.to_string(),
                doc: doc.clone(),
                user: req.user.clone(),
                locale: req.locale.clone(),
            };
            let collection = slug.to_string();
            tokio::spawn(async move {
                if let Err(err) = effect.run(effect_ctx).await {
                    warn!(collection = %collection, error = %err, "side effect failed");
                }
            });
        }

        let doc = self
            .pipeline
            .run(&config.fields, doc, &ctx.at(Stage::AfterRead), self)
            .await?;
        run_hooks(&hooks.after_read, "afterRead", doc, req, Operation::Create, None).await
    }

    /// Reads one document by id.
    ///
    /// A plain access deny reports [`EngineError::NotFound`]; a document
    /// that exists but fails the access filter reports
    /// [`EngineError::Forbidden`].
    pub async fn find_by_id(
        &self,
        slug: &str,
        id: &DocumentId,
        req: &RequestContext,
        opts: FindOptions,
    ) -> EngineResult<Value> {
        let entry = self.collection(slug)?;
        let config = &entry.config;
        let hooks = &config.hooks;

        let args = self
            .before_operation(
                &hooks.before_operation,
                OperationArgs {
                    operation: Operation::Read,
                    id: Some(id.clone()),
                    data: None,
                    depth: opts.depth,
                    override_access: req.override_access,
                },
                req,
            )
            .await?;
        let id = args
            .id
            .ok_or(EngineError::NotFound)?
            .coerce(entry.schema.id_type)
            .map_err(|e| EngineError::InvalidId(e.to_string()))?;

        let decision = self
            .authorize(&config.access, Operation::Read, req, args.override_access, Some(&id), None)
            .await?;
        let Some(query) = decision.restrict(Where::equals(ID_KEY, id.to_value())) else {
            return Err(EngineError::NotFound);
        };
        let locale = self.locale(req);
        let query = localize_query(&entry.schema, &query, locale.as_ref());

        let key = format!("{slug}:{}", serde_json::to_string(&query)?);
        let cache = req.find_cache();
        let found = match cache.get(&key).await {
            Some(hit) => {
                debug!(collection = slug, %id, "find cache hit");
                hit
            }
            None => {
                let found = self.store.find_one(slug, &query).await?;
                cache.insert(key, found.clone()).await;
                found
            }
        };

        let doc = match (decision.admit(found.is_some()), found) {
            (Admission::Admitted, Some(doc)) => doc,
            (Admission::Forbidden, _) => return Err(EngineError::Forbidden),
            _ => return Err(EngineError::NotFound),
        };

        let mut ctx = StageContext::new(Stage::AfterRead, Operation::Read, req);
        ctx.id = Some(&id);
        ctx.locale = locale.as_ref();
        ctx.override_access = args.override_access;
        ctx.show_hidden_fields = opts.show_hidden_fields;
        ctx.depth = self.depth(args.depth, req);

        let doc = run_hooks(
            &hooks.before_read,
            "beforeRead",
            doc,
            req,
            Operation::Read,
            None,
        )
        .await?;
        let doc = self.pipeline.run(&config.fields, doc, &ctx, self).await?;
        run_hooks(&hooks.after_read, "afterRead", doc, req, Operation::Read, None).await
    }

    /// Like [`find_by_id`](Self::find_by_id), but a missing, hidden,
    /// forbidden or malformed id yields `Ok(None)`.
    pub async fn try_find_by_id(
        &self,
        slug: &str,
        id: &DocumentId,
        req: &RequestContext,
        opts: FindOptions,
    ) -> EngineResult<Option<Value>> {
        match self.find_by_id(slug, id, req, opts).await {
            Ok(doc) => Ok(Some(doc)),
            Err(EngineError::NotFound | EngineError::Forbidden | EngineError::InvalidId(_)) => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Updates one document. Fields the caller leaves out keep their stored
    /// values; localized fields change only in the request locale.
    pub async fn update(
        &self,
        slug: &str,
        id: &DocumentId,
        data: Value,
        req: &RequestContext,
        opts: WriteOptions,
    ) -> EngineResult<Value> {
        let entry = self.collection(slug)?;
        let config = &entry.config;
        let hooks = &config.hooks;

        let args = self
            .before_operation(
                &hooks.before_operation,
                OperationArgs {
                    operation: Operation::Update,
                    id: Some(id.clone()),
                    data: Some(data),
                    depth: opts.depth,
                    override_access: req.override_access,
                },
                req,
            )
            .await?;
        let override_access = args.override_access;
        let id = args
            .id
            .ok_or(EngineError::NotFound)?
            .coerce(entry.schema.id_type)
            .map_err(|e| EngineError::InvalidId(e.to_string()))?;
        let mut data = args.data.unwrap_or_else(|| Value::Object(Map::new()));
        object_mut(&mut data)?.remove(ID_KEY);

        let decision = self
            .authorize(&config.access, Operation::Update, req, override_access, Some(&id), Some(&data))
            .await?;
        let Some(query) = decision.restrict(Where::equals(ID_KEY, id.to_value())) else {
            return Err(EngineError::Forbidden);
        };
        let locale = self.locale(req);
        let query = localize_query(&entry.schema, &query, locale.as_ref());

        let found = self.store.find_one(slug, &query).await?;
        let stored = match (decision.admit(found.is_some()), found) {
            (Admission::Admitted, Some(doc)) => doc,
            (Admission::Forbidden, _) => return Err(EngineError::Forbidden),
            _ => return Err(EngineError::NotFound),
        };

        let mut read_ctx = StageContext::new(Stage::AfterRead, Operation::Update, req);
        read_ctx.id = Some(&id);
        read_ctx.locale = locale.as_ref();
        read_ctx.override_access = true;
        read_ctx.show_hidden_fields = true;
        let original = self
            .pipeline
            .run(&config.fields, stored.clone(), &read_ctx, self)
            .await?;

        let mut managed = Vec::new();
        if let (Some(upload), Some(file)) = (&config.upload, &req.file) {
            managed = self.process_upload(config, upload, file, &mut data).await?;
        }

        let mut ctx = StageContext::new(Stage::BeforeValidate, Operation::Update, req);
        ctx.id = Some(&id);
        ctx.original_doc = Some(&original);
        ctx.stored_doc = Some(&stored);
        ctx.locale = locale.as_ref();
        ctx.override_access = override_access;
        ctx.show_hidden_fields = opts.show_hidden_fields;
        ctx.depth = self.depth(args.depth, req);

        debug!(collection = slug, %id, stage = "beforeValidate", "update");
        let data = self.pipeline.run(&config.fields, data, &ctx, self).await?;
        let data = run_hooks(
            &hooks.before_validate,
            "beforeValidate",
            data,
            req,
            Operation::Update,
            Some(&original),
        )
        .await?;

        debug!(collection = slug, %id, stage = "beforeChange", "update");
        let data = run_hooks(
            &hooks.before_change,
            "beforeChange",
            data,
            req,
            Operation::Update,
            Some(&original),
        )
        .await?;
        let mut data = self
            .pipeline
            .run(&config.fields, data, &ctx.at(Stage::BeforeChange), self)
            .await?;
        retain_fields(&config.fields, &mut data, &managed)?;

        if config.timestamps {
            object_mut(&mut data)?.insert("updatedAt".to_string(), now());
        }

        let updated = self
            .store
            .update_one(slug, &Where::equals(ID_KEY, id.to_value()), data)
            .await
            .map_err(unique_violation)?
            .ok_or(EngineError::NotFound)?;

        let doc = self
            .pipeline
            .run(&config.fields, updated, &ctx.at(Stage::AfterChange), self)
            .await?;
        let doc = run_hooks(
            &hooks.after_change,
            "afterChange",
            doc,
            req,
            Operation::Update,
            Some(&original),
        )
        .await?;
        let doc = self
            .pipeline
            .run(&config.fields, doc, &ctx.at(Stage::AfterRead), self)
            .await?;
        run_hooks(
            &hooks.after_read,
            "afterRead",
            doc,
            req,
            Operation::Update,
            Some(&original),
        )
        .await
    }
}
