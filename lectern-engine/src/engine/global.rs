use super::{
    localize_query, object_mut, retain_fields, run_hooks, unique_violation, Engine, FindOptions,
    WriteOptions, GLOBALS_COLLECTION, GLOBAL_TYPE_KEY,
};
use crate::error::{EngineError, EngineResult};
use crate::pipeline::StageContext;
use lectern_model::{OperationArgs, RequestContext};
use lectern_types::{Operation, Stage, Where};
use serde_json::{Map, Value};
use tracing::debug;

impl Engine {
    /// Reads a global. A global never written reads as an empty document.
    pub async fn find_global(
        &self,
        slug: &str,
        req: &RequestContext,
        opts: FindOptions,
    ) -> EngineResult<Value> {
        let entry = self.global(slug)?;
        let config = &entry.config;
        let hooks = &config.hooks;

        let args = self
            .before_operation(
                &hooks.before_operation,
                OperationArgs {
                    operation: Operation::Read,
                    id: None,
                    data: None,
                    depth: opts.depth,
                    override_access: req.override_access,
                },
                req,
            )
            .await?;

        let decision = self
            .authorize(&config.access, Operation::Read, req, args.override_access, None, None)
            .await?;
        let Some(query) = decision.restrict(Where::equals(GLOBAL_TYPE_KEY, slug)) else {
            return Err(EngineError::Forbidden);
        };
        let locale = self.locale(req);
        let query = localize_query(&entry.schema, &query, locale.as_ref());

        let found = self.store.find_one(GLOBALS_COLLECTION, &query).await?;
        if found.is_none() && decision.filter().is_some() {
            let selector = Where::equals(GLOBAL_TYPE_KEY, slug);
            if self.store.find_one(GLOBALS_COLLECTION, &selector).await?.is_some() {
                return Err(EngineError::Forbidden);
            }
        }
        let mut doc = found.unwrap_or_else(|| Value::Object(Map::new()));
        strip_global_type(&mut doc);

        let mut ctx = StageContext::new(Stage::AfterRead, Operation::Read, req);
        ctx.locale = locale.as_ref();
        ctx.override_access = args.override_access;
        ctx.show_hidden_fields = opts.show_hidden_fields;
        ctx.depth = self.depth(args.depth, req);

        let doc = run_hooks(&hooks.before_read, "beforeRead", doc, req, Operation::Read, None)
            .await?;
        let doc = self.pipeline.run(&config.fields, doc, &ctx, self).await?;
        run_hooks(&hooks.after_read, "afterRead", doc, req, Operation::Read, None).await
    }

    /// Writes a global, creating its document on first write.
    pub async fn update_global(
        &self,
        slug: &str,
        data: Value,
        req: &RequestContext,
        opts: WriteOptions,
    ) -> EngineResult<Value> {
        let entry = self.global(slug)?;
        let config = &entry.config;
        let hooks = &config.hooks;

        let args = self
            .before_operation(
                &hooks.before_operation,
                OperationArgs {
                    operation: Operation::Update,
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
        object_mut(&mut data)?.remove(GLOBAL_TYPE_KEY);

        let decision = self
            .authorize(&config.access, Operation::Update, req, override_access, None, Some(&data))
            .await?;
        if decision.is_denied() {
            return Err(EngineError::Forbidden);
        }

        let locale = self.locale(req);
        let selector = Where::equals(GLOBAL_TYPE_KEY, slug);
        let existing = self.store.find_one(GLOBALS_COLLECTION, &selector).await?;
        if let (Some(filter), Some(doc)) = (decision.filter(), &existing) {
            if !localize_query(&entry.schema, filter, locale.as_ref()).matches(doc) {
                return Err(EngineError::Forbidden);
            }
        }

        let mut stored = existing
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        strip_global_type(&mut stored);

        let mut read_ctx = StageContext::new(Stage::AfterRead, Operation::Update, req);
        read_ctx.locale = locale.as_ref();
        read_ctx.override_access = true;
        read_ctx.show_hidden_fields = true;
        let original = self
            .pipeline
            .run(&config.fields, stored.clone(), &read_ctx, self)
            .await?;

        let mut ctx = StageContext::new(Stage::BeforeValidate, Operation::Update, req);
        ctx.original_doc = Some(&original);
        ctx.stored_doc = Some(&stored);
        ctx.locale = locale.as_ref();
        ctx.override_access = override_access;
        ctx.show_hidden_fields = opts.show_hidden_fields;
        ctx.depth = self.depth(args.depth, req);

        debug!(global = slug, stage = "beforeValidate", "update global");
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

        debug!(global = slug, stage = "beforeChange", "update global");
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
        retain_fields(&config.fields, &mut data, &[])?;

        let mut doc = match existing {
            Some(_) => self
                .store
                .update_one(GLOBALS_COLLECTION, &selector, data)
                .await
                .map_err(unique_violation)?
                .ok_or(EngineError::NotFound)?,
            None => {
                object_mut(&mut data)?.insert(GLOBAL_TYPE_KEY.to_string(), Value::from(slug));
                debug!(global = slug, "creating global document");
                self.store
                    .insert(GLOBALS_COLLECTION, data)
                    .await
                    .map_err(unique_violation)?
            }
        };
        strip_global_type(&mut doc);

        let doc = self
            .pipeline
            .run(&config.fields, doc, &ctx.at(Stage::AfterChange), self)
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
        run_hooks(&hooks.after_read, "afterRead", doc, req, Operation::Update, Some(&original))
            .await
    }
}

fn strip_global_type(doc: &mut Value) {
    if let Value::Object(fields) = doc {
        fields.remove(GLOBAL_TYPE_KEY);
    }
}
