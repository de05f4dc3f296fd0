use async_trait::async_trait;
use lectern_engine::{
    Engine, EngineConfig, EngineError, FindOptions, LocalizationConfig, WriteOptions,
    GLOBALS_COLLECTION,
};
use lectern_model::{
    access_fn, anyone, hook_fn, operation_hook_fn, AccessResult, CollectionConfig, EntityAccess,
    EntityHooks, Field, FileInput, GlobalConfig, RequestContext, SideEffect, SideEffectContext,
    UploadConfig,
};
use lectern_schema::StorageSchema;
use lectern_storage::{DocumentStore, MemoryStore, StorageResult};
use lectern_types::{DocumentId, Where};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn id_of(doc: &Value) -> DocumentId {
    DocumentId::from_value(&doc["id"]).expect("document id")
}

/// Captures engine logs in test output; `RUST_LOG=lectern_engine=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn admin() -> RequestContext {
    RequestContext::new().with_override_access()
}

fn public(slug: &str, fields: Vec<Field>) -> CollectionConfig {
    CollectionConfig::new(slug, fields).with_access(EntityAccess::public())
}

// ── Localized round trip ─────────────────────────────────────────

async fn localized_engine() -> Engine {
    let config = EngineConfig::default().with_localization(LocalizationConfig::new(["en", "es"], "en"));
    Engine::builder(config)
        .collection(public(
            "posts",
            vec![Field::text("slug").required(), Field::text("title").localized()],
        ))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn localized_write_then_read_with_fallback() {
    let engine = localized_engine().await;

    let created = engine
        .create(
            "posts",
            json!({"slug": "hello", "title": "Hello"}),
            &RequestContext::new().with_locale("en"),
            WriteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(created["title"], "Hello");
    let id = id_of(&created);

    let updated = engine
        .update(
            "posts",
            &id,
            json!({"title": "Hola"}),
            &RequestContext::new().with_locale("es"),
            WriteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(updated["title"], "Hola");
    assert_eq!(updated["slug"], "hello");

    let read = |locale: &'static str| {
        let engine = &engine;
        let id = id.clone();
        async move {
            let req = RequestContext::new()
                .with_locale(locale)
                .with_fallback_locale("en");
            engine
                .find_by_id("posts", &id, &req, FindOptions::default())
                .await
                .unwrap()
        }
    };

    assert_eq!(read("es").await["title"], "Hola");
    assert_eq!(read("fr").await["title"], "Hello");
    assert_eq!(read("en").await["title"], "Hello");
    assert_eq!(read("all").await["title"], json!({"en": "Hello", "es": "Hola"}));
}

#[tokio::test]
async fn unconfigured_locale_writes_land_in_the_default_locale() {
    let engine = localized_engine().await;
    let created = engine
        .create(
            "posts",
            json!({"slug": "bonjour", "title": "Bonjour"}),
            &RequestContext::new().with_locale("fr"),
            WriteOptions::default(),
        )
        .await
        .unwrap();

    let all = RequestContext::new().with_locale("all");
    let doc = engine
        .find_by_id("posts", &id_of(&created), &all, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["title"], json!({"en": "Bonjour", "es": null}));
}

#[tokio::test]
async fn created_document_carries_timestamps() {
    let engine = localized_engine().await;
    let doc = engine
        .create("posts", json!({"slug": "a"}), &engine.request(), WriteOptions::default())
        .await
        .unwrap();
    assert!(doc["createdAt"].is_string());
    assert_eq!(doc["createdAt"], doc["updatedAt"]);
    assert_eq!(doc["title"], Value::Null);
}

// ── Access ───────────────────────────────────────────────────────

async fn notes_engine() -> (Engine, DocumentId) {
    let access = EntityAccess {
        read: Some(access_fn(|args| match &args.req.user {
            Some(user) => Where::equals("owner", user["id"].clone()).into(),
            None => AccessResult::Deny,
        })),
        ..EntityAccess::default()
    };
    let engine = Engine::builder(EngineConfig::default())
        .collection(
            CollectionConfig::new("notes", vec![Field::text("owner"), Field::text("body")])
                .with_access(access),
        )
        .build()
        .await
        .unwrap();
    let note = engine
        .create(
            "notes",
            json!({"owner": "u1", "body": "secret"}),
            &admin(),
            WriteOptions::default(),
        )
        .await
        .unwrap();
    let id = id_of(&note);
    (engine, id)
}

#[tokio::test]
async fn plain_deny_reads_as_not_found() {
    let (engine, id) = notes_engine().await;
    let err = engine
        .find_by_id("notes", &id, &RequestContext::new(), FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound));
}

#[tokio::test]
async fn failed_filter_reads_as_forbidden() {
    let (engine, id) = notes_engine().await;
    let stranger = RequestContext::new().with_user(json!({"id": "u2"}));
    let err = engine
        .find_by_id("notes", &id, &stranger, FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    let owner = RequestContext::new().with_user(json!({"id": "u1"}));
    let doc = engine
        .find_by_id("notes", &id, &owner, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["body"], "secret");
}

#[tokio::test]
async fn try_find_hides_refusals() {
    let (engine, id) = notes_engine().await;
    let stranger = RequestContext::new().with_user(json!({"id": "u2"}));
    let found = engine
        .try_find_by_id("notes", &id, &stranger, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn missing_create_predicate_requires_a_user() {
    let engine = Engine::builder(EngineConfig::default())
        .collection(CollectionConfig::new("notes", vec![Field::text("body")]))
        .build()
        .await
        .unwrap();

    let err = engine
        .create("notes", json!({"body": "x"}), &RequestContext::new(), WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    let user = RequestContext::new().with_user(json!({"id": "u1"}));
    engine
        .create("notes", json!({"body": "x"}), &user, WriteOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn update_without_access_is_forbidden() {
    let (engine, id) = notes_engine().await;
    let err = engine
        .update("notes", &id, json!({"body": "x"}), &RequestContext::new(), WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
}

#[tokio::test]
async fn access_filters_on_localized_fields_use_the_request_locale() {
    let access = EntityAccess {
        read: Some(access_fn(|_| Where::equals("title", "Hola").into())),
        ..EntityAccess::public()
    };
    let config = EngineConfig::default().with_localization(LocalizationConfig::new(["en", "es"], "en"));
    let engine = Engine::builder(config)
        .collection(
            CollectionConfig::new("posts", vec![Field::text("title").localized()]).with_access(access),
        )
        .build()
        .await
        .unwrap();

    let created = engine
        .create(
            "posts",
            json!({"title": "Hello"}),
            &admin().with_locale("en"),
            WriteOptions::default(),
        )
        .await
        .unwrap();
    let id = id_of(&created);
    engine
        .update(
            "posts",
            &id,
            json!({"title": "Hola"}),
            &admin().with_locale("es"),
            WriteOptions::default(),
        )
        .await
        .unwrap();

    let spanish = RequestContext::new().with_locale("es");
    let doc = engine
        .find_by_id("posts", &id, &spanish, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["title"], "Hola");

    let english = RequestContext::new().with_locale("en");
    let err = engine
        .find_by_id("posts", &id, &english, FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
}

// ── Validation and uniqueness ────────────────────────────────────

#[tokio::test]
async fn invalid_create_reports_all_fields_and_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::builder(EngineConfig::default())
        .store(store.clone())
        .collection(public(
            "users",
            vec![Field::text("name").required(), Field::email("email").required()],
        ))
        .build()
        .await
        .unwrap();

    let err = engine
        .create("users", json!({"email": "nope"}), &engine.request(), WriteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.validation_errors().unwrap().fields(), vec!["name", "email"]);
    assert_eq!(store.count("users").await, 0);
}

#[tokio::test]
async fn duplicate_unique_value_is_a_validation_error() {
    let engine = Engine::builder(EngineConfig::default())
        .collection(public("users", vec![Field::email("email").unique()]))
        .build()
        .await
        .unwrap();
    let req = engine.request();

    engine
        .create("users", json!({"email": "a@example.com"}), &req, WriteOptions::default())
        .await
        .unwrap();
    let err = engine
        .create("users", json!({"email": "a@example.com"}), &req, WriteOptions::default())
        .await
        .unwrap_err();

    let errors = err.validation_errors().unwrap();
    assert_eq!(errors.fields(), vec!["email"]);
    assert_eq!(errors.iter().next().unwrap().message, "Value must be unique");
}

#[tokio::test]
async fn unknown_collection_is_reported() {
    let engine = Engine::builder(EngineConfig::default()).build().await.unwrap();
    let err = engine
        .create("ghosts", json!({}), &admin(), WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownCollection(slug) if slug == "ghosts"));
}

// ── Incoming data ────────────────────────────────────────────────

#[tokio::test]
async fn caller_ids_are_ignored_without_a_custom_id_type() {
    let engine = Engine::builder(EngineConfig::default())
        .collection(public("posts", vec![Field::text("slug")]))
        .build()
        .await
        .unwrap();
    let req = engine.request();

    let created = engine
        .create("posts", json!({"id": "bogus", "slug": "a"}), &req, WriteOptions::default())
        .await
        .unwrap();
    assert_ne!(created["id"], "bogus");

    let read = engine
        .find_by_id("posts", &id_of(&created), &req, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(read["slug"], "a");
}

#[tokio::test]
async fn keys_outside_the_field_tree_are_not_stored() {
    let engine = Engine::builder(EngineConfig::default())
        .collection(public(
            "posts",
            vec![Field::row(vec![Field::text("title"), Field::text("subtitle")])],
        ))
        .build()
        .await
        .unwrap();
    let req = engine.request();

    let created = engine
        .create(
            "posts",
            json!({"title": "T", "subtitle": "S", "junk": {"x": 1}}),
            &req,
            WriteOptions::default(),
        )
        .await
        .unwrap();
    assert!(created.get("junk").is_none());
    assert_eq!(created["subtitle"], "S");

    let read = engine
        .find_by_id("posts", &id_of(&created), &req, FindOptions::default())
        .await
        .unwrap();
    assert!(read.get("junk").is_none());
    assert_eq!(read["title"], "T");
}

#[tokio::test]
async fn timestamps_cannot_be_overwritten() {
    let engine = Engine::builder(EngineConfig::default())
        .collection(public("posts", vec![Field::text("title")]))
        .build()
        .await
        .unwrap();
    let req = engine.request();

    let created = engine
        .create(
            "posts",
            json!({"title": "a", "createdAt": "1970-01-01T00:00:00Z"}),
            &req,
            WriteOptions::default(),
        )
        .await
        .unwrap();
    let created_at = created["createdAt"].clone();
    assert_ne!(created_at, "1970-01-01T00:00:00Z");

    let updated = engine
        .update(
            "posts",
            &id_of(&created),
            json!({"createdAt": "1970-01-01T00:00:00Z", "updatedAt": "1970-01-01T00:00:00Z"}),
            &req,
            WriteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(updated["createdAt"], created_at);
    assert_ne!(updated["updatedAt"], "1970-01-01T00:00:00Z");
}

#[tokio::test]
async fn hidden_fields_are_stored_but_not_returned() {
    let engine = Engine::builder(EngineConfig::default())
        .collection(public(
            "users",
            vec![Field::email("email"), Field::text("resetToken").hidden()],
        ))
        .global(
            GlobalConfig::new("secrets", vec![Field::text("apiKey").hidden()])
                .with_access(EntityAccess::public()),
        )
        .build()
        .await
        .unwrap();
    let req = engine.request();

    let created = engine
        .create(
            "users",
            json!({"email": "a@b.co", "resetToken": "abc"}),
            &req,
            WriteOptions::default(),
        )
        .await
        .unwrap();
    assert!(created.get("resetToken").is_none());
    let id = id_of(&created);

    let plain = engine
        .find_by_id("users", &id, &req, FindOptions::default())
        .await
        .unwrap();
    assert!(plain.get("resetToken").is_none());

    let revealed = engine
        .find_by_id("users", &id, &req, FindOptions::default().with_hidden_fields())
        .await
        .unwrap();
    assert_eq!(revealed["resetToken"], "abc");

    let updated = engine
        .update(
            "users",
            &id,
            json!({"email": "c@d.co"}),
            &req,
            WriteOptions::default().with_hidden_fields(),
        )
        .await
        .unwrap();
    assert_eq!(updated["resetToken"], "abc");

    let global = engine
        .update_global("secrets", json!({"apiKey": "k"}), &req, WriteOptions::default())
        .await
        .unwrap();
    assert!(global.get("apiKey").is_none());
    let global = engine
        .find_global("secrets", &req, FindOptions::default().with_hidden_fields())
        .await
        .unwrap();
    assert_eq!(global["apiKey"], "k");
}

// ── Hooks ────────────────────────────────────────────────────────

fn append(mark: &'static str) -> Arc<dyn lectern_model::CollectionHook> {
    hook_fn(move |args| {
        let mut doc = args.doc.clone();
        let trail = doc["trail"].as_str().unwrap_or_default().to_string();
        doc["trail"] = json!(format!("{trail}{mark}"));
        Ok(Some(doc))
    })
}

#[tokio::test]
async fn entity_hooks_fold_in_declared_order() {
    let hooks = EntityHooks {
        before_validate: vec![append("v")],
        before_change: vec![append("a"), append("b")],
        after_read: vec![append("r")],
        ..EntityHooks::default()
    };
    let engine = Engine::builder(EngineConfig::default())
        .collection(public("logs", vec![Field::text("trail")]).with_hooks(hooks))
        .build()
        .await
        .unwrap();

    let doc = engine
        .create("logs", json!({"trail": ""}), &engine.request(), WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["trail"], "vabr");
}

#[tokio::test]
async fn update_hooks_see_the_original_document() {
    let hooks = EntityHooks {
        before_change: vec![hook_fn(|args| {
            let mut doc = args.doc.clone();
            let previous = args.original_doc.map(|o| o["count"].clone());
            doc["previous"] = previous.unwrap_or(Value::Null);
            Ok(Some(doc))
        })],
        ..EntityHooks::default()
    };
    let engine = Engine::builder(EngineConfig::default())
        .collection(
            public("counters", vec![Field::number("count"), Field::number("previous")])
                .with_hooks(hooks),
        )
        .build()
        .await
        .unwrap();
    let req = engine.request();

    let doc = engine
        .create("counters", json!({"count": 1}), &req, WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["previous"], Value::Null);

    let doc = engine
        .update("counters", &id_of(&doc), json!({"count": 2}), &req, WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["count"], 2);
    assert_eq!(doc["previous"], 1);
}

#[tokio::test]
async fn after_change_failure_keeps_the_write() {
    let store = Arc::new(MemoryStore::new());
    let hooks = EntityHooks {
        after_change: vec![hook_fn(|_| Err(anyhow::anyhow!("mail server down")))],
        ..EntityHooks::default()
    };
    let engine = Engine::builder(EngineConfig::default())
        .store(store.clone())
        .collection(public("orders", vec![Field::text("item")]).with_hooks(hooks))
        .build()
        .await
        .unwrap();

    let err = engine
        .create("orders", json!({"item": "book"}), &engine.request(), WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Hook { hook: "afterChange", .. }));
    assert_eq!(store.count("orders").await, 1);
}

#[tokio::test]
async fn before_change_failure_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let hooks = EntityHooks {
        before_change: vec![hook_fn(|_| Err(anyhow::anyhow!("rejected")))],
        ..EntityHooks::default()
    };
    let engine = Engine::builder(EngineConfig::default())
        .store(store.clone())
        .collection(public("orders", vec![Field::text("item")]).with_hooks(hooks))
        .build()
        .await
        .unwrap();

    let err = engine
        .create("orders", json!({"item": "book"}), &engine.request(), WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Hook { hook: "beforeChange", .. }));
    assert_eq!(store.count("orders").await, 0);
}

#[tokio::test]
async fn before_operation_rewrites_arguments() {
    let hooks = EntityHooks {
        before_operation: vec![operation_hook_fn(|args, _| {
            let mut args = args.clone();
            if let Some(data) = args.data.as_mut() {
                data["title"] = json!("rewritten");
            }
            Ok(Some(args))
        })],
        ..EntityHooks::default()
    };
    let engine = Engine::builder(EngineConfig::default())
        .collection(public("posts", vec![Field::text("title")]).with_hooks(hooks))
        .build()
        .await
        .unwrap();

    let doc = engine
        .create("posts", json!({"title": "original"}), &engine.request(), WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["title"], "rewritten");
}

// ── Request cache ────────────────────────────────────────────────

struct CountingStore {
    inner: MemoryStore,
    finds: AtomicUsize,
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn register(&self, collection: &str, schema: &StorageSchema) -> StorageResult<()> {
        self.inner.register(collection, schema).await
    }

    async fn insert(&self, collection: &str, doc: Value) -> StorageResult<Value> {
        self.inner.insert(collection, doc).await
    }

    async fn find_one(&self, collection: &str, filter: &Where) -> StorageResult<Option<Value>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(collection, filter).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Where,
        changes: Value,
    ) -> StorageResult<Option<Value>> {
        self.inner.update_one(collection, filter, changes).await
    }
}

#[tokio::test]
async fn repeated_read_is_served_from_the_request_cache() {
    let store = Arc::new(CountingStore {
        inner: MemoryStore::new(),
        finds: AtomicUsize::new(0),
    });
    let engine = Engine::builder(EngineConfig::default())
        .store(store.clone())
        .collection(public("posts", vec![Field::text("title")]))
        .build()
        .await
        .unwrap();
    let doc = engine
        .create("posts", json!({"title": "cached"}), &engine.request(), WriteOptions::default())
        .await
        .unwrap();
    let id = id_of(&doc);

    let req = engine.request();
    for _ in 0..2 {
        let read = engine
            .find_by_id("posts", &id, &req, FindOptions::default())
            .await
            .unwrap();
        assert_eq!(read["title"], "cached");
    }
    assert_eq!(store.finds.load(Ordering::SeqCst), 1);

    engine
        .find_by_id("posts", &id, &engine.request(), FindOptions::default())
        .await
        .unwrap();
    assert_eq!(store.finds.load(Ordering::SeqCst), 2);
}

// ── Population ───────────────────────────────────────────────────

async fn blog_engine() -> (Engine, DocumentId, DocumentId) {
    let users = CollectionConfig::new("users", vec![Field::text("name")]).with_access(EntityAccess {
        create: Some(anyone()),
        read: Some(access_fn(|args| args.req.is_authenticated().into())),
        ..EntityAccess::default()
    });
    let engine = Engine::builder(EngineConfig::default())
        .collection(users)
        .collection(public(
            "posts",
            vec![
                Field::text("title"),
                Field::relationship("author", "users"),
                Field::polymorphic_relationship("related", &["users", "posts"]),
            ],
        ))
        .build()
        .await
        .unwrap();

    let user = engine
        .create("users", json!({"name": "Ann"}), &admin(), WriteOptions::default())
        .await
        .unwrap();
    let user_id = id_of(&user);
    let post = engine
        .create(
            "posts",
            json!({
                "title": "First",
                "author": user["id"],
                "related": {"relationTo": "users", "value": user["id"]},
            }),
            &admin(),
            WriteOptions::depth(0),
        )
        .await
        .unwrap();
    let post_id = id_of(&post);
    (engine, user_id, post_id)
}

#[tokio::test]
async fn depth_populates_relationships() {
    let (engine, user_id, post_id) = blog_engine().await;
    let reader = RequestContext::new().with_user(json!({"id": "reader"}));

    let post = engine
        .find_by_id("posts", &post_id, &reader, FindOptions::depth(1))
        .await
        .unwrap();
    assert_eq!(post["author"]["name"], "Ann");
    assert_eq!(post["related"]["relationTo"], "users");
    assert_eq!(post["related"]["value"]["name"], "Ann");

    let raw = engine
        .find_by_id("posts", &post_id, &engine.request(), FindOptions::depth(0))
        .await
        .unwrap();
    assert_eq!(raw["author"], user_id.to_value());
}

#[tokio::test]
async fn denied_nested_read_keeps_the_raw_id() {
    let (engine, user_id, post_id) = blog_engine().await;

    let post = engine
        .find_by_id("posts", &post_id, &RequestContext::new(), FindOptions::depth(2))
        .await
        .unwrap();
    assert_eq!(post["title"], "First");
    assert_eq!(post["author"], user_id.to_value());
    assert_eq!(post["related"]["value"], user_id.to_value());
}

#[tokio::test]
async fn depth_is_capped_by_config() {
    let config = EngineConfig {
        default_depth: 0,
        max_depth: 0,
        ..EngineConfig::default()
    };
    let engine = Engine::builder(config)
        .collection(public("users", vec![Field::text("name")]))
        .collection(public("posts", vec![Field::relationship("author", "users")]))
        .build()
        .await
        .unwrap();
    let user = engine
        .create("users", json!({"name": "Ann"}), &admin(), WriteOptions::default())
        .await
        .unwrap();
    let post = engine
        .create("posts", json!({"author": user["id"]}), &admin(), WriteOptions::depth(5))
        .await
        .unwrap();
    assert_eq!(post["author"], user["id"]);
}

// ── Custom ids ───────────────────────────────────────────────────

async fn orders_engine() -> Engine {
    Engine::builder(EngineConfig::default())
        .collection(public("orders", vec![Field::number("id"), Field::text("item")]))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn custom_id_is_required_on_create() {
    let engine = orders_engine().await;
    let err = engine
        .create("orders", json!({"item": "book"}), &engine.request(), WriteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.validation_errors().unwrap().fields(), vec!["id"]);
}

#[tokio::test]
async fn custom_id_is_coerced_to_its_type() {
    let engine = orders_engine().await;
    let req = engine.request();
    let doc = engine
        .create("orders", json!({"id": "42", "item": "book"}), &req, WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["id"], 42);

    let read = engine
        .find_by_id("orders", &DocumentId::Text("42".into()), &req, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(read["item"], "book");

    let err = engine
        .find_by_id("orders", &DocumentId::Text("abc".into()), &req, FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidId(_)));
    let none = engine
        .try_find_by_id("orders", &DocumentId::Text("abc".into()), &req, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(none, None);
}

// ── Uploads and side effects ─────────────────────────────────────

async fn media_engine() -> Engine {
    Engine::builder(EngineConfig::default())
        .collection(
            public("media", vec![Field::text("alt"), Field::text("filename").required()]).with_upload(
                UploadConfig {
                    mime_types: vec!["image/*".into()],
                },
            ),
        )
        .build()
        .await
        .unwrap()
}

fn file(name: &str, mime_type: &str) -> FileInput {
    FileInput {
        filename: name.into(),
        mime_type: mime_type.into(),
        data: vec![0; 16],
    }
}

#[tokio::test]
async fn upload_requires_a_file() {
    let engine = media_engine().await;
    let err = engine
        .create("media", json!({"alt": "cat"}), &engine.request(), WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingFile));
}

#[tokio::test]
async fn upload_metadata_is_validated_like_any_field() {
    let engine = media_engine().await;
    let req = engine.request().with_file(file("cat photo.png", "image/png"));
    let doc = engine
        .create("media", json!({"alt": "cat"}), &req, WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["filename"], "cat-photo.png");
    assert_eq!(doc["filesize"], 16);
    assert_eq!(doc["mimeType"], "image/png");
}

#[tokio::test]
async fn upload_rejects_unaccepted_mime_types() {
    let engine = media_engine().await;
    let req = engine.request().with_file(file("notes.txt", "text/plain"));
    let err = engine
        .create("media", json!({}), &req, WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Upload(_)));
}

struct Notify(mpsc::UnboundedSender<SideEffectContext>);

#[async_trait]
impl SideEffect for Notify {
    async fn run(&self, ctx: SideEffectContext) -> anyhow::Result<()> {
        self.0.send(ctx)?;
        Ok(())
    }
}

struct Broken;

#[async_trait]
impl SideEffect for Broken {
    async fn run(&self, _ctx: SideEffectContext) -> anyhow::Result<()> {
        anyhow::bail!("smtp unreachable")
    }
}

#[tokio::test]
async fn side_effects_run_after_create_without_blocking_it() {
    init_tracing();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = Engine::builder(EngineConfig::default())
        .collection(
            public("users", vec![Field::email("email")])
                .with_after_create_effect(Arc::new(Broken))
                .with_after_create_effect(Arc::new(Notify(tx))),
        )
        .build()
        .await
        .unwrap();

    let req = engine.request().with_user(json!({"id": "admin"}));
    let doc = engine
        .create("users", json!({"email": "a@example.com"}), &req, WriteOptions::default())
        .await
        .unwrap();

    let ctx = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ctx.collection, "users");
    assert_eq!(ctx.doc["id"], doc["id"]);
    assert_eq!(ctx.user, Some(json!({"id": "admin"})));
}

// ── Globals ──────────────────────────────────────────────────────

#[tokio::test]
async fn global_reads_empty_then_upserts() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::builder(EngineConfig::default())
        .store(store.clone())
        .global(
            GlobalConfig::new(
                "settings",
                vec![
                    Field::text("siteName"),
                    Field::checkbox("maintenance").default_value(false),
                ],
            )
            .with_access(EntityAccess::public()),
        )
        .build()
        .await
        .unwrap();
    let req = engine.request();

    let empty = engine
        .find_global("settings", &req, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(empty, json!({}));

    let first = engine
        .update_global("settings", json!({"siteName": "Lectern"}), &req, WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(first["siteName"], "Lectern");
    assert_eq!(first["maintenance"], false);

    engine
        .update_global("settings", json!({"maintenance": true}), &req, WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(store.count(GLOBALS_COLLECTION).await, 1);

    let read = engine
        .find_global("settings", &req, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(read["siteName"], "Lectern");
    assert_eq!(read["maintenance"], true);
    assert!(read.get("globalType").is_none());
}

#[tokio::test]
async fn localized_global_keeps_other_locales() {
    let config = EngineConfig::default().with_localization(LocalizationConfig::new(["en", "es"], "en"));
    let engine = Engine::builder(config)
        .global(
            GlobalConfig::new("footer", vec![Field::text("tagline").localized()])
                .with_access(EntityAccess::public()),
        )
        .build()
        .await
        .unwrap();

    let en = RequestContext::new().with_locale("en");
    let es = RequestContext::new().with_locale("es");
    engine
        .update_global("footer", json!({"tagline": "Read more"}), &en, WriteOptions::default())
        .await
        .unwrap();
    engine
        .update_global("footer", json!({"tagline": "Leer más"}), &es, WriteOptions::default())
        .await
        .unwrap();

    let all = RequestContext::new().with_locale("all");
    let doc = engine.find_global("footer", &all, FindOptions::default()).await.unwrap();
    assert_eq!(doc["tagline"], json!({"en": "Read more", "es": "Leer más"}));
}

#[tokio::test]
async fn global_without_access_is_forbidden() {
    let engine = Engine::builder(EngineConfig::default())
        .global(GlobalConfig::new("settings", vec![Field::text("siteName")]))
        .build()
        .await
        .unwrap();

    let err = engine
        .find_global("settings", &RequestContext::new(), FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    let err = engine
        .update_global("nope", json!({}), &admin(), WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownGlobal(_)));
}

#[tokio::test]
async fn global_hidden_by_read_filter_is_forbidden() {
    let access = EntityAccess {
        read: Some(access_fn(|_| Where::equals("published", true).into())),
        ..EntityAccess::public()
    };
    let engine = Engine::builder(EngineConfig::default())
        .global(
            GlobalConfig::new("banner", vec![Field::text("text"), Field::checkbox("published")])
                .with_access(access),
        )
        .build()
        .await
        .unwrap();
    let visitor = RequestContext::new();

    let unwritten = engine
        .find_global("banner", &visitor, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(unwritten, json!({}));

    engine
        .update_global(
            "banner",
            json!({"text": "Sale", "published": false}),
            &admin(),
            WriteOptions::default(),
        )
        .await
        .unwrap();
    let err = engine
        .find_global("banner", &visitor, FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    engine
        .update_global("banner", json!({"published": true}), &admin(), WriteOptions::default())
        .await
        .unwrap();
    let doc = engine
        .find_global("banner", &visitor, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(doc["text"], "Sale");
}
