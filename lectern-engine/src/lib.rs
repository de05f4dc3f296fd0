//! Lectern engine.
//!
//! Runs documents through their lifecycle:
//! - [`locale`] projects localized fields between the stored locale maps
//!   and the single value a request reads or writes
//! - [`pipeline`] walks a field tree for one stage (defaults, conditions,
//!   field access, validation, field hooks, population)
//! - [`Engine`] orchestrates whole operations (create, read by id, update,
//!   and the global variants) over a [`DocumentStore`](lectern_storage::DocumentStore)
//!
//! ```no_run
//! use lectern_engine::{Engine, EngineConfig, WriteOptions};
//! use lectern_model::{CollectionConfig, EntityAccess, Field};
//! use serde_json::json;
//!
//! # async fn demo() -> lectern_engine::EngineResult<()> {
//! let engine = Engine::builder(EngineConfig::default())
//!     .collection(
//!         CollectionConfig::new("posts", vec![Field::text("title").required()])
//!             .with_access(EntityAccess::public()),
//!     )
//!     .build()
//!     .await?;
//!
//! let req = engine.request();
//! let post = engine
//!     .create("posts", json!({ "title": "Hello" }), &req, WriteOptions::default())
//!     .await?;
//! assert_eq!(post["title"], "Hello");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod locale;
pub mod pipeline;

mod engine;

pub use config::{ConfigFile, EngineConfig, LocalizationConfig};
pub use engine::{Engine, EngineBuilder, FindOptions, WriteOptions, GLOBALS_COLLECTION};
pub use error::{EngineError, EngineResult, FieldError, ValidationErrors};
pub use locale::{fill_locales, flatten, unflatten, ResolvedLocale};
pub use pipeline::{FieldPipeline, NoPopulation, RelationResolver, StageContext};
