//! Shared logic for the `lectern` operator binary.

use anyhow::{bail, Context, Result};
use lectern_engine::{ConfigFile, EngineBuilder};
use lectern_schema::{StorageSchema, UnknownKindPolicy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Compiled schemas of every entity in a config file.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct SchemaReport {
    pub collections: BTreeMap<String, StorageSchema>,
    pub globals: BTreeMap<String, StorageSchema>,
}

impl SchemaReport {
    /// The schema of one entity, collections first.
    pub fn entity(&self, slug: &str) -> Option<&StorageSchema> {
        self.collections.get(slug).or_else(|| self.globals.get(slug))
    }

    pub fn summary(&self) -> String {
        format!(
            "ok: {} collection(s), {} global(s)",
            self.collections.len(),
            self.globals.len()
        )
    }
}

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    ConfigFile::load_from(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Sanitizes and compiles every entity the way the engine does at startup.
pub async fn compile(file: ConfigFile, policy: UnknownKindPolicy) -> Result<SchemaReport> {
    let engine = EngineBuilder::from_config_file(file)
        .unknown_kind_policy(policy)
        .build()
        .await?;

    let mut report = SchemaReport::default();
    for slug in engine.collection_slugs() {
        if let Some(schema) = engine.collection_schema(slug) {
            report.collections.insert(slug.to_string(), schema.clone());
        }
    }
    for slug in engine.global_slugs() {
        if let Some(schema) = engine.global_schema(slug) {
            report.globals.insert(slug.to_string(), schema.clone());
        }
    }
    debug!(
        collections = report.collections.len(),
        globals = report.globals.len(),
        "compiled config"
    );
    Ok(report)
}

/// Pretty JSON of the whole report, or of a single entity's schema.
pub fn render(report: &SchemaReport, entity: Option<&str>) -> Result<String> {
    let rendered = match entity {
        Some(slug) => {
            let Some(schema) = report.entity(slug) else {
                bail!("no collection or global named {slug}");
            };
            serde_json::to_string_pretty(schema)?
        }
        None => serde_json::to_string_pretty(report)?,
    };
    Ok(rendered)
}
