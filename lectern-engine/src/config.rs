//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use lectern_model::{CollectionConfig, GlobalConfig, DEFAULT_FIND_CACHE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_depth() -> u32 {
    2
}

fn default_max_depth() -> u32 {
    10
}

fn default_find_cache_size() -> usize {
    DEFAULT_FIND_CACHE_SIZE
}

fn default_true() -> bool {
    true
}

/// Process-wide engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Population depth used when neither the operation nor the request
    /// names one.
    #[serde(default = "default_depth")]
    pub default_depth: u32,
    /// Hard cap on population depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Entries kept by each request's find cache.
    #[serde(default = "default_find_cache_size")]
    pub find_cache_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localization: Option<LocalizationConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth: default_max_depth(),
            find_cache_size: default_find_cache_size(),
            localization: None,
        }
    }
}

impl EngineConfig {
    pub fn with_localization(mut self, localization: LocalizationConfig) -> Self {
        self.localization = Some(localization);
        self
    }

    /// Configured locale codes; empty without localization.
    pub fn locales(&self) -> &[String] {
        self.localization
            .as_ref()
            .map(|l| l.locales.as_slice())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.default_depth > self.max_depth {
            return Err(EngineError::Config(format!(
                "default_depth {} exceeds max_depth {}",
                self.default_depth, self.max_depth
            )));
        }
        if let Some(localization) = &self.localization {
            localization.validate()?;
        }
        Ok(())
    }
}

/// Locales documents may be written and read in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationConfig {
    pub locales: Vec<String>,
    pub default_locale: String,
    /// Whether reads fall back to another locale when the requested one
    /// is empty.
    #[serde(default = "default_true")]
    pub fallback: bool,
}

impl LocalizationConfig {
    pub fn new<I, S>(locales: I, default_locale: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locales: locales.into_iter().map(Into::into).collect(),
            default_locale: default_locale.into(),
            fallback: true,
        }
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback = false;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.locales.is_empty() {
            return Err(EngineError::Config("localization needs at least one locale".into()));
        }
        if !self.locales.contains(&self.default_locale) {
            return Err(EngineError::Config(format!(
                "default locale {} is not in the locale list",
                self.default_locale
            )));
        }
        Ok(())
    }
}

/// A TOML file declaring the engine settings and every entity.
///
/// ```toml
/// [engine]
/// default_depth = 1
///
/// [engine.localization]
/// locales = ["en", "es"]
/// default_locale = "en"
///
/// [[collections]]
/// slug = "posts"
///
/// [[collections.fields]]
/// name = "title"
/// type = "text"
/// required = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
    #[serde(default)]
    pub globals: Vec<GlobalConfig>,
}

impl ConfigFile {
    pub fn from_toml(source: &str) -> EngineResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> EngineResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }
}
