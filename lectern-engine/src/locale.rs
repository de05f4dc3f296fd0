//! Locale projection between storage and request representation.
//!
//! Localized fields are stored as `{locale: value}` maps. Reads flatten a
//! map to the value of one locale, with a single fallback hop; writes
//! unflatten a value back into the stored map at one locale and leave
//! every other locale untouched.

use crate::config::LocalizationConfig;
use lectern_model::{RequestContext, ALL_LOCALES};
use serde_json::{Map, Value};

/// Value of `locale`, else of `fallback`, else null. Null and missing
/// entries are both treated as absent.
///
/// Values that are not locale maps are returned unchanged.
pub fn flatten(stored: &Value, locale: &str, fallback: Option<&str>) -> Value {
    let Value::Object(map) = stored else {
        return stored.clone();
    };
    let present = |key: &str| map.get(key).filter(|v| !v.is_null());
    present(locale)
        .or_else(|| fallback.and_then(present))
        .cloned()
        .unwrap_or(Value::Null)
}

/// `previous` with the entry at `locale` replaced by `value`.
pub fn unflatten(previous: Option<&Value>, value: Value, locale: &str) -> Value {
    let mut map = match previous {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    map.insert(locale.to_string(), value);
    Value::Object(map)
}

/// Adds a null entry for every configured locale missing from `map`.
pub fn fill_locales(map: &mut Value, locales: &[String]) {
    if !map.is_object() {
        *map = Value::Object(Map::new());
    }
    if let Value::Object(entries) = map {
        for locale in locales {
            entries.entry(locale.clone()).or_insert(Value::Null);
        }
    }
}

/// The locales one request reads and writes in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocale {
    /// Locale read from.
    pub locale: String,
    /// Locale written to; always one of the configured locales.
    pub write_locale: String,
    /// Read fallback, if any.
    pub fallback: Option<String>,
    /// Whether reads flatten locale maps; false for the `all` selector.
    pub flatten: bool,
}

impl ResolvedLocale {
    /// Resolves the request's locale selectors against the configuration.
    /// `None` when localization is off.
    pub fn resolve(localization: Option<&LocalizationConfig>, req: &RequestContext) -> Option<Self> {
        let config = localization?;
        let requested = req.locale.as_deref();
        let flatten = requested != Some(ALL_LOCALES);

        let locale = match requested {
            Some(code) if code != ALL_LOCALES => code.to_string(),
            _ => config.default_locale.clone(),
        };
        let write_locale = if config.locales.contains(&locale) {
            locale.clone()
        } else {
            config.default_locale.clone()
        };
        let fallback = if config.fallback {
            Some(
                req.fallback_locale
                    .clone()
                    .unwrap_or_else(|| config.default_locale.clone()),
            )
        } else {
            None
        };

        Some(Self {
            locale,
            write_locale,
            fallback,
            flatten,
        })
    }

    pub fn flatten_value(&self, stored: &Value) -> Value {
        flatten(stored, &self.locale, self.fallback.as_deref())
    }
}
