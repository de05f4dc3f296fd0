//! Per-request context.
//!
//! A `RequestContext` is created when a request enters the engine and
//! dropped when it leaves. It owns the request-scoped read cache; nothing
//! in it is shared with other requests.

use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

/// Locale selector that disables flattening on read.
pub const ALL_LOCALES: &str = "all";

/// Entries kept by the per-request find cache.
pub const DEFAULT_FIND_CACHE_SIZE: usize = 100;

/// An uploaded file attached to a create or update request.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Bounded memo of read-by-id lookups keyed by serialized query.
///
/// Misses are cached too, so a repeated lookup of a missing document
/// does not reach the store twice.
pub struct FindCache {
    entries: Mutex<LruCache<String, Option<Value>>>,
}

impl FindCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns `Some(cached)` on a hit, where `cached` may itself be `None`
    /// for a remembered miss.
    pub async fn get(&self, key: &str) -> Option<Option<Value>> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn insert(&self, key: String, value: Option<Value>) {
        self.entries.lock().await.put(key, value);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for FindCache {
    fn default() -> Self {
        Self::new(DEFAULT_FIND_CACHE_SIZE)
    }
}

/// Everything an operation knows about the request that triggered it.
pub struct RequestContext {
    /// The acting user, as produced by the (external) auth layer.
    pub user: Option<Value>,
    /// Requested locale; `None` means the configured default.
    pub locale: Option<String>,
    /// Fallback locale; `None` means the configured default.
    pub fallback_locale: Option<String>,
    /// Relationship population depth; `None` means the configured default.
    pub depth: Option<u32>,
    pub override_access: bool,
    pub file: Option<FileInput>,
    find_cache: FindCache,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            user: None,
            locale: None,
            fallback_locale: None,
            depth: None,
            override_access: false,
            file: None,
            find_cache: FindCache::default(),
        }
    }

    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_fallback_locale(mut self, locale: impl Into<String>) -> Self {
        self.fallback_locale = Some(locale.into());
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_override_access(mut self) -> Self {
        self.override_access = true;
        self
    }

    pub fn with_file(mut self, file: FileInput) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_cache_size(mut self, capacity: usize) -> Self {
        self.find_cache = FindCache::new(capacity);
        self
    }

    pub fn find_cache(&self) -> &FindCache {
        &self.find_cache
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
