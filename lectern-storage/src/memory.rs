//! In-memory [`DocumentStore`].

use crate::error::{StorageError, StorageResult};
use crate::store::{DocumentStore, ID_KEY};
use async_trait::async_trait;
use lectern_schema::{StorageSchema, UniquePath};
use lectern_types::{DocumentId, IdType, Where};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

struct Collection {
    id_type: IdType,
    unique: Vec<UniquePath>,
    docs: Vec<Value>,
}

impl Collection {
    fn new(schema: &StorageSchema) -> Self {
        Self {
            id_type: schema.id_type,
            unique: schema.unique_paths(),
            docs: Vec::new(),
        }
    }

    /// Fails when `doc` collides with any stored document other than `skip`.
    ///
    /// Absent values only skip the check on sparse paths; two documents
    /// missing a non-sparse unique value collide.
    fn check_unique(&self, name: &str, doc: &Value, skip: Option<usize>) -> StorageResult<()> {
        let others = || {
            self.docs
                .iter()
                .enumerate()
                .filter(move |(i, _)| Some(*i) != skip)
                .map(|(_, d)| d)
        };

        if let Some(id) = doc.get(ID_KEY) {
            if others().any(|d| d.get(ID_KEY) == Some(id)) {
                return Err(duplicate(name, ID_KEY));
            }
        }

        for unique in &self.unique {
            let value = lookup(doc, &unique.path).filter(|v| !v.is_null());
            if value.is_none() && unique.sparse {
                continue;
            }
            let collides = others().any(|other| {
                let existing = lookup(other, &unique.path).filter(|v| !v.is_null());
                if existing.is_none() && unique.sparse {
                    return false;
                }
                existing == value
            });
            if collides {
                return Err(duplicate(name, &unique.field));
            }
        }
        Ok(())
    }
}

fn duplicate(collection: &str, field: &str) -> StorageError {
    StorageError::DuplicateKey {
        collection: collection.to_string(),
        field: field.to_string(),
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

/// Stores documents in insertion order behind a `tokio` lock.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection; zero when unregistered.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.docs.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn register(&self, collection: &str, schema: &StorageSchema) -> StorageResult<()> {
        let mut collections = self.collections.write().await;
        match collections.get_mut(collection) {
            Some(existing) => {
                existing.id_type = schema.id_type;
                existing.unique = schema.unique_paths();
            }
            None => {
                collections.insert(collection.to_string(), Collection::new(schema));
            }
        }
        debug!(collection, "registered collection");
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: Value) -> StorageResult<Value> {
        let Value::Object(mut fields) = doc else {
            return Err(StorageError::InvalidData(format!(
                "documents in {collection} must be objects"
            )));
        };

        let mut collections = self.collections.write().await;
        let state = collections
            .get_mut(collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.to_string()))?;

        if fields.get(ID_KEY).is_none_or(Value::is_null) {
            if state.id_type != IdType::Opaque {
                return Err(StorageError::InvalidData(format!(
                    "documents in {collection} need a caller-supplied {} id",
                    state.id_type.as_str()
                )));
            }
            fields.insert(ID_KEY.to_string(), DocumentId::generate().to_value());
        }

        let doc = Value::Object(fields);
        state.check_unique(collection, &doc, None)?;
        state.docs.push(doc.clone());
        debug!(collection, id = %doc[ID_KEY], "inserted document");
        Ok(doc)
    }

    async fn find_one(&self, collection: &str, filter: &Where) -> StorageResult<Option<Value>> {
        let collections = self.collections.read().await;
        let state = collections
            .get(collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.to_string()))?;
        Ok(state.docs.iter().find(|doc| filter.matches(doc)).cloned())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Where,
        changes: Value,
    ) -> StorageResult<Option<Value>> {
        let Value::Object(changes) = changes else {
            return Err(StorageError::InvalidData(format!(
                "updates in {collection} must be objects"
            )));
        };

        let mut collections = self.collections.write().await;
        let state = collections
            .get_mut(collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.to_string()))?;

        let Some(position) = state.docs.iter().position(|doc| filter.matches(doc)) else {
            return Ok(None);
        };

        let mut merged = match &state.docs[position] {
            Value::Object(existing) => existing.clone(),
            _ => Map::new(),
        };
        for (key, value) in changes {
            if key != ID_KEY {
                merged.insert(key, value);
            }
        }

        let doc = Value::Object(merged);
        state.check_unique(collection, &doc, Some(position))?;
        state.docs[position] = doc.clone();
        debug!(collection, id = %doc[ID_KEY], "updated document");
        Ok(Some(doc))
    }
}
