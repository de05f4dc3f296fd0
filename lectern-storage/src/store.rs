use crate::error::StorageResult;
use async_trait::async_trait;
use lectern_schema::StorageSchema;
use lectern_types::Where;
use serde_json::Value;

/// Key holding a document's identifier.
pub const ID_KEY: &str = "id";

/// A generic document store.
///
/// Implementations must enforce the schema's unique paths and report a
/// violation as [`StorageError::DuplicateKey`](crate::StorageError::DuplicateKey)
/// naming the logical field.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Prepares a collection for documents of the given schema.
    /// Re-registering replaces the schema and keeps existing documents.
    async fn register(&self, collection: &str, schema: &StorageSchema) -> StorageResult<()>;

    /// Inserts a document and returns it as stored. Documents without an
    /// `id` get one from the store when the schema uses opaque ids.
    async fn insert(&self, collection: &str, doc: Value) -> StorageResult<Value>;

    async fn find_one(&self, collection: &str, filter: &Where) -> StorageResult<Option<Value>>;

    /// Sets the top-level keys of `changes` on the first matching document
    /// and returns it, or `None` when nothing matched.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Where,
        changes: Value,
    ) -> StorageResult<Option<Value>>;
}
