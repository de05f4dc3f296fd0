//! Persistence seam for Lectern.
//!
//! The engine talks to storage only through [`DocumentStore`]: register a
//! compiled schema, insert, find one by filter, update one by filter.
//! Documents cross the seam in storage representation (localized fields as
//! locale maps) with their identifier under the `id` key.
//!
//! [`MemoryStore`] is the reference implementation used by tests and the
//! CLI. It enforces the unique constraints of the registered schema and
//! reports violations as [`StorageError::DuplicateKey`].

mod error;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use store::{DocumentStore, ID_KEY};
