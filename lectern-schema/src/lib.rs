//! Schema compiler for Lectern.
//!
//! Turns a field configuration tree into a [`StorageSchema`]: the shape a
//! document store needs to persist documents of one entity. Compilation
//! runs once per entity at registration and is deterministic, so the same
//! tree always yields a structurally equal schema.
//!
//! # Shapes
//!
//! - Scalar kinds become a [`Slot::Scalar`] with their base constraints
//! - Localized fields fan out into a [`Slot::Localized`] map with one entry
//!   per configured locale
//! - Relations become typed pointers, or `{relationTo, value}` pointers
//!   when polymorphic
//! - `group`/`array` embed sub-schemas; `row` is transparent
//! - `blocks` reference variants in the schema's block registry, keyed by
//!   slug and discriminated by [`BLOCK_DISCRIMINATOR`]

mod compiler;
mod error;
mod schema;

pub use compiler::{SchemaCompiler, UnknownKindPolicy};
pub use error::{SchemaError, SchemaResult};
pub use schema::{
    Constraints, ScalarType, SchemaField, Slot, StorageSchema, SubSchema, UniquePath,
    BLOCK_DISCRIMINATOR,
};
