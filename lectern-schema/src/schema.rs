use lectern_types::IdType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key that stores a block item's slug next to its payload.
pub const BLOCK_DISCRIMINATOR: &str = "blockType";

fn is_false(value: &bool) -> bool {
    !*value
}

/// The persisted shape of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSchema {
    pub id_type: IdType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub timestamps: bool,
    pub fields: Vec<SchemaField>,
    /// Every block variant reachable from this schema, keyed by slug.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, SubSchema>,
}

/// An embedded schema: a `group`, an `array` element, or a block variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubSchema {
    pub fields: Vec<SchemaField>,
}

/// A named storage slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(flatten)]
    pub slot: Slot,
}

/// Constraints carried by a slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub index: bool,
    /// Unique only among documents that have a value.
    #[serde(default, skip_serializing_if = "is_false")]
    pub sparse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    String,
    Number,
    /// RFC 3339 timestamp.
    Date,
    Boolean,
    /// Opaque structured value, e.g. rich text.
    Json,
}

/// Storage shape of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slot", rename_all = "snake_case")]
pub enum Slot {
    Scalar {
        #[serde(rename = "type")]
        ty: ScalarType,
        #[serde(default)]
        constraints: Constraints,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        enum_values: Vec<String>,
        #[serde(default, skip_serializing_if = "is_false")]
        many: bool,
    },
    /// Reference to a document of a single target collection.
    Pointer {
        target: String,
        id_type: IdType,
        #[serde(default)]
        constraints: Constraints,
        #[serde(default, skip_serializing_if = "is_false")]
        many: bool,
    },
    /// `{relationTo, value}` reference to one of several collections.
    PolymorphicPointer {
        targets: Vec<String>,
        id_type: IdType,
        #[serde(default)]
        constraints: Constraints,
        #[serde(default, skip_serializing_if = "is_false")]
        many: bool,
    },
    Embedded {
        schema: SubSchema,
        #[serde(default)]
        constraints: Constraints,
    },
    EmbeddedArray {
        schema: SubSchema,
        #[serde(default)]
        constraints: Constraints,
    },
    /// Array of items discriminated by [`BLOCK_DISCRIMINATOR`]; each slug
    /// resolves in [`StorageSchema::blocks`].
    Blocks {
        variants: Vec<String>,
        #[serde(default)]
        constraints: Constraints,
    },
    /// One slot per configured locale.
    Localized { locales: BTreeMap<String, Slot> },
}

impl Slot {
    pub fn constraints(&self) -> Option<&Constraints> {
        match self {
            Self::Scalar { constraints, .. }
            | Self::Pointer { constraints, .. }
            | Self::PolymorphicPointer { constraints, .. }
            | Self::Embedded { constraints, .. }
            | Self::EmbeddedArray { constraints, .. }
            | Self::Blocks { constraints, .. } => Some(constraints),
            Self::Localized { .. } => None,
        }
    }

    pub fn is_localized(&self) -> bool {
        matches!(self, Self::Localized { .. })
    }
}

/// A storage path that must hold unique values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniquePath {
    /// Dotted storage path, including the locale segment for localized slots.
    pub path: String,
    /// The field reported when the constraint is violated.
    pub field: String,
    pub sparse: bool,
}

impl StorageSchema {
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of top-level localized fields.
    pub fn localized_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.slot.is_localized())
            .map(|f| f.name.as_str())
    }

    /// Unique constraints a store must enforce. Embedded groups contribute
    /// nested paths; array elements and block items are not indexed.
    pub fn unique_paths(&self) -> Vec<UniquePath> {
        let mut out = Vec::new();
        collect_unique(&self.fields, "", "", &mut out);
        out
    }
}

fn collect_unique(fields: &[SchemaField], path: &str, logical: &str, out: &mut Vec<UniquePath>) {
    for field in fields {
        let path = join(path, &field.name);
        let logical = join(logical, &field.name);
        collect_slot(&field.slot, &path, &logical, out);
    }
}

fn collect_slot(slot: &Slot, path: &str, logical: &str, out: &mut Vec<UniquePath>) {
    match slot {
        Slot::Localized { locales } => {
            for (locale, inner) in locales {
                collect_slot(inner, &join(path, locale), logical, out);
            }
        }
        Slot::Embedded { schema, .. } => collect_unique(&schema.fields, path, logical, out),
        Slot::EmbeddedArray { .. } | Slot::Blocks { .. } => {}
        Slot::Scalar { constraints, .. }
        | Slot::Pointer { constraints, .. }
        | Slot::PolymorphicPointer { constraints, .. } => {
            if constraints.unique {
                out.push(UniquePath {
                    path: path.to_string(),
                    field: logical.to_string(),
                    sparse: constraints.sparse,
                });
            }
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
