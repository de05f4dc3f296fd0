//! Depth-first compilation of field trees.

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{Constraints, ScalarType, SchemaField, Slot, StorageSchema, SubSchema};
use lectern_model::{Block, CollectionConfig, Field, FieldKind, GlobalConfig, RelationTo};
use lectern_types::IdType;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// What to do with a field whose kind the compiler does not recognize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKindPolicy {
    /// Fail compilation with [`SchemaError::UnknownFieldKind`].
    #[default]
    Reject,
    /// Leave the field out of the schema and log a warning.
    Skip,
}

/// Compiles field trees against a fixed locale list and a table of
/// relation targets.
#[derive(Debug, Clone, Default)]
pub struct SchemaCompiler {
    locales: Vec<String>,
    targets: BTreeMap<String, IdType>,
    unknown_kinds: UnknownKindPolicy,
}

impl SchemaCompiler {
    pub fn new<I, S>(locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locales: locales.into_iter().map(Into::into).collect(),
            targets: BTreeMap::new(),
            unknown_kinds: UnknownKindPolicy::default(),
        }
    }

    /// Registers a collection that relationships and uploads may point at.
    pub fn with_target(mut self, slug: impl Into<String>, id_type: IdType) -> Self {
        self.targets.insert(slug.into(), id_type);
        self
    }

    /// Registers every collection as a relation target.
    pub fn with_collections<'a>(
        mut self,
        collections: impl IntoIterator<Item = &'a CollectionConfig>,
    ) -> Self {
        for collection in collections {
            self.targets.insert(collection.slug.clone(), collection.id_type());
        }
        self
    }

    pub fn with_unknown_kind_policy(mut self, policy: UnknownKindPolicy) -> Self {
        self.unknown_kinds = policy;
        self
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Compiles a bare field tree. A top-level `id` field is managed by the
    /// store and does not get a slot.
    pub fn compile(&self, fields: &[Field]) -> SchemaResult<StorageSchema> {
        let mut blocks = BTreeMap::new();
        let mut compiled = self.compile_fields(fields, "", &mut blocks)?;
        compiled.retain(|f| f.name != "id");
        Ok(StorageSchema {
            id_type: IdType::default(),
            timestamps: false,
            fields: compiled,
            blocks,
        })
    }

    pub fn compile_collection(&self, collection: &CollectionConfig) -> SchemaResult<StorageSchema> {
        let mut schema = self.compile(&collection.fields)?;
        schema.id_type = collection.id_type();
        schema.timestamps = collection.timestamps;
        debug!(
            collection = %collection.slug,
            fields = schema.fields.len(),
            blocks = schema.blocks.len(),
            "compiled collection schema"
        );
        Ok(schema)
    }

    pub fn compile_global(&self, global: &GlobalConfig) -> SchemaResult<StorageSchema> {
        let schema = self.compile(&global.fields)?;
        debug!(global = %global.slug, fields = schema.fields.len(), "compiled global schema");
        Ok(schema)
    }

    fn compile_fields(
        &self,
        fields: &[Field],
        prefix: &str,
        blocks: &mut BTreeMap<String, SubSchema>,
    ) -> SchemaResult<Vec<SchemaField>> {
        let mut out = Vec::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if field.is_transparent() {
                let children = field.sub_fields().unwrap_or_default();
                out.extend(self.compile_fields(children, prefix, blocks)?);
                continue;
            }

            let Some(name) = field.name() else {
                return Err(SchemaError::UnnamedField {
                    path: format!("{}[{position}]", if prefix.is_empty() { "fields" } else { prefix }),
                    kind: field.kind.as_str().to_string(),
                });
            };
            let path = join(prefix, name);

            if matches!(field.kind, FieldKind::Unknown) {
                match self.unknown_kinds {
                    UnknownKindPolicy::Reject => {
                        return Err(SchemaError::UnknownFieldKind { path });
                    }
                    UnknownKindPolicy::Skip => {
                        warn!(%path, "skipping field of unknown kind");
                        continue;
                    }
                }
            }

            let slot = self.compile_slot(field, &path, blocks)?;
            let slot = if field.localized && !self.locales.is_empty() {
                self.localize(slot)
            } else {
                slot
            };
            out.push(SchemaField { name: name.to_string(), slot });
        }
        Ok(out)
    }

    fn localize(&self, slot: Slot) -> Slot {
        let locales = self
            .locales
            .iter()
            .map(|locale| (locale.clone(), slot.clone()))
            .collect();
        Slot::Localized { locales }
    }

    fn compile_slot(
        &self,
        field: &Field,
        path: &str,
        blocks: &mut BTreeMap<String, SubSchema>,
    ) -> SchemaResult<Slot> {
        let constraints = base_constraints(field);
        let scalar = |ty| Slot::Scalar {
            ty,
            constraints,
            enum_values: Vec::new(),
            many: false,
        };

        let slot = match &field.kind {
            FieldKind::Text { .. }
            | FieldKind::Textarea { .. }
            | FieldKind::Email
            | FieldKind::Code => scalar(ScalarType::String),
            FieldKind::RichText => scalar(ScalarType::Json),
            FieldKind::Number { .. } => scalar(ScalarType::Number),
            FieldKind::Date => scalar(ScalarType::Date),
            FieldKind::Checkbox => scalar(ScalarType::Boolean),
            FieldKind::Radio { options } => Slot::Scalar {
                ty: ScalarType::String,
                constraints,
                enum_values: options.iter().map(|o| o.value().to_string()).collect(),
                many: false,
            },
            FieldKind::Select { options, has_many } => Slot::Scalar {
                ty: ScalarType::String,
                constraints,
                enum_values: options.iter().map(|o| o.value().to_string()).collect(),
                many: *has_many,
            },
            FieldKind::Upload { relation_to } => Slot::Pointer {
                target: relation_to.clone(),
                id_type: self.target_id_type(relation_to, path)?,
                constraints,
                many: false,
            },
            FieldKind::Relationship { relation_to, has_many } => match relation_to {
                RelationTo::One(target) => Slot::Pointer {
                    target: target.clone(),
                    id_type: self.target_id_type(target, path)?,
                    constraints,
                    many: *has_many,
                },
                RelationTo::Many(targets) => {
                    for target in targets {
                        self.target_id_type(target, path)?;
                    }
                    let id_type = match targets.first() {
                        Some(first) => self.target_id_type(first, path)?,
                        None => IdType::default(),
                    };
                    Slot::PolymorphicPointer {
                        targets: targets.clone(),
                        id_type,
                        constraints,
                        many: *has_many,
                    }
                }
            },
            FieldKind::Group { fields } => {
                let schema = SubSchema { fields: self.compile_fields(fields, path, blocks)? };
                let required = constraints.required
                    && direct_children(fields)
                        .iter()
                        .any(|child| child.is_unconditionally_required());
                Slot::Embedded {
                    schema,
                    constraints: Constraints { required, ..constraints },
                }
            }
            FieldKind::Array { fields, .. } => Slot::EmbeddedArray {
                schema: SubSchema { fields: self.compile_fields(fields, path, blocks)? },
                constraints,
            },
            FieldKind::Blocks { blocks: variants, .. } => {
                for block in variants {
                    self.register_block(block, path, blocks)?;
                }
                Slot::Blocks {
                    variants: variants.iter().map(|b| b.slug.clone()).collect(),
                    constraints,
                }
            }
            // Rows are flattened in `compile_fields`.
            FieldKind::Row { fields } => Slot::Embedded {
                schema: SubSchema { fields: self.compile_fields(fields, path, blocks)? },
                constraints,
            },
            FieldKind::Unknown => return Err(SchemaError::UnknownFieldKind { path: path.to_string() }),
        };
        Ok(slot)
    }

    fn register_block(
        &self,
        block: &Block,
        path: &str,
        blocks: &mut BTreeMap<String, SubSchema>,
    ) -> SchemaResult<()> {
        let block_path = join(path, &block.slug);
        let schema = SubSchema {
            fields: self.compile_fields(&block.fields, &block_path, blocks)?,
        };
        match blocks.get(&block.slug) {
            Some(existing) if *existing != schema => Err(SchemaError::ConflictingBlock {
                slug: block.slug.clone(),
                path: block_path,
            }),
            Some(_) => Ok(()),
            None => {
                blocks.insert(block.slug.clone(), schema);
                Ok(())
            }
        }
    }

    fn target_id_type(&self, target: &str, path: &str) -> SchemaResult<IdType> {
        self.targets
            .get(target)
            .copied()
            .ok_or_else(|| SchemaError::UnknownRelation {
                path: path.to_string(),
                target: target.to_string(),
            })
    }
}

/// `required` survives only when presence is guaranteed at validation time.
fn base_constraints(field: &Field) -> Constraints {
    let unique = field.unique;
    Constraints {
        required: field.is_unconditionally_required(),
        unique,
        index: field.index || unique,
        sparse: unique && field.localized,
    }
}

/// Children of a structural field, with transparent wrappers expanded.
fn direct_children(fields: &[Field]) -> Vec<&Field> {
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        if field.is_transparent() {
            out.extend(direct_children(field.sub_fields().unwrap_or_default()));
        } else {
            out.push(field);
        }
    }
    out
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
