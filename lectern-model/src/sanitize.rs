//! Structural checks on a field tree, run once when an entity registers.

use crate::error::{ModelError, ModelResult};
use crate::field::{Field, FieldKind};
use std::collections::HashSet;
use tracing::debug;

/// Validates the invariants of a field tree:
/// sibling names are unique (transparent `row`/anonymous `group` children
/// count in the parent namespace), block slugs are unique per `blocks`
/// field, data-bearing kinds are named, option lists and relation targets
/// are non-empty.
pub fn sanitize_fields(fields: &[Field]) -> ModelResult<()> {
    let mut seen = HashSet::new();
    sanitize_namespace(fields, "", &mut seen)
        .inspect_err(|err| debug!(error = %err, "field tree rejected"))?;
    debug!(top_level = seen.len(), "field tree sanitized");
    Ok(())
}

fn sanitize_namespace<'a>(
    fields: &'a [Field],
    prefix: &str,
    seen: &mut HashSet<&'a str>,
) -> ModelResult<()> {
    for (position, field) in fields.iter().enumerate() {
        if field.is_transparent() {
            sanitize_namespace(field.sub_fields().unwrap_or_default(), prefix, seen)?;
            continue;
        }

        let Some(name) = field.name() else {
            return Err(ModelError::MissingFieldName {
                path: format!("{}[{position}]", display_prefix(prefix)),
                kind: field.kind.as_str().to_string(),
            });
        };
        let path = join_path(prefix, name);

        if !seen.insert(name) {
            return Err(ModelError::DuplicateFieldName { path });
        }

        match &field.kind {
            FieldKind::Radio { options } | FieldKind::Select { options, .. } => {
                if options.is_empty() {
                    return Err(ModelError::EmptyOptions { path });
                }
            }
            FieldKind::Upload { relation_to } => {
                if relation_to.is_empty() {
                    return Err(ModelError::MissingRelationTarget { path });
                }
            }
            FieldKind::Relationship { relation_to, .. } => {
                let targets = relation_to.targets();
                if targets.is_empty() || targets.iter().any(|t| t.is_empty()) {
                    return Err(ModelError::MissingRelationTarget { path });
                }
            }
            FieldKind::Group { fields } | FieldKind::Array { fields, .. } => {
                sanitize_namespace(fields, &path, &mut HashSet::new())?;
            }
            FieldKind::Blocks { blocks, .. } => {
                let mut slugs = HashSet::new();
                for block in blocks {
                    if !slugs.insert(block.slug.as_str()) {
                        return Err(ModelError::DuplicateBlockSlug {
                            path,
                            slug: block.slug.clone(),
                        });
                    }
                    let block_path = format!("{path}.{}", block.slug);
                    sanitize_namespace(&block.fields, &block_path, &mut HashSet::new())?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn display_prefix(prefix: &str) -> &str {
    if prefix.is_empty() { "fields" } else { prefix }
}
