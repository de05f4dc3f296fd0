use crate::access::AccessPredicate;
use crate::hooks::{FieldHook, Validator};
use lectern_types::{Operation, Stage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One node of the field configuration tree.
///
/// Data attributes (`name`, `kind`, `required`, ...) deserialize from config
/// files; callbacks (`access`, `admin.condition`, `validate`, `hooks`) are
/// attached in code.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Absent only for `row` and anonymous `group`, whose children live in
    /// the parent's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub localized: bool,
    /// Stored but left out of read results unless the caller asks for
    /// hidden fields.
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip)]
    pub access: FieldAccess,
    #[serde(skip)]
    pub admin: FieldAdmin,
    #[serde(skip)]
    pub validate: Option<Arc<dyn Validator>>,
    #[serde(skip)]
    pub hooks: FieldHooks,
}

/// The kind of a field, with kind-specific settings.
///
/// Config files name the kind in a `type` key. Kinds the engine does not
/// know deserialize to [`FieldKind::Unknown`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Textarea {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Email,
    Code,
    RichText,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Date,
    Checkbox,
    Radio {
        options: Vec<SelectOption>,
    },
    Select {
        options: Vec<SelectOption>,
        #[serde(default)]
        has_many: bool,
    },
    Upload {
        relation_to: String,
    },
    Relationship {
        relation_to: RelationTo,
        #[serde(default)]
        has_many: bool,
    },
    Group {
        fields: Vec<Field>,
    },
    Array {
        fields: Vec<Field>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_rows: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_rows: Option<usize>,
    },
    Blocks {
        blocks: Vec<Block>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_rows: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_rows: Option<usize>,
    },
    Row {
        fields: Vec<Field>,
    },
    #[serde(other)]
    Unknown,
}

impl FieldKind {
    /// The config-file name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Textarea { .. } => "textarea",
            Self::Email => "email",
            Self::Code => "code",
            Self::RichText => "richText",
            Self::Number { .. } => "number",
            Self::Date => "date",
            Self::Checkbox => "checkbox",
            Self::Radio { .. } => "radio",
            Self::Select { .. } => "select",
            Self::Upload { .. } => "upload",
            Self::Relationship { .. } => "relationship",
            Self::Group { .. } => "group",
            Self::Array { .. } => "array",
            Self::Blocks { .. } => "blocks",
            Self::Row { .. } => "row",
            Self::Unknown => "unknown",
        }
    }
}

/// A selectable option: either a bare value or a labeled value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectOption {
    Value(String),
    Labeled { label: String, value: String },
}

impl SelectOption {
    pub fn value(&self) -> &str {
        match self {
            Self::Value(v) => v,
            Self::Labeled { value, .. } => value,
        }
    }
}

impl From<&str> for SelectOption {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

/// The target entity (or entities) of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationTo {
    One(String),
    Many(Vec<String>),
}

impl RelationTo {
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Self::One(slug) => vec![slug.as_str()],
            Self::Many(slugs) => slugs.iter().map(String::as_str).collect(),
        }
    }

    /// A list of targets always stores `{relationTo, value}` pointers, even
    /// when the list has one entry.
    pub fn is_polymorphic(&self) -> bool {
        matches!(self, Self::Many(_))
    }
}

/// A named variant of a `blocks` field, discriminated by `slug`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub slug: String,
    pub fields: Vec<Field>,
}

impl Block {
    pub fn new(slug: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            slug: slug.into(),
            fields,
        }
    }
}

/// Per-field access predicates. `None` means unrestricted.
#[derive(Clone, Default)]
pub struct FieldAccess {
    pub create: Option<Arc<dyn AccessPredicate>>,
    pub read: Option<Arc<dyn AccessPredicate>>,
    pub update: Option<Arc<dyn AccessPredicate>>,
}

impl FieldAccess {
    pub fn for_operation(&self, operation: Operation) -> Option<&Arc<dyn AccessPredicate>> {
        match operation {
            Operation::Create => self.create.as_ref(),
            Operation::Read => self.read.as_ref(),
            Operation::Update => self.update.as_ref(),
            Operation::Delete => None,
        }
    }
}

/// Visibility predicate over `(data, sibling_data)`.
pub trait Condition: Send + Sync {
    fn evaluate(&self, data: &Value, sibling_data: &Value) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&Value, &Value) -> bool + Send + Sync,
{
    fn evaluate(&self, data: &Value, sibling_data: &Value) -> bool {
        self(data, sibling_data)
    }
}

#[derive(Clone, Default)]
pub struct FieldAdmin {
    pub condition: Option<Arc<dyn Condition>>,
}

/// Field-level hooks, one ordered list per stage.
#[derive(Clone, Default)]
pub struct FieldHooks {
    pub before_validate: Vec<Arc<dyn FieldHook>>,
    pub before_change: Vec<Arc<dyn FieldHook>>,
    pub after_change: Vec<Arc<dyn FieldHook>>,
    pub after_read: Vec<Arc<dyn FieldHook>>,
}

impl FieldHooks {
    pub fn for_stage(&self, stage: Stage) -> &[Arc<dyn FieldHook>] {
        match stage {
            Stage::BeforeValidate => &self.before_validate,
            Stage::BeforeChange => &self.before_change,
            Stage::AfterChange => &self.after_change,
            Stage::AfterRead => &self.after_read,
        }
    }

    fn for_stage_mut(&mut self, stage: Stage) -> &mut Vec<Arc<dyn FieldHook>> {
        match stage {
            Stage::BeforeValidate => &mut self.before_validate,
            Stage::BeforeChange => &mut self.before_change,
            Stage::AfterChange => &mut self.after_change,
            Stage::AfterRead => &mut self.after_read,
        }
    }
}

// ── Constructors ─────────────────────────────────────────────────

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::unnamed(kind)
        }
    }

    fn unnamed(kind: FieldKind) -> Self {
        Self {
            name: None,
            kind,
            required: false,
            unique: false,
            index: false,
            localized: false,
            hidden: false,
            default_value: None,
            access: FieldAccess::default(),
            admin: FieldAdmin::default(),
            validate: None,
            hooks: FieldHooks::default(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text { min_length: None, max_length: None })
    }

    pub fn textarea(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Textarea { min_length: None, max_length: None })
    }

    pub fn email(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Email)
    }

    pub fn code(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Code)
    }

    pub fn rich_text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::RichText)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number { min: None, max: None })
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Checkbox)
    }

    pub fn radio(name: impl Into<String>, options: &[&str]) -> Self {
        Self::new(
            name,
            FieldKind::Radio { options: options.iter().map(|o| (*o).into()).collect() },
        )
    }

    pub fn select(name: impl Into<String>, options: &[&str]) -> Self {
        Self::new(
            name,
            FieldKind::Select {
                options: options.iter().map(|o| (*o).into()).collect(),
                has_many: false,
            },
        )
    }

    pub fn upload(name: impl Into<String>, relation_to: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Upload { relation_to: relation_to.into() })
    }

    pub fn relationship(name: impl Into<String>, relation_to: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Relationship {
                relation_to: RelationTo::One(relation_to.into()),
                has_many: false,
            },
        )
    }

    /// A relationship whose stored value is a `{relationTo, value}` pointer.
    pub fn polymorphic_relationship(name: impl Into<String>, relation_to: &[&str]) -> Self {
        Self::new(
            name,
            FieldKind::Relationship {
                relation_to: RelationTo::Many(relation_to.iter().map(|s| s.to_string()).collect()),
                has_many: false,
            },
        )
    }

    pub fn group(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::new(name, FieldKind::Group { fields })
    }

    /// A group without a name; its children live in the parent namespace.
    pub fn anonymous_group(fields: Vec<Field>) -> Self {
        Self::unnamed(FieldKind::Group { fields })
    }

    pub fn array(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::new(name, FieldKind::Array { fields, min_rows: None, max_rows: None })
    }

    pub fn blocks(name: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self::new(name, FieldKind::Blocks { blocks, min_rows: None, max_rows: None })
    }

    pub fn row(fields: Vec<Field>) -> Self {
        Self::unnamed(FieldKind::Row { fields })
    }

    // ── Chainable settings ───────────────────────────────────────

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets `has_many` on `select` and `relationship` fields; no-op elsewhere.
    pub fn has_many(mut self) -> Self {
        match &mut self.kind {
            FieldKind::Select { has_many, .. } | FieldKind::Relationship { has_many, .. } => {
                *has_many = true;
            }
            _ => {}
        }
        self
    }

    /// Sets `min_rows`/`max_rows` on `array` and `blocks` fields.
    pub fn rows(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        match &mut self.kind {
            FieldKind::Array { min_rows, max_rows, .. }
            | FieldKind::Blocks { min_rows, max_rows, .. } => {
                *min_rows = min;
                *max_rows = max;
            }
            _ => {}
        }
        self
    }

    /// Sets `min_length`/`max_length` on `text` and `textarea` fields.
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        match &mut self.kind {
            FieldKind::Text { min_length, max_length }
            | FieldKind::Textarea { min_length, max_length } => {
                *min_length = min;
                *max_length = max;
            }
            _ => {}
        }
        self
    }

    /// Sets `min`/`max` on `number` fields.
    pub fn range(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        if let FieldKind::Number { min, max } = &mut self.kind {
            *min = lower;
            *max = upper;
        }
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validate = Some(validator);
        self
    }

    pub fn with_condition(mut self, condition: impl Condition + 'static) -> Self {
        self.admin.condition = Some(Arc::new(condition));
        self
    }

    pub fn with_create_access(mut self, predicate: Arc<dyn AccessPredicate>) -> Self {
        self.access.create = Some(predicate);
        self
    }

    pub fn with_read_access(mut self, predicate: Arc<dyn AccessPredicate>) -> Self {
        self.access.read = Some(predicate);
        self
    }

    pub fn with_update_access(mut self, predicate: Arc<dyn AccessPredicate>) -> Self {
        self.access.update = Some(predicate);
        self
    }

    pub fn with_hook(mut self, stage: Stage, hook: Arc<dyn FieldHook>) -> Self {
        self.hooks.for_stage_mut(stage).push(hook);
        self
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `row` and anonymous `group` contribute their children to the parent
    /// namespace instead of owning a key.
    pub fn is_transparent(&self) -> bool {
        match self.kind {
            FieldKind::Row { .. } => true,
            FieldKind::Group { .. } => self.name.is_none(),
            _ => false,
        }
    }

    /// Direct children of structural kinds (`group`, `array`, `row`).
    pub fn sub_fields(&self) -> Option<&[Field]> {
        match &self.kind {
            FieldKind::Group { fields }
            | FieldKind::Array { fields, .. }
            | FieldKind::Row { fields } => Some(fields),
            _ => None,
        }
    }

    /// Whether the field's presence can be guaranteed at validation time.
    ///
    /// Localized, create-gated and conditionally visible fields may be
    /// legitimately absent, so they forfeit `required` in storage.
    pub fn is_unconditionally_required(&self) -> bool {
        self.required
            && !self.localized
            && self.admin.condition.is_none()
            && self.access.create.is_none()
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("localized", &self.localized)
            .field("hidden", &self.hidden)
            .field("default_value", &self.default_value)
            .finish_non_exhaustive()
    }
}
