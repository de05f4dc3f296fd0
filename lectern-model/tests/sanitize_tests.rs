use lectern_model::{
    sanitize_fields, Block, CollectionConfig, Field, FieldKind, GlobalConfig, ModelError,
};

// ── Sibling names ────────────────────────────────────────────────

#[test]
fn unique_siblings_pass() {
    let fields = vec![Field::text("title"), Field::number("views")];
    assert!(sanitize_fields(&fields).is_ok());
}

#[test]
fn duplicate_siblings_fail() {
    let fields = vec![Field::text("title"), Field::textarea("title")];
    match sanitize_fields(&fields) {
        Err(ModelError::DuplicateFieldName { path }) => assert_eq!(path, "title"),
        other => panic!("Expected DuplicateFieldName, got {other:?}"),
    }
}

#[test]
fn duplicate_across_row_boundary_fails() {
    let fields = vec![
        Field::text("title"),
        Field::row(vec![Field::text("subtitle"), Field::text("title")]),
    ];
    assert!(matches!(
        sanitize_fields(&fields),
        Err(ModelError::DuplicateFieldName { .. })
    ));
}

#[test]
fn duplicate_across_anonymous_group_fails() {
    let fields = vec![
        Field::anonymous_group(vec![Field::text("a")]),
        Field::text("a"),
    ];
    assert!(sanitize_fields(&fields).is_err());
}

#[test]
fn same_name_in_different_groups_passes() {
    let fields = vec![
        Field::group("seo", vec![Field::text("title")]),
        Field::group("social", vec![Field::text("title")]),
        Field::text("title"),
    ];
    assert!(sanitize_fields(&fields).is_ok());
}

#[test]
fn duplicate_inside_group_reports_nested_path() {
    let fields = vec![Field::group("seo", vec![Field::text("t"), Field::text("t")])];
    match sanitize_fields(&fields) {
        Err(ModelError::DuplicateFieldName { path }) => assert_eq!(path, "seo.t"),
        other => panic!("Expected DuplicateFieldName, got {other:?}"),
    }
}

#[test]
fn unnamed_data_field_fails() {
    let mut field = Field::text("x");
    field.name = None;
    assert!(matches!(
        sanitize_fields(&[field]),
        Err(ModelError::MissingFieldName { .. })
    ));
}

// ── Blocks ───────────────────────────────────────────────────────

#[test]
fn duplicate_block_slugs_fail() {
    let fields = vec![Field::blocks(
        "layout",
        vec![
            Block::new("hero", vec![Field::text("heading")]),
            Block::new("hero", vec![Field::text("title")]),
        ],
    )];
    match sanitize_fields(&fields) {
        Err(ModelError::DuplicateBlockSlug { slug, path }) => {
            assert_eq!(slug, "hero");
            assert_eq!(path, "layout");
        }
        other => panic!("Expected DuplicateBlockSlug, got {other:?}"),
    }
}

#[test]
fn block_fields_are_checked() {
    let fields = vec![Field::blocks(
        "layout",
        vec![Block::new("hero", vec![Field::text("a"), Field::text("a")])],
    )];
    match sanitize_fields(&fields) {
        Err(ModelError::DuplicateFieldName { path }) => assert_eq!(path, "layout.hero.a"),
        other => panic!("Expected DuplicateFieldName, got {other:?}"),
    }
}

// ── Options and targets ──────────────────────────────────────────

#[test]
fn empty_select_options_fail() {
    let fields = vec![Field::select("status", &[])];
    assert!(matches!(sanitize_fields(&fields), Err(ModelError::EmptyOptions { .. })));
}

#[test]
fn empty_relation_target_fails() {
    let fields = vec![Field::new(
        "link",
        FieldKind::Relationship {
            relation_to: lectern_model::RelationTo::Many(vec![]),
            has_many: false,
        },
    )];
    assert!(matches!(
        sanitize_fields(&fields),
        Err(ModelError::MissingRelationTarget { .. })
    ));
}

// ── Entity slugs ─────────────────────────────────────────────────

#[test]
fn collection_slug_must_be_url_safe() {
    assert!(CollectionConfig::new("blog-posts", vec![]).sanitize().is_ok());
    assert!(matches!(
        CollectionConfig::new("blog posts", vec![]).sanitize(),
        Err(ModelError::InvalidSlug(_))
    ));
    assert!(GlobalConfig::new("", vec![]).sanitize().is_err());
}
