use lectern_model::{CollectionConfig, EntityAccess, Field, GlobalConfig, UploadConfig};
use lectern_types::{IdType, Operation};

// ── Custom ids ───────────────────────────────────────────────────

#[test]
fn no_custom_id_by_default() {
    let c = CollectionConfig::new("posts", vec![Field::text("title")]);
    assert_eq!(c.custom_id_type(), None);
    assert_eq!(c.id_type(), IdType::Opaque);
}

#[test]
fn numeric_id_field_implies_numeric_ids() {
    let c = CollectionConfig::new("orders", vec![Field::number("id"), Field::text("sku")]);
    assert_eq!(c.custom_id_type(), Some(IdType::Number));
}

#[test]
fn text_id_field_implies_text_ids() {
    let c = CollectionConfig::new("pages", vec![Field::text("id")]);
    assert_eq!(c.custom_id_type(), Some(IdType::Text));
}

#[test]
fn explicit_id_type_wins() {
    let c = CollectionConfig::new("pages", vec![Field::text("id")]).with_id_type(IdType::Number);
    assert_eq!(c.id_type(), IdType::Number);
}

// ── Defaults ─────────────────────────────────────────────────────

#[test]
fn collections_default_to_timestamps() {
    assert!(CollectionConfig::new("posts", vec![]).timestamps);
    assert!(!CollectionConfig::new("posts", vec![]).with_timestamps(false).timestamps);
}

#[test]
fn deserialized_collection_defaults_timestamps() {
    let c: CollectionConfig =
        serde_json::from_str(r#"{"slug":"posts","fields":[{"name":"t","type":"text"}]}"#).unwrap();
    assert!(c.timestamps);
    assert!(c.access.read.is_none());
    assert!(c.hooks.before_change.is_empty());
}

#[test]
fn public_access_covers_every_operation() {
    let access = EntityAccess::public();
    for op in [Operation::Create, Operation::Read, Operation::Update, Operation::Delete] {
        assert!(access.for_operation(op).is_some());
    }
    assert!(EntityAccess::default().for_operation(Operation::Read).is_none());
}

#[test]
fn global_config_builder() {
    let g = GlobalConfig::new("settings", vec![Field::text("site_name")])
        .with_access(EntityAccess::public());
    assert_eq!(g.slug, "settings");
    assert!(g.access.update.is_some());
}

// ── Uploads ──────────────────────────────────────────────────────

#[test]
fn upload_mime_matching() {
    let any = UploadConfig::default();
    assert!(any.accepts("application/pdf"));

    let images = UploadConfig { mime_types: vec!["image/*".into(), "application/pdf".into()] };
    assert!(images.accepts("image/png"));
    assert!(images.accepts("application/pdf"));
    assert!(!images.accepts("text/plain"));
}
