//! Integration tests for the cv-sync pipeline.
//!
//! These tests verify the interaction between the key translator, the mapping
//! table, and the sync engine over a real (temporary) SQLite database.

use cv_sync::db::Database;
use cv_sync::i18n::{language_from_filename, KeyMapping, Language};
use cv_sync::sync::SyncEngine;
use cv_sync::translator::{translate, CollisionPolicy};
use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

// ==================== Test Helpers ====================

/// Write a mapping file into a temp dir and load it back
fn load_mapping(temp_dir: &TempDir) -> KeyMapping {
    let path = temp_dir.path().join("key_mappings.json");
    let mapping = json!({
        "fname": {"en": "fname", "de": "Vorname", "fa": "نام"},
        "lname": {"en": "lname", "de": "Nachname", "fa": "نام خانوادگی"},
        "email": {"en": "email", "de": "E-Mail", "fa": "ایمیل"},
        "education": {"en": "education", "de": "Ausbildung", "fa": "تحصیلات"},
        "short_name": {"en": "short_name", "de": "Kurzname", "fa": ""}
    });
    std::fs::write(&path, serde_json::to_string_pretty(&mapping).unwrap()).expect("write mapping");
    KeyMapping::load(&path).expect("load mapping")
}

/// A database seeded with one resume in two languages
fn seeded_db(temp_dir: &TempDir) -> Database {
    let path = temp_dir.path().join("cv.db");
    let db = Database::new(path.to_str().unwrap()).expect("open db");

    db.upsert_resume_set("jane", "en").unwrap();
    db.upsert_version("jane", "en", true, true).unwrap();
    db.upsert_version("jane", "de", false, false).unwrap();
    db.insert_person("jane", "en", 1, "Jane", "Doe", "jane@example.com", "1990-01-01")
        .unwrap();
    db.insert_person("jane", "de", 1, "Jane", "Doe", "jane@example.com", "1990-01-01")
        .unwrap();
    db.insert_education_item("jane", "en", 1, "MIT", "BSc", "2010", "2014", Some(3.7))
        .unwrap();
    db.insert_education_item("jane", "de", 1, "MIT", "Bachelor", "2010", "2014", Some(3.7))
        .unwrap();
    db
}

// ==================== File-to-File Translation Tests ====================

#[test]
fn test_translate_resume_file_roundtrip() {
    let temp_dir = TempDir::new().expect("temp dir");
    let mapping = load_mapping(&temp_dir);

    let source = json!({
        "fname": "Ramin",
        "lname": "Azarmehr",
        "education": [{"short_name": "BSc"}],
        "skills": {"Tech": {"Langs": [{"short_name": "Python"}]}}
    });
    let input = temp_dir.path().join("ramin.json");
    std::fs::write(&input, serde_json::to_string(&source).unwrap()).expect("write resume");

    // Detect language, translate, write, read back
    let source_lang = language_from_filename(&input);
    assert_eq!(source_lang, Language::ENGLISH);

    let doc: Value = serde_json::from_str(&std::fs::read_to_string(&input).unwrap()).unwrap();
    let german = translate(&doc, Language::GERMAN, &mapping, CollisionPolicy::Error).unwrap();

    let output = temp_dir.path().join("ramin-de.json");
    std::fs::write(&output, serde_json::to_string_pretty(&german).unwrap()).expect("write output");

    let restored: Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        restored,
        json!({
            "Vorname": "Ramin",
            "Nachname": "Azarmehr",
            "Ausbildung": [{"Kurzname": "BSc"}],
            "skills": {"Tech": {"Langs": [{"Kurzname": "Python"}]}}
        })
    );
    assert_eq!(language_from_filename(&output), Language::GERMAN);
}

#[test]
fn test_translate_to_persian_keeps_unfilled_labels() {
    let temp_dir = TempDir::new().expect("temp dir");
    let mapping = load_mapping(&temp_dir);

    // short_name has an empty Persian label, so the key must pass through
    let doc = json!({"fname": "رامین", "short_name": "R"});
    let persian = translate(&doc, Language::PERSIAN, &mapping, CollisionPolicy::Error).unwrap();
    assert_eq!(persian, json!({"نام": "رامین", "short_name": "R"}));
}

#[test]
fn test_canonicalize_translated_keys() {
    let temp_dir = TempDir::new().expect("temp dir");
    let mapping = load_mapping(&temp_dir);

    assert_eq!(mapping.canonicalize_tag("Ausbildung"), "education");
    assert_eq!(mapping.canonicalize_tag("نام"), "fname");
    assert_eq!(mapping.canonicalize_tag("selfmade-tag"), "selfmade-tag");
}

// ==================== Sync Engine Integration Tests ====================

#[test]
fn test_sync_round_trip_no_conflicts() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db = seeded_db(&temp_dir);
    let engine = SyncEngine::new(db).expect("engine");

    for (entity_type, field, value) in [
        ("persons", "email", json!("updated@example.com")),
        ("persons", "birth_date", json!("1990-02-02")),
        ("education_items", "start_date", json!("2011")),
        ("education_items", "end_date", json!("2015")),
        ("education_items", "gpa", json!(3.9)),
    ] {
        let result = engine
            .sync_invariant_field("jane", entity_type, 1, field, &value, Language::ENGLISH)
            .unwrap();
        assert!(result.success, "sync failed for {}.{}", entity_type, field);
        assert_eq!(result.affected_langs, vec!["de", "en"]);
    }

    assert!(engine.detect_conflicts("jane").unwrap().is_empty());
}

#[test]
fn test_conflict_surfaces_after_external_divergence() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db = seeded_db(&temp_dir);

    // An out-of-band edit changes only the German row
    db.update_field_one_lang("persons", "birth_date", "jane", "de", 1, &json!("1991-01-01"))
        .unwrap();

    let engine = SyncEngine::new(db).expect("engine");
    let conflicts = engine.detect_conflicts("jane").unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].field_name, "birth_date");
    assert_eq!(
        conflicts[0].values_by_lang.get("de"),
        Some(&json!("1991-01-01"))
    );
    assert_eq!(
        conflicts[0].values_by_lang.get("en"),
        Some(&json!("1990-01-01"))
    );

    // Re-syncing resolves the divergence
    let result = engine
        .sync_invariant_field(
            "jane",
            "persons",
            1,
            "birth_date",
            &json!("1990-01-01"),
            Language::ENGLISH,
        )
        .unwrap();
    assert!(result.success);
    assert!(engine.detect_conflicts("jane").unwrap().is_empty());
}

#[test]
fn test_non_invariant_field_rejected_end_to_end() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db = seeded_db(&temp_dir);
    let engine = SyncEngine::new(db.clone()).expect("engine");

    let result = engine
        .sync_invariant_field(
            "jane",
            "education_items",
            1,
            "institution",
            &json!("ETH"),
            Language::GERMAN,
        )
        .unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("not an invariant field"));

    // The per-language institution names are untouched
    let rows = db
        .read_field_by_lang("education_items", "institution", "jane", 1)
        .unwrap();
    assert!(rows.iter().all(|(_, v)| v == &json!("MIT")));
}

#[test]
fn test_variant_status_for_ghost_resume() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db = seeded_db(&temp_dir);
    let engine = SyncEngine::new(db).expect("engine");

    let status = engine.get_variant_status("ghost").unwrap();
    assert!(status.existing_langs.is_empty());
    assert_eq!(status.missing_langs, vec!["en", "de", "fa"]);
    assert_eq!(status.base_lang, None);
}

#[test]
fn test_database_persists_across_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("cv.db");
    {
        let db = Database::new(path.to_str().unwrap()).unwrap();
        db.upsert_resume_set("adam", "en").unwrap();
        db.upsert_version("adam", "en", true, false).unwrap();
    }

    let db = Database::new(path.to_str().unwrap()).unwrap();
    assert!(db.resume_exists("adam").unwrap());
    assert_eq!(db.version_langs("adam").unwrap(), vec!["en"]);
}

// ==================== Property Tests ====================

/// Strategy for arbitrary JSON documents with keys drawn from a mix of
/// mapped and unmapped names.
fn arb_document() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 @.-]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 24, 4, |inner| {
        let key = prop_oneof![
            Just("fname".to_string()),
            Just("lname".to_string()),
            Just("email".to_string()),
            Just("skills".to_string()),
            "[a-z_]{1,8}",
        ];
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((key, inner), 0..4).prop_map(|pairs| {
                let mut obj = serde_json::Map::new();
                for (k, v) in pairs {
                    obj.insert(k, v);
                }
                Value::Object(obj)
            }),
        ]
    })
}

/// Collect every leaf scalar of a document, in tree order.
fn leaf_values(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Object(obj) => {
            for v in obj.values() {
                leaf_values(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                leaf_values(v, out);
            }
        }
        scalar => out.push(scalar.clone()),
    }
}

proptest! {
    /// Translating with an empty mapping table renames nothing.
    #[test]
    fn prop_empty_mapping_is_identity(doc in arb_document()) {
        let mapping = KeyMapping::from_value(&json!({})).unwrap();
        let out = translate(&doc, Language::GERMAN, &mapping, CollisionPolicy::Error).unwrap();
        prop_assert_eq!(out, doc);
    }

    /// Under the suffix policy no value is ever lost and every leaf scalar
    /// survives unchanged, in order.
    #[test]
    fn prop_values_preserved(doc in arb_document()) {
        let mapping = KeyMapping::from_value(&json!({
            "fname": {"de": "Vorname"},
            "lname": {"de": "Nachname"},
            "email": {"de": "E-Mail"}
        })).unwrap();

        let out = translate(&doc, Language::GERMAN, &mapping, CollisionPolicy::Suffix).unwrap();

        let mut before = Vec::new();
        let mut after = Vec::new();
        leaf_values(&doc, &mut before);
        leaf_values(&out, &mut after);
        prop_assert_eq!(before, after);
    }

    /// Translation is deterministic: two runs agree exactly.
    #[test]
    fn prop_translation_deterministic(doc in arb_document()) {
        let mapping = KeyMapping::from_value(&json!({
            "fname": {"de": "Vorname"},
            "email": {"de": "E-Mail"}
        })).unwrap();

        let a = translate(&doc, Language::GERMAN, &mapping, CollisionPolicy::Suffix).unwrap();
        let b = translate(&doc, Language::GERMAN, &mapping, CollisionPolicy::Suffix).unwrap();
        prop_assert_eq!(a, b);
    }
}
