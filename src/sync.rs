//! Sync engine: keeps invariant fields equal across all language variants of
//! a resume and detects when they have silently diverged.
//!
//! Invariant fields (dates, emails, GPAs) must hold the same value in every
//! language version of a resume, unlike translatable fields (institution
//! names, role descriptions) which legitimately differ per language. The set
//! of invariant fields per entity table is declared once in
//! [`InvariantFields`] and validated against the actual schema at engine
//! construction, so a misconfigured field name fails at startup rather than
//! on first write.
//!
//! Each sync invocation runs validate → apply strictly in order: any
//! validation failure produces a negative [`SyncResult`] and performs no
//! writes; the apply step is one database transaction across every language
//! row of the entity.

use crate::db::Database;
use crate::i18n::{Language, LanguageRegistry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Declared invariant fields per entity table.
///
/// Constructed once and handed to the engine; fields not listed here are
/// never synchronized (attempting to is a validation failure, not a write).
#[derive(Debug, Clone)]
pub struct InvariantFields {
    fields: BTreeMap<&'static str, BTreeSet<&'static str>>,
}

impl Default for InvariantFields {
    fn default() -> Self {
        let mut fields: BTreeMap<&'static str, BTreeSet<&'static str>> = BTreeMap::new();
        fields.insert("persons", BTreeSet::from(["email", "birth_date"]));
        fields.insert(
            "education_items",
            BTreeSet::from(["start_date", "end_date", "gpa"]),
        );
        fields.insert("work_items", BTreeSet::from(["start_date", "end_date"]));
        Self { fields }
    }
}

impl InvariantFields {
    /// Whether `entity_type` is a configured entity table.
    pub fn knows_entity(&self, entity_type: &str) -> bool {
        self.fields.contains_key(entity_type)
    }

    /// Whether `field` is declared invariant for `entity_type`.
    pub fn is_invariant(&self, entity_type: &str, field: &str) -> bool {
        self.fields
            .get(entity_type)
            .map(|set| set.contains(field))
            .unwrap_or(false)
    }

    /// Declared invariant fields of one entity table, in stable order.
    pub fn fields_for(&self, entity_type: &str) -> Option<&BTreeSet<&'static str>> {
        self.fields.get(entity_type)
    }

    /// Configured entity tables, in stable order.
    pub fn entity_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Verify that every configured field exists as a column of its table.
    ///
    /// Run at engine construction so configuration mistakes surface eagerly
    /// instead of on the first write.
    pub fn validate_against_schema(&self, db: &Database) -> Result<()> {
        for (table, fields) in &self.fields {
            let columns = db
                .table_columns(table)
                .with_context(|| format!("Configured entity table '{}' not in schema", table))?;
            for field in fields {
                if !columns.iter().any(|c| c == field) {
                    anyhow::bail!(
                        "Invariant field '{}' is not a column of table '{}'",
                        field,
                        table
                    );
                }
            }
        }
        Ok(())
    }
}

/// Outcome of one `sync_invariant_field` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub source_lang: String,
    /// Language codes now holding the updated value (empty on failure).
    pub affected_langs: Vec<String>,
    pub field_name: String,
    pub new_value: Value,
    /// Human-readable reason when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    fn failed(source_lang: Language, field_name: &str, new_value: &Value, reason: String) -> Self {
        Self {
            success: false,
            source_lang: source_lang.code().to_string(),
            affected_langs: Vec::new(),
            field_name: field_name.to_string(),
            new_value: new_value.clone(),
            error: Some(reason),
        }
    }
}

/// One detected divergence of an invariant field across language variants.
#[derive(Debug, Clone, Serialize)]
pub struct FieldConflict {
    pub resume_key: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub field_name: String,
    /// Every observed value, keyed by language code.
    pub values_by_lang: BTreeMap<String, Value>,
    pub detected_at: DateTime<Utc>,
}

/// Which language variants of a resume exist and which are still missing.
#[derive(Debug, Clone, Serialize)]
pub struct VariantStatus {
    pub resume_key: String,
    pub existing_langs: Vec<String>,
    pub missing_langs: Vec<String>,
    pub base_lang: Option<String>,
}

/// The sync engine itself: a database handle plus the invariant-field
/// registry.
pub struct SyncEngine {
    db: Database,
    fields: InvariantFields,
}

impl SyncEngine {
    /// Build an engine over `db`, validating the invariant-field
    /// configuration against the schema.
    pub fn new(db: Database) -> Result<Self> {
        let fields = InvariantFields::default();
        fields
            .validate_against_schema(&db)
            .context("Invariant field configuration does not match schema")?;
        Ok(Self { db, fields })
    }

    /// Write `new_value` into an invariant field across every language
    /// version of the entity.
    ///
    /// Validation runs strictly before any write: unknown entity type,
    /// non-invariant field, unknown resume/entity, or a resume without
    /// versions each yield `success = false` with a reason and zero writes.
    pub fn sync_invariant_field(
        &self,
        resume_key: &str,
        entity_type: &str,
        entity_id: i64,
        field_name: &str,
        new_value: &Value,
        source_lang: Language,
    ) -> Result<SyncResult> {
        debug!(
            "Sync requested: {}/{}#{} {} <- {}",
            resume_key, entity_type, entity_id, field_name, new_value
        );

        if !self.fields.knows_entity(entity_type) {
            return Ok(SyncResult::failed(
                source_lang,
                field_name,
                new_value,
                format!("Unknown entity type: {}", entity_type),
            ));
        }
        if !self.fields.is_invariant(entity_type, field_name) {
            return Ok(SyncResult::failed(
                source_lang,
                field_name,
                new_value,
                format!(
                    "'{}' is not an invariant field of {}",
                    field_name, entity_type
                ),
            ));
        }
        if !self.db.resume_exists(resume_key)? {
            return Ok(SyncResult::failed(
                source_lang,
                field_name,
                new_value,
                format!("Unknown resume key: {}", resume_key),
            ));
        }
        if self.db.version_langs(resume_key)?.is_empty() {
            return Ok(SyncResult::failed(
                source_lang,
                field_name,
                new_value,
                format!("Resume '{}' has no language versions", resume_key),
            ));
        }
        if !self.db.entity_exists(entity_type, resume_key, entity_id)? {
            return Ok(SyncResult::failed(
                source_lang,
                field_name,
                new_value,
                format!(
                    "No {} entity {} for resume '{}'",
                    entity_type, entity_id, resume_key
                ),
            ));
        }

        let affected_langs =
            self.db
                .update_field_all_langs(entity_type, field_name, resume_key, entity_id, new_value)?;

        info!(
            "Synced {}.{} for resume '{}' entity {} across {:?} (from {})",
            entity_type, field_name, resume_key, entity_id, affected_langs, source_lang
        );

        Ok(SyncResult {
            success: true,
            source_lang: source_lang.code().to_string(),
            affected_langs,
            field_name: field_name.to_string(),
            new_value: new_value.clone(),
            error: None,
        })
    }

    /// Detect invariant fields whose stored value differs across language
    /// variants of `resume_key`.
    ///
    /// Advisory: an unknown resume key yields an empty list, never an error.
    pub fn detect_conflicts(&self, resume_key: &str) -> Result<Vec<FieldConflict>> {
        let mut conflicts = Vec::new();

        for (&entity_type, fields) in &self.fields.fields {
            for entity_id in self.db.entity_ids(entity_type, resume_key)? {
                for &field in fields {
                    let rows =
                        self.db
                            .read_field_by_lang(entity_type, field, resume_key, entity_id)?;

                    let distinct: BTreeSet<String> = rows
                        .iter()
                        .filter(|(_, v)| !v.is_null())
                        .map(|(_, v)| v.to_string())
                        .collect();

                    if distinct.len() > 1 {
                        conflicts.push(FieldConflict {
                            resume_key: resume_key.to_string(),
                            entity_type: entity_type.to_string(),
                            entity_id,
                            field_name: field.to_string(),
                            values_by_lang: rows.into_iter().collect(),
                            detected_at: Utc::now(),
                        });
                    }
                }
            }
        }

        Ok(conflicts)
    }

    /// Report which language variants of a resume exist and which enabled
    /// languages are still missing. Unknown keys report everything missing.
    pub fn get_variant_status(&self, resume_key: &str) -> Result<VariantStatus> {
        let existing_langs = self.db.version_langs(resume_key)?;
        let base_lang = self.db.base_lang(resume_key)?;

        let missing_langs = LanguageRegistry::get()
            .list_enabled()
            .iter()
            .map(|lang| lang.code.to_string())
            .filter(|code| !existing_langs.contains(code))
            .collect();

        Ok(VariantStatus {
            resume_key: resume_key.to_string(),
            existing_langs,
            missing_langs,
            base_lang,
        })
    }
}
