//! Canonical key mapping table.
//!
//! The mapping file is a JSON object: each key is a canonical field name, each
//! value maps lowercase language codes to localized labels. Loaded once at
//! startup, the table is immutable afterwards and passed by reference into the
//! translator; there is no hidden global cache.
//!
//! ```json
//! {"fname": {"en": "fname", "de": "Vorname", "fa": "نام"}}
//! ```

use crate::i18n::Language;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Forward and reverse lookup over canonical CV field keys.
#[derive(Debug, Clone, Default)]
pub struct KeyMapping {
    /// canonical key -> (language code -> localized label)
    forward: HashMap<String, HashMap<String, String>>,

    /// lowercased localized label -> canonical key
    reverse: HashMap<String, String>,
}

impl KeyMapping {
    /// Load the mapping table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapping file {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Mapping file {} is not valid JSON", path.display()))?;
        Self::from_value(&value)
    }

    /// Build the mapping table from an in-memory JSON value.
    ///
    /// The top level must be an object. Entries whose value is not an object,
    /// or whose per-language labels are not strings, are skipped with a
    /// warning and behave as "no translation" (the canonical key passes
    /// through unchanged).
    pub fn from_value(value: &Value) -> Result<Self> {
        let top = value
            .as_object()
            .context("Mapping root must be a JSON object")?;

        let mut forward: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (canonical, langs) in top {
            let Some(langs) = langs.as_object() else {
                warn!(
                    "Skipping malformed mapping entry '{}': value is not an object",
                    canonical
                );
                continue;
            };

            let mut per_lang = HashMap::new();
            for (code, label) in langs {
                match label.as_str() {
                    Some(label) => {
                        per_lang.insert(code.clone(), label.to_string());
                    }
                    None => warn!(
                        "Skipping non-string label for key '{}', language '{}'",
                        canonical, code
                    ),
                }
            }
            forward.insert(canonical.clone(), per_lang);
        }

        let mut mapping = Self {
            forward,
            reverse: HashMap::new(),
        };
        mapping.rebuild_reverse();
        Ok(mapping)
    }

    /// Look up the localized label for a canonical key.
    ///
    /// Returns `None` when the key is unmapped or the label for this language
    /// is missing or empty — the caller keeps the key unchanged in that case.
    pub fn localized(&self, key: &str, target: Language) -> Option<&str> {
        self.forward
            .get(key)
            .and_then(|langs| langs.get(target.code()))
            .map(|label| label.as_str())
            .filter(|label| !label.is_empty())
    }

    /// Reverse lookup: canonical key for a possibly-localized label.
    ///
    /// Matching is case-insensitive. Returns `None` for labels not present in
    /// the table (user-defined extensions).
    pub fn canonical_for(&self, label: &str) -> Option<&str> {
        self.reverse
            .get(&label.to_lowercase())
            .map(|key| key.as_str())
    }

    /// Convert a possibly-localized tag back to its canonical form.
    ///
    /// Unrecognized tags pass through unchanged; they are user extensions,
    /// not errors.
    pub fn canonicalize_tag<'a>(&'a self, tag: &'a str) -> &'a str {
        self.canonical_for(tag).unwrap_or(tag)
    }

    /// Rebuild the reverse (localized → canonical) index from the forward
    /// table. Exposed so tests can verify the index after mutation-free
    /// reconstruction.
    pub fn rebuild_reverse(&mut self) {
        self.reverse.clear();
        for (canonical, langs) in &self.forward {
            // The canonical key itself also resolves to itself.
            self.reverse
                .insert(canonical.to_lowercase(), canonical.clone());
            for label in langs.values() {
                if !label.is_empty() {
                    self.reverse.insert(label.to_lowercase(), canonical.clone());
                }
            }
        }
    }

    /// Number of canonical keys in the table.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
