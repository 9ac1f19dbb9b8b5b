//! Filename language detection.
//!
//! Per-language resume files carry a language suffix in their stem:
//! `resume-de.json` or `resume_fa.json`. A stem without a recognized suffix is
//! treated as the canonical language (English).

use crate::i18n::{Language, LanguageRegistry};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

static SUFFIX_REGEX: OnceLock<Regex> = OnceLock::new();

/// Detect the language of a resume file from its filename.
///
/// A stem ending in `-<code>` or `_<code>` with a 2–3 letter lowercase code
/// names that language. Suffixes that are not enabled language codes are
/// treated as part of the stem (e.g. `resume-v2.json` is English), as is the
/// absence of any suffix.
pub fn language_from_filename(path: impl AsRef<Path>) -> Language {
    let stem = path
        .as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let regex = SUFFIX_REGEX.get_or_init(|| Regex::new(r"[-_]([a-z]{2,3})$").unwrap());

    if let Some(caps) = regex.captures(stem) {
        let code = &caps[1];
        if LanguageRegistry::get().is_enabled(code) {
            // from_code cannot fail for an enabled code
            return Language::from_code(code).unwrap_or_else(|_| Language::canonical());
        }
    }

    Language::canonical()
}

/// Strip a recognized language suffix from a filename stem.
///
/// `resume-de` becomes `resume`; stems without a recognized suffix are
/// returned unchanged.
pub fn strip_language_suffix(stem: &str) -> &str {
    let regex = SUFFIX_REGEX.get_or_init(|| Regex::new(r"[-_]([a-z]{2,3})$").unwrap());

    if let Some(caps) = regex.captures(stem) {
        if LanguageRegistry::get().is_enabled(&caps[1]) {
            return &stem[..caps.get(0).unwrap().start()];
        }
    }
    stem
}
