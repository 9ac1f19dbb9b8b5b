//! Internationalization (i18n) module for multi-language resume support.
//!
//! This module provides a centralized, extensible architecture for managing
//! the languages a resume can be rendered in, plus the canonical key mapping
//! table the translator runs on.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for all supported languages and their metadata
//! - `language`: Type-safe Language type validated against the registry
//! - `mapping`: Canonical key ⇄ localized label table loaded from JSON
//! - `detect`: Filename-suffix language detection for per-language resume files
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::i18n::{Language, LanguageRegistry};
//!
//! // Get canonical language (English)
//! let canonical = Language::canonical();
//!
//! // Create language from code
//! let german = Language::from_code("de")?;
//!
//! // List all enabled languages
//! let languages = LanguageRegistry::get().list_enabled();
//! ```

mod detect;
mod language;
mod mapping;
mod registry;

pub use detect::{language_from_filename, strip_language_suffix};
pub use language::Language;
pub use mapping::KeyMapping;
pub use registry::{LanguageConfig, LanguageRegistry};
