//! cv-sync: localized multi-variant CV pipeline.
//!
//! Two cooperating components over a shared notion of canonical (English)
//! versus localized field keys:
//!
//! - the key translator ([`translator`]) renames JSON object keys of a resume
//!   document into a target language, leaving values untouched;
//! - the sync engine ([`sync`]) keeps declared invariant fields (dates,
//!   emails, GPAs) equal across all language variants stored in the SQLite
//!   store, and reports divergence as conflicts.

pub mod config;
pub mod db;
pub mod i18n;
pub mod sync;
pub mod translator;
