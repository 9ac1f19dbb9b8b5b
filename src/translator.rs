//! Key translator: recursive canonical → localized renaming of CV document keys.
//!
//! The translator walks an arbitrary JSON tree and renames object keys using
//! the [`KeyMapping`] table, leaving every value untouched. Structural labels
//! inside the "skills" subtree (category and subcategory names) are free-form
//! user text and are never translated; skill item fields below them are
//! ordinary canonical keys.
//!
//! Because several canonical keys can share one localized label, the
//! translator detects collisions per output object and resolves them
//! according to a [`CollisionPolicy`].

use crate::i18n::{KeyMapping, Language};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// What to do when two distinct keys translate to the same localized label
/// within one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Abort the whole translation, reporting every colliding key.
    Error,
    /// Disambiguate by appending `_2`, `_3`, … until unique.
    Suffix,
    /// Keep the first key (in document order), drop later ones with a warning.
    KeepFirst,
}

impl FromStr for CollisionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(CollisionPolicy::Error),
            "suffix" => Ok(CollisionPolicy::Suffix),
            "keep-first" => Ok(CollisionPolicy::KeepFirst),
            other => anyhow::bail!(
                "Unknown collision policy '{}' (expected error, suffix or keep-first)",
                other
            ),
        }
    }
}

/// Typed translation failure.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// Two or more keys in one object translated to the same label under the
    /// `Error` policy.
    #[error("keys {original_keys:?} at {path} all translate to '{target_key}'")]
    KeyCollision {
        /// The shared localized label.
        target_key: String,
        /// Every original key that produced it, in document order.
        original_keys: Vec<String>,
        /// JSON path of the object containing the collision.
        path: String,
    },
}

/// Explicit recursion context threaded through the tree walk.
///
/// `skills_depth` is the depth of the keys of the object currently being
/// processed, relative to the skills root: the direct children of the
/// "skills" value are depth 1 (categories), their children depth 2
/// (subcategories), and item fields depth 3 and beyond.
#[derive(Debug, Clone)]
pub struct WalkContext {
    in_skills: bool,
    skills_depth: u32,
    path: String,
}

impl WalkContext {
    /// Context for the document root.
    pub fn root() -> Self {
        Self {
            in_skills: false,
            skills_depth: 0,
            path: "$".to_string(),
        }
    }

    /// Whether keys of the current object may be translated.
    ///
    /// Category (depth 1) and subcategory (depth 2) labels under the skills
    /// root are user text; everything else follows the normal lookup rule.
    pub fn is_translatable(&self) -> bool {
        !(self.in_skills && (1..=2).contains(&self.skills_depth))
    }

    /// Context for the value stored under `key` in the current object.
    ///
    /// Entering the subtree of a key literally named "skills" switches skills
    /// mode on; inside it the depth grows by one per object level. A key
    /// named "skills" that is itself a category or subcategory label does not
    /// start a new subtree.
    fn child(&self, key: &str) -> Self {
        let entering = !self.in_skills && key == "skills";
        Self {
            in_skills: self.in_skills || entering,
            skills_depth: if entering {
                1
            } else if self.in_skills {
                self.skills_depth + 1
            } else {
                0
            },
            path: format!("{}.{}", self.path, key),
        }
    }

    /// Context for the `index`-th element of an array: same translation
    /// context, index recorded for diagnostics only.
    fn element(&self, index: usize) -> Self {
        Self {
            in_skills: self.in_skills,
            skills_depth: self.skills_depth,
            path: format!("{}[{}]", self.path, index),
        }
    }
}

/// Translate every object key in `doc` into `target`'s localized form.
///
/// Values are never modified; keys without a non-empty mapping for `target`
/// pass through unchanged. Object key order is preserved from the input,
/// which makes collision handling deterministic: the "first" key of a
/// colliding group is the first in document order.
pub fn translate(
    doc: &Value,
    target: Language,
    mapping: &KeyMapping,
    policy: CollisionPolicy,
) -> Result<Value, TranslateError> {
    walk(doc, target, mapping, policy, &WalkContext::root())
}

fn walk(
    value: &Value,
    target: Language,
    mapping: &KeyMapping,
    policy: CollisionPolicy,
    ctx: &WalkContext,
) -> Result<Value, TranslateError> {
    match value {
        Value::Object(obj) => walk_object(obj, target, mapping, policy, ctx),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(walk(item, target, mapping, policy, &ctx.element(i))?);
            }
            Ok(Value::Array(out))
        }
        // Scalars are leaf values and are returned as-is.
        scalar => Ok(scalar.clone()),
    }
}

fn walk_object(
    obj: &Map<String, Value>,
    target: Language,
    mapping: &KeyMapping,
    policy: CollisionPolicy,
    ctx: &WalkContext,
) -> Result<Value, TranslateError> {
    let translatable = ctx.is_translatable();

    // Resolve every key first so the Error policy can report the full set of
    // colliding originals, not just the first pair.
    let resolved: Vec<(&String, String)> = obj
        .keys()
        .map(|key| {
            let translated = if translatable {
                mapping
                    .localized(key, target)
                    .map(|label| label.to_string())
                    .unwrap_or_else(|| key.clone())
            } else {
                key.clone()
            };
            (key, translated)
        })
        .collect();

    if policy == CollisionPolicy::Error {
        if let Some((target_key, originals)) = first_collision(&resolved) {
            return Err(TranslateError::KeyCollision {
                target_key,
                original_keys: originals,
                path: ctx.path.clone(),
            });
        }
    }

    let mut out = Map::with_capacity(obj.len());
    for (key, translated) in resolved {
        let mut name = translated;
        if out.contains_key(&name) {
            match policy {
                // Pre-checked above.
                CollisionPolicy::Error => unreachable!("collision escaped pre-check"),
                CollisionPolicy::Suffix => {
                    let base = name.clone();
                    let mut n = 2;
                    while out.contains_key(&name) {
                        name = format!("{}_{}", base, n);
                        n += 1;
                    }
                }
                CollisionPolicy::KeepFirst => {
                    warn!(
                        "Dropping key '{}' at {}: translated name '{}' already taken",
                        key, ctx.path, name
                    );
                    continue;
                }
            }
        }

        let child = walk(&obj[key], target, mapping, policy, &ctx.child(key))?;
        out.insert(name, child);
    }

    Ok(Value::Object(out))
}

/// Find the first (in document order) translated key shared by two or more
/// originals, returning it together with all of its originals.
fn first_collision(resolved: &[(&String, String)]) -> Option<(String, Vec<String>)> {
    for (i, (_, candidate)) in resolved.iter().enumerate() {
        let originals: Vec<String> = resolved
            .iter()
            .filter(|(_, t)| t == candidate)
            .map(|(orig, _)| (*orig).clone())
            .collect();
        if originals.len() > 1 {
            // Only report the group led by its first member.
            if resolved[..i].iter().all(|(_, t)| t != candidate) {
                return Some((candidate.clone(), originals));
            }
        }
    }
    None
}
