//! Stable identifiers derived from natural keys.
//!
//! A natural key is normalized by lowercasing, dropping characters that are not
//! letters or digits (periods, apostrophes, commas, ...) and collapsing runs of
//! whitespace, `_` and `-` into a single `_`. Normalization is pure, so the same
//! natural key yields the same [`StableId`] in every process. Distinct keys that
//! normalize identically ("J.J. Abrams", "jj abrams") resolve to the same entity.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::{errors::MovieKgError, schema::EntityKind};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableId {
    kind: EntityKind,
    key: String,
}

impl StableId {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The normalized natural key, without the kind prefix.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.id_prefix(), self.key)
    }
}

impl Serialize for StableId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn normalize_key(raw: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for word in raw.split(|c: char| c.is_whitespace() || c == '_' || c == '-') {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        if !cleaned.is_empty() {
            words.push(cleaned);
        }
    }
    words.join("_")
}

pub fn resolve(kind: EntityKind, natural_key: &str) -> Result<StableId, MovieKgError> {
    let key = normalize_key(natural_key);
    if key.is_empty() {
        return Err(MovieKgError::invalid_key(format!(
            "{} key {natural_key:?} is empty after normalization",
            kind.label()
        )));
    }
    Ok(StableId { kind, key })
}

/// Trims and collapses internal whitespace, keeping case and punctuation.
pub fn display_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
