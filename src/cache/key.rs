//! Cache key generation.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{Error, Result};

/// Namespace plus key material. Two keys are equal only when both match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: String,
    pub material: String,
}

impl CacheKey {
    pub fn new(namespace: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            material: material.into(),
        }
    }

    /// Key from structured parameters, serialized with object keys sorted at
    /// every depth so field order never produces a different key.
    pub fn from_params<P: Serialize + ?Sized>(namespace: &str, params: &P) -> Result<Self> {
        let value = serde_json::to_value(params)
            .map_err(|e| Error::cache(format!("unserializable cache parameters: {}", e)))?;
        let canonical = serde_json::to_string(&canonicalize(value))
            .map_err(|e| Error::cache(format!("unserializable cache parameters: {}", e)))?;
        Ok(Self::new(namespace, canonical))
    }

    /// Key from free text. Runs of whitespace collapse to one space before
    /// hashing, so reformatted copies of the same text share one entry.
    pub fn from_text(namespace: &str, text: &str) -> Self {
        Self::new(namespace, text_fingerprint(text))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.material)
    }
}

pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 of the normalized text.
pub fn text_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
