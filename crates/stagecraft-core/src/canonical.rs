//! Canonical JSON serialization for deterministic digests.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::Result;

/// Serialize to JSON with all object keys sorted.
pub fn to_canonical_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value)?;
    let sorted = sort_json_value(json_value);
    Ok(serde_json::to_string(&sorted)?)
}

/// SHA-256 of the canonical JSON, hex encoded.
pub fn digest<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = to_canonical_json(value)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

fn sort_json_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, sort_json_value(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(sort_json_value).collect())
        }
        other => other,
    }
}
