//! Canonical JSON and blake3 fingerprints
//!
//! Object keys are sorted recursively and output is compact, so the same
//! value always yields the same bytes, and therefore the same digest.

use crate::{STACK_GROWTH, STACK_RED_ZONE};
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Serialize a value to compact JSON with sorted object keys.
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    let tree = serde_json::to_value(value)
        .map_err(|e| CanonicalError::SerializationError(e.to_string()))?;
    let json = serde_json::to_string(&Sorted(&tree))
        .map_err(|e| CanonicalError::SerializationError(e.to_string()));
    dismantle(tree);
    json
}

/// Writes objects with their keys in byte order, at any nesting depth.
struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || match self.0 {
            Value::Array(items) => serializer.collect_seq(items.iter().map(Sorted)),
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                serializer.collect_map(entries.into_iter().map(|(k, v)| (k, Sorted(v))))
            }
            other => other.serialize(serializer),
        })
    }
}

/// Drop a value without recursing once per nesting level.
fn dismantle(value: Value) {
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => pending.extend(items),
            Value::Object(map) => pending.extend(map.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}

/// Hex-encoded blake3 digest of the canonical JSON form.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    let json = to_canonical_json(value)?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}
