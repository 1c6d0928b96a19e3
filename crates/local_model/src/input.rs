//! Input rows
//!
//! Callers hand in loosely typed JSON rows. Before a row reaches the tree it
//! is normalised against the field registry into a `Row` of typed values;
//! every value that cannot be interpreted under its field's optype is
//! reported at once and the row is not evaluated.

use crate::errors::{FieldMismatch, LocalModelError, Result};
use crate::fields::{FieldRegistry, Optype};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// A caller-supplied row: field id (or display name) to raw JSON value.
pub type InputRow = BTreeMap<String, Value>;

/// A typed input value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Datum {
    Number(f64),
    Label(String),
}

impl Datum {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Label(label) => Some(label),
            Self::Number(_) => None,
        }
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Self::Label(value.to_string())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Self::Label(value)
    }
}

/// A normalised row keyed by field id. Absent keys are missing values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Datum>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Datum>) {
        self.values.insert(field.into(), value.into());
    }

    /// Builder-style `insert`.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Datum>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Datum> {
        self.values.get(field)
    }

    pub fn is_missing(&self, field: &str) -> bool {
        !self.values.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Datum>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Normalise a raw row against the registry.
///
/// Keys are field ids, or display names when `by_name` is set. Unknown keys
/// are ignored. `null` and empty strings count as missing. Numeric fields
/// accept JSON numbers and numeric strings; categorical and text fields
/// accept strings, numbers and booleans (the latter two by their JSON text).
pub fn normalize_row(fields: &FieldRegistry, input: &InputRow, by_name: bool) -> Result<Row> {
    let mut row = Row::new();
    let mut mismatches = Vec::new();

    for (key, raw) in input {
        let field = if by_name {
            fields.id_for_name(key).and_then(|id| fields.get(id))
        } else {
            fields.get(key)
        };
        let Some(field) = field else {
            debug!(key = %key, "ignoring input key with no matching field");
            continue;
        };

        match coerce(field.optype(), raw) {
            Ok(Some(datum)) => row.insert(field.id(), datum),
            Ok(None) => {}
            Err(found) => mismatches.push(FieldMismatch {
                field: field.id().to_string(),
                name: field.name().to_string(),
                expected: field.optype(),
                found,
            }),
        }
    }

    if mismatches.is_empty() {
        Ok(row)
    } else {
        mismatches.sort_by(|a, b| a.field.cmp(&b.field));
        Err(LocalModelError::TypeMismatch(mismatches))
    }
}

/// `Ok(None)` means the value counts as missing; `Err` carries the offending
/// JSON text.
fn coerce(optype: Optype, raw: &Value) -> std::result::Result<Option<Datum>, String> {
    match (optype, raw) {
        (_, Value::Null) => Ok(None),
        (_, Value::String(s)) if s.trim().is_empty() => Ok(None),

        (Optype::Numeric, Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(|v| Some(Datum::Number(v)))
            .ok_or_else(|| raw.to_string()),
        (Optype::Numeric, Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(Datum::Number(v))),
            _ => Err(raw.to_string()),
        },

        (Optype::Categorical | Optype::Text, Value::String(s)) => Ok(Some(Datum::Label(s.clone()))),
        (Optype::Categorical | Optype::Text, Value::Number(n)) => {
            Ok(Some(Datum::Label(n.to_string())))
        }
        (Optype::Categorical | Optype::Text, Value::Bool(b)) => {
            Ok(Some(Datum::Label(b.to_string())))
        }

        _ => Err(raw.to_string()),
    }
}
