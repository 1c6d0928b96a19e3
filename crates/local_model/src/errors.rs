//! Error types for local model loading and evaluation

use crate::fields::Optype;
use crate::serde_canon::CanonicalError;
use std::fmt;
use thiserror::Error;

/// Defects found while building a model from a tree description.
///
/// These are raised once, at load time; a model that loaded successfully
/// never produces one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedTree {
    #[error("field {field} has unknown optype `{optype}`")]
    UnknownOptype { field: String, optype: String },

    #[error("node {node}: predicate references unknown field {field}")]
    UnknownField { node: u32, field: String },

    #[error("node {node}: unknown operator `{operator}`")]
    UnknownOperator { node: u32, operator: String },

    #[error("node {node}: unknown op_type `{op_type}`")]
    UnknownOpType { node: u32, op_type: String },

    #[error("node {node}: operator `{operator}` is not valid on {optype} field {field}")]
    OperatorMismatch {
        node: u32,
        field: String,
        operator: String,
        optype: Optype,
    },

    #[error("node {node}: operand for field {field} must be {expected}, found {found}")]
    OperandMismatch {
        node: u32,
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("node {node} is missing statistic `{statistic}`")]
    MissingStatistics { node: u32, statistic: &'static str },

    #[error("node {node}: output must be a number or a string, found {found}")]
    InvalidOutput { node: u32, found: String },

    #[error("node {node}: confidence {confidence} is outside [0, 1]")]
    ConfidenceOutOfRange { node: u32, confidence: f64 },

    #[error("node {node} is not the root but carries no predicate")]
    MissingPredicate { node: u32 },

    #[error("root node {node} must not carry a predicate")]
    RootPredicate { node: u32 },

    #[error("node {node}: constant `false` predicate can never match")]
    ConstantFalseGuard { node: u32 },

    #[error("node id {node} appears more than once")]
    DuplicateNode { node: u32 },
}

/// One input value whose type is incompatible with its field's optype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: String,
    pub name: String,
    pub expected: Optype,
    pub found: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) expects a {} value, found {}",
            self.name, self.field, self.expected, self.found
        )
    }
}

fn join_mismatches(mismatches: &[FieldMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by the local model crate
#[derive(Error, Debug)]
pub enum LocalModelError {
    /// The tree description cannot be turned into a model
    #[error("Malformed tree: {0}")]
    Malformed(#[from] MalformedTree),

    /// The input row carries values of the wrong type, one entry per field
    #[error("Input type mismatch: {}", join_mismatches(.0))]
    TypeMismatch(Vec<FieldMismatch>),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Canonical serialization error
    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] CanonicalError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for local model operations
pub type Result<T> = std::result::Result<T, LocalModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_lists_every_field() {
        let err = LocalModelError::TypeMismatch(vec![
            FieldMismatch {
                field: "000001".into(),
                name: "sepal width".into(),
                expected: Optype::Numeric,
                found: "\"wide\"".into(),
            },
            FieldMismatch {
                field: "000002".into(),
                name: "petal length".into(),
                expected: Optype::Numeric,
                found: "true".into(),
            },
        ]);
        let message = err.to_string();
        assert!(message.contains("sepal width (000001) expects a numeric value"));
        assert!(message.contains("petal length (000002)"));
    }

    #[test]
    fn malformed_tree_converts_into_crate_error() {
        let err: LocalModelError = MalformedTree::UnknownField {
            node: 3,
            field: "00000f".into(),
        }
        .into();
        assert!(matches!(err, LocalModelError::Malformed(_)));
        assert_eq!(
            err.to_string(),
            "Malformed tree: node 3: predicate references unknown field 00000f"
        );
    }
}
