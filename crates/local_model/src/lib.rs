//! Local Decision-Tree Models
//!
//! Evaluates an already-trained decision tree offline: the tree description
//! is fetched once by a remote binding, validated here, and then answers
//! predictions and rule listings without any network round-trip.
//!
//! Modules:
//! - `fields`: Field registry (id → name, optype, categories)
//! - `input`: Input row normalisation and type checking
//! - `predicate`: Typed branch conditions and their evaluation
//! - `node`: Decision nodes, guarded edges and node statistics
//! - `description`: Wire shape of the external tree description
//! - `model`: Validated, immutable `LocalModel`
//! - `traversal`: First-match tree walk
//! - `predictor`: Prediction policy and results
//! - `rules`: Human-readable decision rules
//! - `serde_canon`: Canonical JSON and model fingerprints
//! - `audit`: Audit records for issued predictions
//! - `config`: TOML configuration with environment overrides

pub mod audit;
pub mod config;
pub mod description;
pub mod errors;
pub mod fields;
pub mod input;
pub mod model;
pub mod node;
pub mod predicate;
pub mod predictor;
pub mod rules;
pub mod serde_canon;
pub mod traversal;

pub use audit::{AuditLog, AuditRecord};
pub use config::{LocalModelConfig, LogFormat, LoggingConfig};
pub use description::TreeDescription;
pub use errors::{FieldMismatch, LocalModelError, MalformedTree, Result};
pub use fields::{Field, FieldRegistry, Optype};
pub use input::{normalize_row, Datum, InputRow, Row};
pub use model::{LocalModel, TreeSummary};
pub use node::{DecisionNode, Edge, NodeStats, Output};
pub use predicate::{Condition, OpType, Operand, Operator, Predicate};
pub use predictor::{Prediction, PredictionPolicy};
pub use rules::{list_rules, list_rules_for, render, render_predicate, Rule};
pub use traversal::{traverse, StopReason, Traversal};

/// Crate version string, recorded in audit output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Free stack below which recursive walks over a tree grow a new segment.
pub(crate) const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each stack segment allocated by those walks.
pub(crate) const STACK_GROWTH: usize = 1024 * 1024;
