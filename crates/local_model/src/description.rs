//! Wire shape of an external tree description
//!
//! The description is the `model` object returned by the remote service
//! once a model resource is ready:
//!
//! ```json
//! {
//!   "fields": {
//!     "000002": {"name": "petal length", "optype": "numeric"},
//!     "000004": {"name": "species", "optype": "categorical",
//!                "summary": {"categories": [["Iris-setosa", 50], ["Iris-virginica", 50]]}}
//!   },
//!   "root": {
//!     "id": 0, "output": "Iris-setosa", "confidence": 0.5, "count": 100,
//!     "objective_summary": {"categories": [["Iris-setosa", 50], ["Iris-virginica", 50]]},
//!     "predicate": true,
//!     "children": [
//!       {"id": 1, "predicate": {"operator": "<", "field": "000002", "value": 2.45}, ...},
//!       {"id": 2, "predicate": {"operator": ">=", "field": "000002", "value": 2.45}, ...}
//!     ]
//!   }
//! }
//! ```
//!
//! These types only mirror the JSON; validation happens in `LocalModel`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDescription {
    pub fields: BTreeMap<String, FieldDescription>,
    pub root: NodeDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    pub optype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<FieldSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    /// `[label, count]` pairs for categorical fields
    #[serde(default)]
    pub categories: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<GuardDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<(Value, u64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_summary: Option<ObjectiveSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDescription>,
}

impl NodeDescription {
    /// Class distribution from `distribution`, falling back to the
    /// categories or bins of `objective_summary`.
    pub fn raw_distribution(&self) -> Option<&[(Value, u64)]> {
        if let Some(distribution) = &self.distribution {
            return Some(distribution);
        }
        let summary = self.objective_summary.as_ref()?;
        summary
            .categories
            .as_deref()
            .or(summary.bins.as_deref())
            .or(summary.counts.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<(Value, u64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<(Value, u64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<Vec<(Value, u64)>>,
}

/// The guard on the edge leading into a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GuardDescription {
    /// `true` marks the root; `false` is rejected on load
    Constant(bool),
    Single(PredicateDescription),
    /// Conjunction of predicates
    All(Vec<PredicateDescription>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateDescription {
    #[serde(default, alias = "opType", skip_serializing_if = "Option::is_none")]
    pub op_type: Option<String>,
    pub operator: String,
    pub field: String,
    #[serde(default)]
    pub value: Value,
}
