//! Predictions
//!
//! `LocalModel::predict` normalises the input row, walks the tree and copies
//! the terminal node's statistics verbatim into a fresh `Prediction`. No
//! state is shared between calls, so a model can serve concurrent callers.

use crate::errors::Result;
use crate::fields::FieldRegistry;
use crate::input::{normalize_row, InputRow, Row};
use crate::model::LocalModel;
use crate::node::Output;
use crate::predicate::Predicate;
use crate::rules;
use crate::traversal::{traverse, StopReason};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Controls how far a traversal may go and how input rows are keyed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionPolicy {
    /// Stop after following this many edges
    pub max_depth: Option<usize>,
    /// Do not descend into a child trained on fewer instances
    pub min_instances: Option<u64>,
    /// Input rows are keyed by field name instead of field id
    pub by_name: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub output: Output,
    pub confidence: f64,
    pub count: u64,
    pub distribution: Vec<(Output, u64)>,
    /// Satisfied predicates from the root to `node_id`
    pub path: Vec<Predicate>,
    pub node_id: u32,
    /// Edges followed
    pub depth: usize,
    pub stop: StopReason,
}

impl Prediction {
    /// Conjunctive rule explaining this prediction.
    pub fn rule(&self, fields: &FieldRegistry) -> String {
        rules::render(&self.path, fields)
    }
}

impl LocalModel {
    /// Predict from a raw input row.
    ///
    /// Fails only when a value's type is incompatible with its field; the
    /// model itself is never modified.
    pub fn predict(&self, input: &InputRow, policy: &PredictionPolicy) -> Result<Prediction> {
        let row = normalize_row(self.fields(), input, policy.by_name)?;
        Ok(self.predict_row(&row, policy))
    }

    /// Predict from an already-normalised row.
    pub fn predict_row(&self, row: &Row, policy: &PredictionPolicy) -> Prediction {
        let walk = traverse(self.root(), row, policy);
        let stats = walk.node.stats();

        Prediction {
            output: stats.output.clone(),
            confidence: stats.confidence,
            count: stats.count,
            distribution: stats.distribution.clone(),
            path: walk.path.into_iter().cloned().collect(),
            node_id: walk.node.id(),
            depth: walk.depth,
            stop: walk.stop,
        }
    }

    /// Predict many rows in parallel. Results keep the input order.
    pub fn predict_batch(
        &self,
        inputs: &[InputRow],
        policy: &PredictionPolicy,
    ) -> Vec<Result<Prediction>> {
        inputs
            .par_iter()
            .map(|input| self.predict(input, policy))
            .collect()
    }
}
