//! Prediction audit records
//!
//! Each record ties a prediction to the exact model (by fingerprint) and
//! input (by digest) that produced it, together with the rule that explains
//! it. The log is owned by the caller; models never hold one.

use crate::errors::Result;
use crate::input::InputRow;
use crate::model::LocalModel;
use crate::node::Output;
use crate::predictor::Prediction;
use crate::serde_canon;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub model_fingerprint: String,
    pub input_digest: String,
    pub node_id: u32,
    pub output: Output,
    pub confidence: f64,
    pub rule: String,
    /// Milliseconds since the Unix epoch
    pub recorded_at: i64,
    pub library_version: String,
}

impl AuditRecord {
    pub fn new(model: &LocalModel, input: &InputRow, prediction: &Prediction) -> Result<Self> {
        Ok(Self {
            model_fingerprint: model.fingerprint().to_string(),
            input_digest: serde_canon::fingerprint(input)?,
            node_id: prediction.node_id,
            output: prediction.output.clone(),
            confidence: prediction.confidence,
            rule: prediction.rule(model.fields()),
            recorded_at: chrono::Utc::now().timestamp_millis(),
            library_version: crate::VERSION.to_string(),
        })
    }
}

/// Append-only collection of audit records
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prediction and return it unchanged.
    pub fn record(
        &mut self,
        model: &LocalModel,
        input: &InputRow,
        prediction: Prediction,
    ) -> Result<Prediction> {
        self.records.push(AuditRecord::new(model, input, &prediction)?);
        Ok(prediction)
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// One compact JSON object per line.
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }
}
