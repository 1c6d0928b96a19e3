//! Validated local models
//!
//! A `LocalModel` is built once from a tree description and is immutable
//! afterwards. Every structural check happens here, so a model that loaded
//! successfully can be evaluated by any number of threads without locking
//! and without construction-time errors surfacing mid-traversal.

use crate::description::{FieldDescription, GuardDescription, NodeDescription, TreeDescription};
use crate::errors::{MalformedTree, Result};
use crate::fields::{Field, FieldRegistry, Optype};
use crate::node::{DecisionNode, NodeStats, Output};
use crate::predicate::Predicate;
use crate::serde_canon;
use crate::{STACK_GROWTH, STACK_RED_ZONE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::info;

/// Immutable decision tree plus the registry its predicates refer to
#[derive(Debug, Clone)]
pub struct LocalModel {
    fields: FieldRegistry,
    root: DecisionNode,
    depth: usize,
    fingerprint: String,
}

/// Shape overview of a loaded tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSummary {
    pub fingerprint: String,
    pub nodes: usize,
    pub leaves: usize,
    pub depth: usize,
    /// Field ids referenced by at least one predicate
    pub fields_used: Vec<String>,
    /// Distinct leaf outputs, in pre-order of first appearance
    pub outputs: Vec<String>,
}

#[derive(Serialize)]
struct CanonicalTree<'a> {
    fields: &'a FieldRegistry,
    root: &'a DecisionNode,
}

impl LocalModel {
    /// Validate a programmatically built tree against its registry.
    pub fn new(fields: FieldRegistry, root: DecisionNode) -> Result<Self> {
        validate(&fields, &root)?;
        let fingerprint = serde_canon::fingerprint(&CanonicalTree {
            fields: &fields,
            root: &root,
        })?;
        let depth = root.depth();

        info!(
            fingerprint = %fingerprint,
            fields = fields.len(),
            nodes = root.node_count(),
            leaves = root.leaf_count(),
            depth,
            "local model loaded"
        );

        Ok(Self {
            fields,
            root,
            depth,
            fingerprint,
        })
    }

    pub fn from_description(description: &TreeDescription) -> Result<Self> {
        let fields = registry_from(&description.fields)?;
        let root = NodeBuilder::new(&fields).root(&description.root)?;
        Self::new(fields, root)
    }

    /// Load from a JSON document. Accepts the bare model object, or the
    /// full resource with the model nested under `model` or `object.model`.
    pub fn from_json_value(value: Value) -> Result<Self> {
        let description =
            TreeDescription::deserialize(serde_stacker::Deserializer::new(unwrap_model(value)))?;
        Self::from_description(&description)
    }

    /// Parse and load a JSON document. Nesting depth is not limited; every
    /// tree level adds two levels of JSON nesting.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let value = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
        deserializer.end()?;
        Self::from_json_value(value)
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn root(&self) -> &DecisionNode {
        &self.root
    }

    /// Maximum number of edges on any root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// blake3 digest of the canonical JSON form of the validated tree.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn summary(&self) -> TreeSummary {
        let mut fields_used = BTreeSet::new();
        let mut outputs: Vec<String> = Vec::new();

        for node in self.root.descendants() {
            for edge in node.children() {
                fields_used.extend(edge.guard().iter().map(|p| p.field().to_string()));
            }
            if node.is_leaf() {
                let output = node.stats().output.to_string();
                if !outputs.contains(&output) {
                    outputs.push(output);
                }
            }
        }

        TreeSummary {
            fingerprint: self.fingerprint.clone(),
            nodes: self.root.node_count(),
            leaves: self.root.leaf_count(),
            depth: self.depth,
            fields_used: fields_used.into_iter().collect(),
            outputs,
        }
    }
}

fn unwrap_model(value: Value) -> Value {
    match value {
        Value::Object(mut map) if !map.contains_key("root") => {
            if let Some(inner) = map.remove("model").or_else(|| map.remove("object")) {
                unwrap_model(inner)
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

fn registry_from(
    fields: &BTreeMap<String, FieldDescription>,
) -> std::result::Result<FieldRegistry, MalformedTree> {
    let fields = fields
        .iter()
        .map(|(id, description)| {
            let optype =
                Optype::parse(&description.optype).ok_or_else(|| MalformedTree::UnknownOptype {
                    field: id.clone(),
                    optype: description.optype.clone(),
                })?;
            let categories = description
                .summary
                .iter()
                .flat_map(|summary| summary.categories.iter().map(|(label, _)| label.clone()));
            Ok(Field::new(id.clone(), description.name.clone(), optype).with_categories(categories))
        })
        .collect::<std::result::Result<Vec<_>, MalformedTree>>()?;
    Ok(FieldRegistry::new(fields))
}

/// Structural checks shared by programmatic and description-built trees.
fn validate(
    fields: &FieldRegistry,
    root: &DecisionNode,
) -> std::result::Result<(), MalformedTree> {
    let mut seen = HashSet::new();

    for node in root.descendants() {
        if !seen.insert(node.id()) {
            return Err(MalformedTree::DuplicateNode { node: node.id() });
        }

        let confidence = node.stats().confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(MalformedTree::ConfidenceOutOfRange {
                node: node.id(),
                confidence,
            });
        }

        for edge in node.children() {
            let child = edge.child().id();
            if edge.guard().is_empty() {
                return Err(MalformedTree::MissingPredicate { node: child });
            }
            for predicate in edge.guard() {
                predicate.check(fields, child)?;
            }
        }
    }
    Ok(())
}

/// Turns description nodes into owned `DecisionNode`s. Nodes without an
/// explicit id are numbered in pre-order.
struct NodeBuilder<'a> {
    fields: &'a FieldRegistry,
    next_id: u32,
}

impl<'a> NodeBuilder<'a> {
    fn new(fields: &'a FieldRegistry) -> Self {
        Self { fields, next_id: 0 }
    }

    fn root(
        &mut self,
        description: &NodeDescription,
    ) -> std::result::Result<DecisionNode, MalformedTree> {
        let root = self.node(description)?;
        match &description.predicate {
            None | Some(GuardDescription::Constant(true)) => Ok(root),
            Some(GuardDescription::Constant(false)) => {
                Err(MalformedTree::ConstantFalseGuard { node: root.id() })
            }
            Some(_) => Err(MalformedTree::RootPredicate { node: root.id() }),
        }
    }

    fn node(
        &mut self,
        description: &NodeDescription,
    ) -> std::result::Result<DecisionNode, MalformedTree> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            let id = description.id.unwrap_or(self.next_id);
            self.next_id += 1;

            let mut node = DecisionNode::new(id, stats_from(description, id)?);
            for child_description in &description.children {
                let child = self.node(child_description)?;
                let guard = self.guard(child_description.predicate.as_ref(), child.id())?;
                node = node.with_guarded_child(guard, child);
            }
            Ok(node)
        })
    }

    fn guard(
        &self,
        guard: Option<&GuardDescription>,
        node: u32,
    ) -> std::result::Result<Vec<Predicate>, MalformedTree> {
        match guard {
            None | Some(GuardDescription::Constant(true)) => {
                Err(MalformedTree::MissingPredicate { node })
            }
            Some(GuardDescription::Constant(false)) => {
                Err(MalformedTree::ConstantFalseGuard { node })
            }
            Some(GuardDescription::Single(descriptor)) => {
                Ok(vec![Predicate::from_descriptor(descriptor, self.fields, node)?])
            }
            Some(GuardDescription::All(descriptors)) => {
                if descriptors.is_empty() {
                    return Err(MalformedTree::MissingPredicate { node });
                }
                descriptors
                    .iter()
                    .map(|descriptor| Predicate::from_descriptor(descriptor, self.fields, node))
                    .collect()
            }
        }
    }
}

fn stats_from(
    description: &NodeDescription,
    node: u32,
) -> std::result::Result<NodeStats, MalformedTree> {
    let output = description
        .output
        .as_ref()
        .ok_or(MalformedTree::MissingStatistics {
            node,
            statistic: "output",
        })
        .and_then(|value| output_from(value, node))?;
    let confidence = description
        .confidence
        .ok_or(MalformedTree::MissingStatistics {
            node,
            statistic: "confidence",
        })?;
    let count = description.count.ok_or(MalformedTree::MissingStatistics {
        node,
        statistic: "count",
    })?;
    let distribution = description
        .raw_distribution()
        .unwrap_or_default()
        .iter()
        .map(|(value, count)| Ok((output_from(value, node)?, *count)))
        .collect::<std::result::Result<Vec<_>, MalformedTree>>()?;

    Ok(NodeStats {
        output,
        confidence,
        count,
        distribution,
    })
}

fn output_from(value: &Value, node: u32) -> std::result::Result<Output, MalformedTree> {
    match value {
        Value::String(label) => Ok(Output::Label(label.clone())),
        Value::Number(n) => {
            n.as_f64()
                .map(Output::Number)
                .ok_or_else(|| MalformedTree::InvalidOutput {
                    node,
                    found: value.to_string(),
                })
        }
        other => Err(MalformedTree::InvalidOutput {
            node,
            found: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LocalModelError;
    use crate::predicate::Condition;
    use serde_json::json;

    fn iris_json() -> Value {
        json!({
            "fields": {
                "000002": {"name": "petal length", "optype": "numeric"},
                "000003": {"name": "petal width", "optype": "numeric"},
                "000004": {"name": "species", "optype": "categorical",
                           "summary": {"categories": [
                               ["Iris-setosa", 50], ["Iris-versicolor", 50], ["Iris-virginica", 50]
                           ]}}
            },
            "root": {
                "output": "Iris-setosa", "confidence": 0.33, "count": 150, "predicate": true,
                "objective_summary": {"categories": [
                    ["Iris-setosa", 50], ["Iris-versicolor", 50], ["Iris-virginica", 50]
                ]},
                "children": [
                    {"output": "Iris-setosa", "confidence": 1.0, "count": 50,
                     "predicate": {"operator": "<", "field": "000002", "value": 2.45}},
                    {"output": "Iris-versicolor", "confidence": 0.5, "count": 100,
                     "predicate": {"operator": ">=", "field": "000002", "value": 2.45},
                     "children": [
                        {"output": "Iris-virginica", "confidence": 0.91, "count": 46,
                         "predicate": {"operator": ">=", "field": "000003", "value": 1.75}},
                        {"output": "Iris-versicolor", "confidence": 0.89, "count": 54,
                         "predicate": {"operator": "<", "field": "000003", "value": 1.75}}
                     ]}
                ]
            }
        })
    }

    fn malformed(value: Value) -> MalformedTree {
        match LocalModel::from_json_value(value) {
            Err(LocalModelError::Malformed(err)) => err,
            other => panic!("expected malformed tree, got {other:?}"),
        }
    }

    #[test]
    fn loads_and_numbers_nodes_in_pre_order() {
        let model = LocalModel::from_json_value(iris_json()).unwrap();
        assert_eq!(model.depth(), 2);
        let ids: Vec<u32> = model.root().descendants().iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(model.fields().get("000004").unwrap().categories().len(), 3);
        assert_eq!(model.root().stats().distribution.len(), 3);
    }

    #[test]
    fn accepts_wrapped_resources() {
        let bare = LocalModel::from_json_value(iris_json()).unwrap();
        let nested =
            LocalModel::from_json_value(json!({"object": {"model": iris_json()}})).unwrap();
        assert_eq!(bare.fingerprint(), nested.fingerprint());
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = LocalModel::from_json_value(iris_json()).unwrap();
        let b = LocalModel::from_json_str(&iris_json().to_string()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut changed = iris_json();
        changed["root"]["children"][0]["predicate"]["value"] = json!(2.5);
        let c = LocalModel::from_json_value(changed).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn unknown_field_fails_at_load() {
        let mut tree = iris_json();
        tree["root"]["children"][1]["children"][0]["predicate"]["field"] = json!("00000f");
        assert_eq!(
            malformed(tree),
            MalformedTree::UnknownField {
                node: 3,
                field: "00000f".into()
            }
        );
    }

    #[test]
    fn missing_statistics_fail_at_load() {
        let mut tree = iris_json();
        tree["root"]["children"][0]
            .as_object_mut()
            .unwrap()
            .remove("confidence");
        assert_eq!(
            malformed(tree),
            MalformedTree::MissingStatistics {
                node: 1,
                statistic: "confidence"
            }
        );
    }

    #[test]
    fn structural_defects_fail_at_load() {
        let mut tree = iris_json();
        tree["root"]["children"][0]["confidence"] = json!(1.5);
        assert!(matches!(malformed(tree), MalformedTree::ConfidenceOutOfRange { node: 1, .. }));

        let mut tree = iris_json();
        tree["root"]["children"][0]
            .as_object_mut()
            .unwrap()
            .remove("predicate");
        assert_eq!(malformed(tree), MalformedTree::MissingPredicate { node: 1 });

        let mut tree = iris_json();
        tree["root"]["predicate"] = json!({"operator": "<", "field": "000002", "value": 1});
        assert_eq!(malformed(tree), MalformedTree::RootPredicate { node: 0 });

        let mut tree = iris_json();
        tree["root"]["children"][0]["id"] = json!(0);
        assert_eq!(malformed(tree), MalformedTree::DuplicateNode { node: 0 });

        let mut tree = iris_json();
        tree["fields"]["000002"]["optype"] = json!("datetime");
        assert!(matches!(malformed(tree), MalformedTree::UnknownOptype { .. }));
    }

    #[test]
    fn programmatic_trees_are_validated() {
        let fields = FieldRegistry::new(vec![Field::new("a", "a", Optype::Numeric)]);
        let root = DecisionNode::new(0, NodeStats::new("x", 1.0, 2)).with_child(
            Predicate::new("b", Condition::LessThan(1.0)),
            DecisionNode::new(1, NodeStats::new("y", 1.0, 1)),
        );
        assert!(matches!(
            LocalModel::new(fields, root),
            Err(LocalModelError::Malformed(MalformedTree::UnknownField { node: 1, .. }))
        ));
    }

    #[test]
    fn summary_reports_shape() {
        let summary = LocalModel::from_json_value(iris_json()).unwrap().summary();
        assert_eq!(summary.nodes, 5);
        assert_eq!(summary.leaves, 3);
        assert_eq!(summary.depth, 2);
        assert_eq!(summary.fields_used, vec!["000002", "000003"]);
        assert_eq!(
            summary.outputs,
            vec!["Iris-setosa", "Iris-virginica", "Iris-versicolor"]
        );
    }
}
