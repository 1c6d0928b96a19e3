//! Decision nodes
//!
//! The tree is a strict ownership hierarchy: every node owns its outgoing
//! edges and every edge owns its child. Traversal is top-down only, so no
//! back-references are kept.

use crate::input::Row;
use crate::predicate::Predicate;
use crate::{STACK_GROWTH, STACK_RED_ZONE};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Predicted value at a node: a class label or a regression value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Output {
    Number(f64),
    Label(String),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<&str> for Output {
    fn from(value: &str) -> Self {
        Self::Label(value.to_string())
    }
}

impl From<f64> for Output {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Training statistics recorded at a node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStats {
    pub output: Output,
    /// In `[0, 1]`
    pub confidence: f64,
    pub count: u64,
    /// Per-class (or per-bin) instance counts, in description order
    pub distribution: Vec<(Output, u64)>,
}

impl NodeStats {
    pub fn new(output: impl Into<Output>, confidence: f64, count: u64) -> Self {
        Self {
            output: output.into(),
            confidence,
            count,
            distribution: Vec::new(),
        }
    }

    pub fn with_distribution<I, O>(mut self, distribution: I) -> Self
    where
        I: IntoIterator<Item = (O, u64)>,
        O: Into<Output>,
    {
        self.distribution = distribution
            .into_iter()
            .map(|(output, count)| (output.into(), count))
            .collect();
        self
    }
}

/// A guarded edge: all predicates in the guard must hold to follow it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    guard: Vec<Predicate>,
    child: DecisionNode,
}

impl Edge {
    pub fn guard(&self) -> &[Predicate] {
        &self.guard
    }

    pub fn child(&self) -> &DecisionNode {
        &self.child
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.guard.iter().all(|predicate| predicate.evaluate(row))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionNode {
    id: u32,
    stats: NodeStats,
    children: Vec<Edge>,
}

impl Serialize for DecisionNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // One frame per tree level; grow the stack for deep trees.
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            let len = if self.children.is_empty() { 2 } else { 3 };
            let mut state = serializer.serialize_struct("DecisionNode", len)?;
            state.serialize_field("id", &self.id)?;
            state.serialize_field("stats", &self.stats)?;
            if self.children.is_empty() {
                state.skip_field("children")?;
            } else {
                state.serialize_field("children", &self.children)?;
            }
            state.end()
        })
    }
}

impl DecisionNode {
    pub fn new(id: u32, stats: NodeStats) -> Self {
        Self {
            id,
            stats,
            children: Vec::new(),
        }
    }

    /// Append a child behind a single predicate. Order of calls is the
    /// evaluation order.
    pub fn with_child(self, predicate: Predicate, child: DecisionNode) -> Self {
        self.with_guarded_child(vec![predicate], child)
    }

    /// Append a child behind a conjunction of predicates.
    pub fn with_guarded_child(mut self, guard: Vec<Predicate>, child: DecisionNode) -> Self {
        self.children.push(Edge { guard, child });
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn children(&self) -> &[Edge] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Longest root-to-leaf edge count below this node.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|edge| (&edge.child, depth + 1)));
        }
        deepest
    }

    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    pub fn leaf_count(&self) -> usize {
        self.walk().filter(|node| node.is_leaf()).count()
    }

    /// Pre-order walk over this node and all descendants.
    pub fn descendants(&self) -> Vec<&DecisionNode> {
        self.walk().collect()
    }

    fn walk<'a>(&'a self) -> impl Iterator<Item = &'a DecisionNode> + 'a {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev().map(|edge| &edge.child));
            Some(node)
        })
    }
}
