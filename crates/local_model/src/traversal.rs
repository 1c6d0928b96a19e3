//! First-match tree traversal
//!
//! At each internal node the outgoing edges are tried in the order they were
//! defined and the first whose guard holds is followed. When no edge holds,
//! the walk stops and the current node's statistics become the answer.

use crate::input::Row;
use crate::node::DecisionNode;
use crate::predicate::Predicate;
use crate::predictor::PredictionPolicy;
use serde::Serialize;
use tracing::{debug, trace};

/// Why a walk ended where it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Reached a node without children
    Leaf,
    /// No sibling guard held for the row (e.g. the tested field is missing)
    NoMatchingBranch,
    /// The policy's depth limit was reached
    MaxDepth,
    /// The next child had fewer instances than the policy allows
    MinInstances,
}

/// Where a walk stopped and the predicates satisfied on the way
#[derive(Debug, Clone)]
pub struct Traversal<'a> {
    pub node: &'a DecisionNode,
    /// Satisfied predicates, root first
    pub path: Vec<&'a Predicate>,
    /// Number of edges followed
    pub depth: usize,
    pub stop: StopReason,
}

pub fn traverse<'a>(root: &'a DecisionNode, row: &Row, policy: &PredictionPolicy) -> Traversal<'a> {
    let mut node = root;
    let mut path = Vec::new();
    let mut depth = 0usize;

    let stop = loop {
        if node.is_leaf() {
            break StopReason::Leaf;
        }
        if policy.max_depth.is_some_and(|max| depth >= max) {
            break StopReason::MaxDepth;
        }

        let Some(edge) = node.children().iter().find(|edge| edge.matches(row)) else {
            debug!(node = node.id(), "no branch matched; stopping at internal node");
            break StopReason::NoMatchingBranch;
        };

        let child = edge.child();
        if policy
            .min_instances
            .is_some_and(|min| child.stats().count < min)
        {
            break StopReason::MinInstances;
        }

        trace!(from = node.id(), to = child.id(), "following branch");
        path.extend(edge.guard());
        node = child;
        depth += 1;
    };

    Traversal {
        node,
        path,
        depth,
        stop,
    }
}
