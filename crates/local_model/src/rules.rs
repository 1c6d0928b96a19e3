//! Decision rules
//!
//! A rule is the conjunction of predicates on a root-to-node path, one
//! fragment per line in path order: `<field name> <symbol> <value>`.
//! Symbols come from `Operator::symbol` and numbers use Rust's `Display`,
//! so output does not depend on locale.

use crate::fields::FieldRegistry;
use crate::model::LocalModel;
use crate::node::{DecisionNode, Output};
use crate::predicate::{Condition, Predicate};
use crate::{STACK_GROWTH, STACK_RED_ZONE};
use serde::Serialize;
use std::fmt;

/// Render one predicate. Unknown field ids are printed as-is.
pub fn render_predicate(predicate: &Predicate, fields: &FieldRegistry) -> String {
    let name = fields
        .name_of(predicate.field())
        .unwrap_or_else(|| predicate.field());
    let symbol = predicate.operator().symbol();

    let mut fragment = match predicate.condition() {
        Condition::Equal(operand) | Condition::NotEqual(operand) => {
            format!("{name} {symbol} {operand}")
        }
        Condition::LessThan(v)
        | Condition::LessOrEqual(v)
        | Condition::GreaterThan(v)
        | Condition::GreaterOrEqual(v) => format!("{name} {symbol} {v}"),
        Condition::In(labels) => format!("{name} {symbol} [{}]", labels.join(", ")),
        Condition::Contains(needle) => format!("{name} {symbol} {needle}"),
        Condition::IsMissing | Condition::IsNotMissing => format!("{name} {symbol}"),
    };
    if predicate.accepts_missing() {
        fragment.push_str(" or missing");
    }
    fragment
}

/// Render a path as a newline-separated conjunction, root first.
pub fn render<'a, I>(path: I, fields: &FieldRegistry) -> String
where
    I: IntoIterator<Item = &'a Predicate>,
{
    path.into_iter()
        .map(|predicate| render_predicate(predicate, fields))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The rule leading to one leaf
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub leaf_id: u32,
    pub conditions: Vec<Predicate>,
    pub output: Output,
    pub confidence: f64,
    pub count: u64,
    /// Rendered conditions, as produced by `render`
    pub text: String,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.text.is_empty() {
            writeln!(f, "{}", self.text)?;
        }
        write!(
            f,
            "=> {} (confidence {}, {} instances)",
            self.output, self.confidence, self.count
        )
    }
}

/// One rule per leaf, in depth-first order with siblings in edge order.
pub fn list_rules(model: &LocalModel) -> Vec<Rule> {
    let mut rules = Vec::with_capacity(model.root().leaf_count());
    let mut path = Vec::new();
    collect(model.root(), &mut path, model.fields(), &mut rules);
    rules
}

/// Rules whose leaf predicts `output`.
pub fn list_rules_for(model: &LocalModel, output: &Output) -> Vec<Rule> {
    list_rules(model)
        .into_iter()
        .filter(|rule| &rule.output == output)
        .collect()
}

fn collect<'a>(
    node: &'a DecisionNode,
    path: &mut Vec<&'a Predicate>,
    fields: &FieldRegistry,
    rules: &mut Vec<Rule>,
) {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
        if node.is_leaf() {
            let stats = node.stats();
            rules.push(Rule {
                leaf_id: node.id(),
                conditions: path.iter().map(|p| (*p).clone()).collect(),
                output: stats.output.clone(),
                confidence: stats.confidence,
                count: stats.count,
                text: render(path.iter().copied(), fields),
            });
            return;
        }

        for edge in node.children() {
            let mark = path.len();
            path.extend(edge.guard());
            collect(edge.child(), path, fields, rules);
            path.truncate(mark);
        }
    })
}

impl LocalModel {
    pub fn rules(&self) -> Vec<Rule> {
        list_rules(self)
    }
}
