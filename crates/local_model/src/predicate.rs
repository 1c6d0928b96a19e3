//! Branch predicates
//!
//! A predicate is an immutable condition on one field. The operand shape is
//! fixed by the condition variant and validated against the field registry
//! once, when the tree is loaded; evaluation itself never fails.
//!
//! Missing values: every condition except `IsMissing` is false when the
//! field is absent from the row, unless the predicate was loaded from a
//! `*`-suffixed operator (e.g. `<=*`), in which case an absent value also
//! satisfies it.

use crate::description::PredicateDescription;
use crate::errors::MalformedTree;
use crate::fields::{FieldRegistry, Optype};
use crate::input::{Datum, Row};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Operator kinds understood by the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    In,
    Contains,
    IsMissing,
    IsNotMissing,
}

impl Operator {
    /// Parse a wire operator. The flag reports a trailing `*`, which is only
    /// allowed on comparison operators.
    pub fn parse(token: &str) -> Option<(Self, bool)> {
        let (base, or_missing) = match token.strip_suffix('*') {
            Some(base) => (base, true),
            None => (token, false),
        };
        let operator = match base.trim() {
            "=" | "==" => Self::Equal,
            "!=" | "<>" => Self::NotEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessOrEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterOrEqual,
            "in" => Self::In,
            "contains" => Self::Contains,
            "is missing" => Self::IsMissing,
            "is not missing" => Self::IsNotMissing,
            _ => return None,
        };
        if or_missing && !operator.is_comparison() {
            return None;
        }
        Some((operator, or_missing))
    }

    /// Stable, locale-independent symbol used in rules and audit logs.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::In => "in",
            Self::Contains => "contains",
            Self::IsMissing => "is missing",
            Self::IsNotMissing => "is not missing",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::LessThan
                | Self::LessOrEqual
                | Self::GreaterThan
                | Self::GreaterOrEqual
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How a predicate's operand is interpreted on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Numeric,
    String,
    List,
    Missing,
}

impl OpType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "numeric" => Some(Self::Numeric),
            "string" => Some(Self::String),
            "list" => Some(Self::List),
            "missing" => Some(Self::Missing),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::String => "string",
            Self::List => "list",
            Self::Missing => "missing",
        }
    }

    fn infer(operator: Operator, value: &Value, optype: Optype) -> Self {
        if matches!(operator, Operator::IsMissing | Operator::IsNotMissing) {
            return Self::Missing;
        }
        match value {
            Value::Null => Self::Missing,
            Value::Number(_) if optype == Optype::Numeric => Self::Numeric,
            Value::Array(_) => Self::List,
            _ => Self::String,
        }
    }
}

/// Scalar operand of an equality test
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Number(f64),
    Text(String),
}

impl Operand {
    fn matches(&self, datum: &Datum) -> bool {
        match (self, datum) {
            (Self::Number(expected), Datum::Number(actual)) => expected == actual,
            (Self::Text(expected), Datum::Label(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Condition variants, each carrying only the operand it needs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "operand", rename_all = "snake_case")]
pub enum Condition {
    Equal(Operand),
    NotEqual(Operand),
    LessThan(f64),
    LessOrEqual(f64),
    GreaterThan(f64),
    GreaterOrEqual(f64),
    In(Vec<String>),
    Contains(String),
    IsMissing,
    IsNotMissing,
}

impl Condition {
    pub fn operator(&self) -> Operator {
        match self {
            Self::Equal(_) => Operator::Equal,
            Self::NotEqual(_) => Operator::NotEqual,
            Self::LessThan(_) => Operator::LessThan,
            Self::LessOrEqual(_) => Operator::LessOrEqual,
            Self::GreaterThan(_) => Operator::GreaterThan,
            Self::GreaterOrEqual(_) => Operator::GreaterOrEqual,
            Self::In(_) => Operator::In,
            Self::Contains(_) => Operator::Contains,
            Self::IsMissing => Operator::IsMissing,
            Self::IsNotMissing => Operator::IsNotMissing,
        }
    }

    pub fn op_type(&self) -> OpType {
        match self {
            Self::Equal(Operand::Number(_))
            | Self::NotEqual(Operand::Number(_))
            | Self::LessThan(_)
            | Self::LessOrEqual(_)
            | Self::GreaterThan(_)
            | Self::GreaterOrEqual(_) => OpType::Numeric,
            Self::Equal(Operand::Text(_))
            | Self::NotEqual(Operand::Text(_))
            | Self::Contains(_) => OpType::String,
            Self::In(_) => OpType::List,
            Self::IsMissing | Self::IsNotMissing => OpType::Missing,
        }
    }

    fn holds(&self, datum: &Datum) -> bool {
        match (self, datum) {
            (Self::Equal(operand), datum) => operand.matches(datum),
            (Self::NotEqual(operand), datum) => !operand.matches(datum),
            (Self::LessThan(t), Datum::Number(v)) => v < t,
            (Self::LessOrEqual(t), Datum::Number(v)) => v <= t,
            (Self::GreaterThan(t), Datum::Number(v)) => v > t,
            (Self::GreaterOrEqual(t), Datum::Number(v)) => v >= t,
            (Self::In(labels), Datum::Label(label)) => labels.iter().any(|l| l == label),
            (Self::Contains(needle), Datum::Label(text)) => text.contains(needle.as_str()),
            (Self::IsNotMissing, _) => true,
            _ => false,
        }
    }
}

/// A single branch condition on one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    field: String,
    condition: Condition,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    or_missing: bool,
}

impl Predicate {
    pub fn new(field: impl Into<String>, condition: Condition) -> Self {
        Self {
            field: field.into(),
            condition,
            or_missing: false,
        }
    }

    /// Also satisfy the predicate when the field is absent.
    pub fn or_missing(mut self) -> Self {
        self.or_missing = true;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn operator(&self) -> Operator {
        self.condition.operator()
    }

    pub fn op_type(&self) -> OpType {
        self.condition.op_type()
    }

    pub fn accepts_missing(&self) -> bool {
        self.or_missing
    }

    /// Evaluate against a normalised row.
    pub fn evaluate(&self, row: &Row) -> bool {
        match row.get(&self.field) {
            None => self.or_missing || self.condition == Condition::IsMissing,
            Some(datum) => self.condition.holds(datum),
        }
    }

    /// Check the predicate against the registry that will evaluate it.
    pub fn check(&self, fields: &FieldRegistry, node: u32) -> Result<(), MalformedTree> {
        let field = fields.get(&self.field).ok_or_else(|| MalformedTree::UnknownField {
            node,
            field: self.field.clone(),
        })?;
        let optype = field.optype();
        let operator = self.operator();

        if self.or_missing && !operator.is_comparison() {
            return Err(MalformedTree::UnknownOperator {
                node,
                operator: format!("{}*", operator.symbol()),
            });
        }

        let operator_mismatch = || MalformedTree::OperatorMismatch {
            node,
            field: self.field.clone(),
            operator: operator.symbol().to_string(),
            optype,
        };
        let operand_mismatch = |expected: &'static str, found: String| {
            MalformedTree::OperandMismatch {
                node,
                field: self.field.clone(),
                expected,
                found,
            }
        };

        match (&self.condition, optype) {
            (Condition::IsMissing | Condition::IsNotMissing, _) => Ok(()),

            (
                Condition::LessThan(t)
                | Condition::LessOrEqual(t)
                | Condition::GreaterThan(t)
                | Condition::GreaterOrEqual(t)
                | Condition::Equal(Operand::Number(t))
                | Condition::NotEqual(Operand::Number(t)),
                Optype::Numeric,
            ) => {
                if t.is_finite() {
                    Ok(())
                } else {
                    Err(operand_mismatch("a finite number", t.to_string()))
                }
            }
            (
                Condition::Equal(Operand::Text(t)) | Condition::NotEqual(Operand::Text(t)),
                Optype::Numeric,
            ) => Err(operand_mismatch("a number", format!("{t:?}"))),
            (
                Condition::LessThan(_)
                | Condition::LessOrEqual(_)
                | Condition::GreaterThan(_)
                | Condition::GreaterOrEqual(_),
                _,
            ) => Err(operator_mismatch()),

            (
                Condition::Equal(Operand::Text(label)) | Condition::NotEqual(Operand::Text(label)),
                _,
            ) => {
                if optype == Optype::Categorical && !field.accepts_category(label) {
                    warn!(
                        node,
                        field = %self.field,
                        label = %label,
                        "predicate label is not a known category"
                    );
                }
                Ok(())
            }
            (Condition::Equal(Operand::Number(n)) | Condition::NotEqual(Operand::Number(n)), _) => {
                Err(operand_mismatch("a string", n.to_string()))
            }

            (Condition::In(labels), Optype::Categorical) => {
                for label in labels.iter().filter(|l| !field.accepts_category(l)) {
                    warn!(
                        node,
                        field = %self.field,
                        label = %label,
                        "predicate label is not a known category"
                    );
                }
                Ok(())
            }
            (Condition::In(_), _) => Err(operator_mismatch()),

            (Condition::Contains(_), Optype::Text) => Ok(()),
            (Condition::Contains(_), _) => Err(operator_mismatch()),
        }
    }

    /// Build and check a predicate from its wire descriptor.
    pub fn from_descriptor(
        descriptor: &PredicateDescription,
        fields: &FieldRegistry,
        node: u32,
    ) -> Result<Self, MalformedTree> {
        let field = fields
            .get(&descriptor.field)
            .ok_or_else(|| MalformedTree::UnknownField {
                node,
                field: descriptor.field.clone(),
            })?;
        let (operator, or_missing) =
            Operator::parse(&descriptor.operator).ok_or_else(|| MalformedTree::UnknownOperator {
                node,
                operator: descriptor.operator.clone(),
            })?;
        let op_type = match &descriptor.op_type {
            Some(tag) => OpType::parse(tag).ok_or_else(|| MalformedTree::UnknownOpType {
                node,
                op_type: tag.clone(),
            })?,
            None => OpType::infer(operator, &descriptor.value, field.optype()),
        };

        let value = &descriptor.value;
        let mismatch = |expected: &'static str| MalformedTree::OperandMismatch {
            node,
            field: descriptor.field.clone(),
            expected,
            found: value.to_string(),
        };

        let condition = match (operator, op_type) {
            (Operator::IsMissing, _) | (Operator::Equal, OpType::Missing) => Condition::IsMissing,
            (Operator::IsNotMissing, _) | (Operator::NotEqual, OpType::Missing) => {
                Condition::IsNotMissing
            }
            (_, OpType::Missing) => return Err(mismatch("a non-null operand")),

            (Operator::Equal, OpType::Numeric) => Condition::Equal(Operand::Number(
                number(value).ok_or_else(|| mismatch("a number"))?,
            )),
            (Operator::NotEqual, OpType::Numeric) => Condition::NotEqual(Operand::Number(
                number(value).ok_or_else(|| mismatch("a number"))?,
            )),
            (Operator::Equal, OpType::String) => {
                Condition::Equal(Operand::Text(text(value).ok_or_else(|| mismatch("a string"))?))
            }
            (Operator::NotEqual, OpType::String) => {
                Condition::NotEqual(Operand::Text(text(value).ok_or_else(|| mismatch("a string"))?))
            }
            (Operator::Equal | Operator::NotEqual, OpType::List) => {
                return Err(mismatch("a single value"))
            }

            (Operator::LessThan, OpType::Numeric) => {
                Condition::LessThan(number(value).ok_or_else(|| mismatch("a number"))?)
            }
            (Operator::LessOrEqual, OpType::Numeric) => {
                Condition::LessOrEqual(number(value).ok_or_else(|| mismatch("a number"))?)
            }
            (Operator::GreaterThan, OpType::Numeric) => {
                Condition::GreaterThan(number(value).ok_or_else(|| mismatch("a number"))?)
            }
            (Operator::GreaterOrEqual, OpType::Numeric) => {
                Condition::GreaterOrEqual(number(value).ok_or_else(|| mismatch("a number"))?)
            }
            (
                Operator::LessThan
                | Operator::LessOrEqual
                | Operator::GreaterThan
                | Operator::GreaterOrEqual,
                _,
            ) => return Err(mismatch("a number")),

            (Operator::In, OpType::List) => {
                Condition::In(labels(value).ok_or_else(|| mismatch("a list of strings"))?)
            }
            (Operator::In, _) => return Err(mismatch("a list of strings")),

            (Operator::Contains, OpType::String) => {
                Condition::Contains(text(value).ok_or_else(|| mismatch("a string"))?)
            }
            (Operator::Contains, _) => return Err(mismatch("a string")),
        };

        let mut predicate = Self::new(descriptor.field.clone(), condition);
        predicate.or_missing = or_missing && predicate.operator().is_comparison();
        predicate.check(fields, node)?;
        Ok(predicate)
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn labels(value: &Value) -> Option<Vec<String>> {
    value.as_array()?.iter().map(text).collect()
}
