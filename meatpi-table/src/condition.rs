//! Filter predicate builder.
//!
//! Conditions are OData filter strings of the form `property op literal`.
//! Several conditions are folded into one with [`combine`], which nests
//! left-to-right so the rendered string is identical to what the Azure
//! storage SDKs produce for the same inputs.

use crate::entity::EdmValue;
use crate::error::{TableError, TableResult};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::warn;

/// A single filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition(String);

impl Condition {
    /// Wraps an already rendered filter expression. Nothing is validated;
    /// malformed expressions are reported by the backend.
    pub fn raw(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// Renders `property op literal` for one of the comparison operators.
    pub fn compare(property: &str, op: ComparisonOp, value: impl Into<EdmValue>) -> Self {
        Self(format!(
            "{} {} {}",
            property,
            op.as_str(),
            format_literal(&value.into())
        ))
    }

    /// Renders a string function predicate such as `startswith(Name,'ab')`.
    ///
    /// Azure Table storage does not evaluate these functions server-side and
    /// rejects the query; they are only useful against backends that do.
    pub fn string_match(property: &str, op: StringOp, value: &str) -> Self {
        warn!(
            property,
            operator = op.as_str(),
            "string operator filters are not evaluated by Azure Table storage"
        );
        Self(format!(
            "{}({},{})",
            op.as_str(),
            property,
            format_literal(&EdmValue::String(value.to_string()))
        ))
    }

    /// Renders a predicate for any operator of [`QueryOperator::ALL`].
    ///
    /// String operators only accept string literals.
    pub fn generate(
        property: &str,
        op: QueryOperator,
        value: impl Into<EdmValue>,
    ) -> TableResult<Self> {
        match op {
            QueryOperator::Comparison(op) => Ok(Self::compare(property, op, value)),
            QueryOperator::String(op) => match value.into() {
                EdmValue::String(s) => Ok(Self::string_match(property, op, &s)),
                other => Err(TableError::invalid_argument(
                    "value",
                    format!(
                        "`{}` requires a string literal, got {}",
                        op.as_str(),
                        other.edm_type()
                    ),
                )),
            },
        }
    }

    /// `property eq value`
    pub fn eq(property: &str, value: impl Into<EdmValue>) -> Self {
        Self::compare(property, ComparisonOp::Equal, value)
    }

    /// `property gt value`
    pub fn gt(property: &str, value: impl Into<EdmValue>) -> Self {
        Self::compare(property, ComparisonOp::GreaterThan, value)
    }

    /// `property ge value`
    pub fn ge(property: &str, value: impl Into<EdmValue>) -> Self {
        Self::compare(property, ComparisonOp::GreaterThanOrEqual, value)
    }

    /// `property lt value`
    pub fn lt(property: &str, value: impl Into<EdmValue>) -> Self {
        Self::compare(property, ComparisonOp::LessThan, value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Self::raw(s)
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        Self::raw(s)
    }
}

/// Comparison operators evaluated server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl ComparisonOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "eq",
            ComparisonOp::NotEqual => "ne",
            ComparisonOp::GreaterThan => "gt",
            ComparisonOp::GreaterThanOrEqual => "ge",
            ComparisonOp::LessThan => "lt",
            ComparisonOp::LessThanOrEqual => "le",
        }
    }
}

/// String function operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringOp {
    StartsWith,
    EndsWith,
    Contains,
}

impl StringOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            StringOp::StartsWith => "startswith",
            StringOp::EndsWith => "endswith",
            StringOp::Contains => "contains",
        }
    }
}

/// Any operator a condition can be generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOperator {
    Comparison(ComparisonOp),
    String(StringOp),
}

impl QueryOperator {
    /// The built-in comparison operators.
    pub const COMPARISONS: [QueryOperator; 6] = [
        QueryOperator::Comparison(ComparisonOp::Equal),
        QueryOperator::Comparison(ComparisonOp::GreaterThan),
        QueryOperator::Comparison(ComparisonOp::GreaterThanOrEqual),
        QueryOperator::Comparison(ComparisonOp::LessThan),
        QueryOperator::Comparison(ComparisonOp::LessThanOrEqual),
        QueryOperator::Comparison(ComparisonOp::NotEqual),
    ];

    /// The string function operators.
    pub const STRING_OPERATORS: [QueryOperator; 3] = [
        QueryOperator::String(StringOp::StartsWith),
        QueryOperator::String(StringOp::EndsWith),
        QueryOperator::String(StringOp::Contains),
    ];

    /// Comparison operators followed by string operators.
    pub const ALL: [QueryOperator; 9] = [
        QueryOperator::Comparison(ComparisonOp::Equal),
        QueryOperator::Comparison(ComparisonOp::GreaterThan),
        QueryOperator::Comparison(ComparisonOp::GreaterThanOrEqual),
        QueryOperator::Comparison(ComparisonOp::LessThan),
        QueryOperator::Comparison(ComparisonOp::LessThanOrEqual),
        QueryOperator::Comparison(ComparisonOp::NotEqual),
        QueryOperator::String(StringOp::StartsWith),
        QueryOperator::String(StringOp::EndsWith),
        QueryOperator::String(StringOp::Contains),
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            QueryOperator::Comparison(op) => op.as_str(),
            QueryOperator::String(op) => op.as_str(),
        }
    }

    pub const fn is_string_operator(self) -> bool {
        matches!(self, QueryOperator::String(_))
    }

    /// Parses the wire name of an operator (`eq`, `startswith`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

/// Boolean combinator between two conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
        }
    }
}

/// Joins two conditions: `(left) op (right)`.
pub fn combine_filters(left: &Condition, op: LogicalOperator, right: &Condition) -> Condition {
    Condition(format!("({}) {} ({})", left.0, op.as_str(), right.0))
}

/// Folds conditions left to right into a single condition.
///
/// Returns `None` for an empty input and the element itself for a single
/// condition; otherwise `((c1 op c2) op c3) ...`.
pub fn combine<I>(op: LogicalOperator, conditions: I) -> Option<Condition>
where
    I: IntoIterator,
    I::Item: Into<Condition>,
{
    conditions
        .into_iter()
        .map(Into::into)
        .reduce(|acc, next| combine_filters(&acc, op, &next))
}

/// Renders a literal the way the filter grammar expects it.
pub fn format_literal(value: &EdmValue) -> String {
    match value {
        EdmValue::String(s) => format!("'{}'", s.replace('\'', "''")),
        EdmValue::Int32(v) => v.to_string(),
        EdmValue::Int64(v) => format!("{v}L"),
        EdmValue::Double(v) => format_double(*v),
        EdmValue::Boolean(v) => v.to_string(),
        EdmValue::DateTime(dt) => format!("datetime'{}'", format_datetime(dt)),
        EdmValue::Guid(g) => format!("guid'{}'", g.hyphenated()),
        EdmValue::Binary(bytes) => format!("X'{}'", hex::encode(bytes)),
    }
}

/// Round-trip ISO-8601 with seven fractional digits, as the service emits.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    format!(
        "{}.{:07}Z",
        dt.format("%Y-%m-%dT%H:%M:%S"),
        dt.timestamp_subsec_nanos() / 100
    )
}

fn format_double(v: f64) -> String {
    let s = v.to_string();
    if v.is_finite() && !s.contains(['.', 'e', 'E']) {
        format!("{s}.0")
    } else {
        s
    }
}
