use crate::domain::context::ExecutionContext;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison operator used in step gate conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// Values are equal
    #[serde(rename = "=")]
    Equals,

    /// Values differ, or the field is absent
    #[serde(rename = "!=")]
    NotEquals,

    /// Numeric greater-than
    #[serde(rename = ">")]
    GreaterThan,

    /// Numeric less-than
    #[serde(rename = "<")]
    LessThan,

    /// Substring match on strings, membership on arrays
    #[serde(rename = "contains")]
    Contains,

    /// Field is present and non-null
    #[serde(rename = "exists")]
    Exists,
}

/// One gate condition on a step.
///
/// The field is a dotted path resolved against the execution context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Dotted path into the execution context
    pub field: String,

    /// Comparison to apply
    pub operator: ConditionOperator,

    /// Expected value; unused by `exists`
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,
}

impl Condition {
    /// Shorthand for an equality condition.
    pub fn equals(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            operator: ConditionOperator::Equals,
            value,
        }
    }

    /// Evaluate this condition against the execution context.
    ///
    /// An absent field satisfies only `!=`; ordering comparisons on
    /// non-numeric values are false rather than errors.
    pub fn evaluate(&self, context: &ExecutionContext) -> bool {
        let actual = context.lookup(&self.field);
        match self.operator {
            ConditionOperator::Exists => actual.map(|value| !value.is_null()).unwrap_or(false),
            ConditionOperator::Equals => actual
                .map(|value| values_equal(&value, &self.value))
                .unwrap_or(false),
            ConditionOperator::NotEquals => actual
                .map(|value| !values_equal(&value, &self.value))
                .unwrap_or(true),
            ConditionOperator::GreaterThan => {
                compare_numeric(actual.as_ref(), &self.value, Ordering::Greater)
            }
            ConditionOperator::LessThan => {
                compare_numeric(actual.as_ref(), &self.value, Ordering::Less)
            }
            ConditionOperator::Contains => contains(actual.as_ref(), &self.value),
        }
    }

    /// Evaluate a condition list as a logical AND.
    ///
    /// An empty list always holds.
    pub fn all_hold(conditions: &[Condition], context: &ExecutionContext) -> bool {
        conditions.iter().all(|condition| condition.evaluate(context))
    }
}

// Numbers compare by value so that 75 and 75.0 are interchangeable
pub(crate) fn values_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => a == b,
    }
}

fn compare_numeric(
    actual: Option<&serde_json::Value>,
    expected: &serde_json::Value,
    wanted: Ordering,
) -> bool {
    let (Some(actual), Some(expected)) = (actual.and_then(|v| v.as_f64()), expected.as_f64())
    else {
        return false;
    };
    actual.partial_cmp(&expected) == Some(wanted)
}

fn contains(actual: Option<&serde_json::Value>, expected: &serde_json::Value) -> bool {
    match actual {
        Some(serde_json::Value::String(haystack)) => expected
            .as_str()
            .map(|needle| haystack.contains(needle))
            .unwrap_or(false),
        Some(serde_json::Value::Array(items)) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}
