//! Condition evaluation against contact data.
//!
//! A condition tests one attribute against a comparison value. Evaluation
//! never fails: malformed configuration, absent attributes, and incomparable
//! values all degrade to `false` so a condition node can never crash a run.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Comparison operators for condition nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
}

/// Evaluates a condition against an attribute map.
///
/// Returns `false` whenever the attribute is absent or the values cannot be
/// compared under the given operator. Never a match on absent data.
#[must_use]
pub fn evaluate(
    data: &HashMap<String, JsonValue>,
    field: &str,
    operator: ConditionOperator,
    expected: &JsonValue,
) -> bool {
    let Some(actual) = data.get(field) else {
        return false;
    };

    match operator {
        ConditionOperator::Equals => values_equal(actual, expected),
        ConditionOperator::NotEquals => !values_equal(actual, expected),
        ConditionOperator::Contains => contains(actual, expected),
        ConditionOperator::Gt => {
            compare(actual, expected).is_some_and(|o| o == Ordering::Greater)
        }
        ConditionOperator::Lt => compare(actual, expected).is_some_and(|o| o == Ordering::Less),
        ConditionOperator::Gte => {
            compare(actual, expected).is_some_and(|o| o != Ordering::Less)
        }
        ConditionOperator::Lte => {
            compare(actual, expected).is_some_and(|o| o != Ordering::Greater)
        }
        ConditionOperator::In => member_of(expected, actual),
        ConditionOperator::NotIn => {
            matches!(expected, JsonValue::Array(_)) && !member_of(expected, actual)
        }
    }
}

/// Equality with numeric coercion: `1` equals `1.0`.
fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

/// Substring match for strings, membership for arrays.
fn contains(actual: &JsonValue, expected: &JsonValue) -> bool {
    match actual {
        JsonValue::String(haystack) => expected
            .as_str()
            .is_some_and(|needle| haystack.contains(needle)),
        JsonValue::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

/// Ordering for numbers (numeric) and strings (lexicographic).
fn compare(actual: &JsonValue, expected: &JsonValue) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (actual.as_f64(), expected.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (JsonValue::String(x), JsonValue::String(y)) = (actual, expected) {
        return Some(x.as_str().cmp(y.as_str()));
    }
    None
}

/// Membership of `actual` in the `expected` array.
fn member_of(expected: &JsonValue, actual: &JsonValue) -> bool {
    expected
        .as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(item, actual)))
}
