//! Pure condition evaluation over a JSON view of the alert context.
//!
//! Evaluation never fails: an absent field, a type mismatch or a broken
//! pattern all evaluate to `false`.

use std::sync::OnceLock;

use moka::sync::Cache;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use super::types::Condition;

const MAX_COMPILED_PATTERNS: u64 = 1024;

/// Compiled regex conditions keyed by pattern; `None` marks an invalid pattern
fn patterns() -> &'static Cache<String, Option<Regex>> {
    static PATTERNS: OnceLock<Cache<String, Option<Regex>>> = OnceLock::new();
    PATTERNS.get_or_init(|| Cache::new(MAX_COMPILED_PATTERNS))
}

fn compiled(pattern: &str, field: &str) -> Option<Regex> {
    patterns().get_with_by_ref(pattern, || match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(field = %field, "Invalid regex '{}' in routing condition: {}", pattern, e);
            None
        }
    })
}

/// Resolve a dot-path (`metadata.account.tier`, `tags.0`) against a JSON value.
///
/// JSON `null` is treated the same as a missing path.
pub fn resolve_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Numeric view of a value: numbers and numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Type-strict equality, except that numbers compare by value (`1 == 1.0`)
fn json_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => left == right,
    }
}

fn compare(actual: &Value, expected: &Value, ordering: std::cmp::Ordering) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => a.partial_cmp(&b) == Some(ordering),
        _ => false,
    }
}

/// Evaluate a single condition
pub fn evaluate(condition: &Condition, context: &Value) -> bool {
    let Some(actual) = resolve_path(context, condition.field()) else {
        return false;
    };

    match condition {
        Condition::Equals { value, .. } => json_equals(actual, value),
        Condition::NotEquals { value, .. } => !json_equals(actual, value),
        Condition::GreaterThan { value, .. } => compare(actual, value, std::cmp::Ordering::Greater),
        Condition::LessThan { value, .. } => compare(actual, value, std::cmp::Ordering::Less),
        Condition::In { values, .. } => values.iter().any(|v| json_equals(actual, v)),
        Condition::NotIn { values, .. } => !values.iter().any(|v| json_equals(actual, v)),
        Condition::Contains { value, .. } => match (actual, value) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| json_equals(item, needle)),
            _ => false,
        },
        Condition::Regex { pattern, field } => {
            let Value::String(text) = actual else {
                return false;
            };
            compiled(pattern, field).is_some_and(|re| re.is_match(text))
        }
    }
}

/// A rule matches iff every condition holds; no conditions means match
pub fn matches_all(conditions: &[Condition], context: &Value) -> bool {
    conditions.iter().all(|condition| evaluate(condition, context))
}
