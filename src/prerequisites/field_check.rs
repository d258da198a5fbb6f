use serde_json::Value;
use std::cmp::Ordering;

use super::types::Evaluation;
use crate::definition::ComparisonOperator;
use crate::process::ProcessInstance;

/// Compare a `process_data` field against an expected value.
/// A missing field is simply "not satisfied".
pub fn evaluate(
    process: &ProcessInstance,
    field: &str,
    operator: ComparisonOperator,
    expected: &Value,
) -> Evaluation {
    let Some(actual) = process.field(field) else {
        return Evaluation::unsatisfied(format!("field '{field}' is not present"));
    };

    match compare(actual, operator, expected) {
        Ok(true) => Evaluation::satisfied(format!("{field} {} check passed", describe(operator))),
        Ok(false) => Evaluation::unsatisfied(format!(
            "{field} is {actual}, expected {} {expected}",
            describe(operator)
        )),
        Err(reason) => Evaluation::unsatisfied(format!("{field}: {reason}")),
    }
}

/// Apply an operator. `Err` means the values cannot be compared that way.
pub fn compare(actual: &Value, operator: ComparisonOperator, expected: &Value) -> Result<bool, String> {
    use ComparisonOperator::*;

    match operator {
        Equals => Ok(values_equal(actual, expected)),
        NotEquals => Ok(!values_equal(actual, expected)),
        GreaterThan => order(actual, expected).map(|o| o == Ordering::Greater),
        GreaterThanOrEqual => order(actual, expected).map(|o| o != Ordering::Less),
        LessThan => order(actual, expected).map(|o| o == Ordering::Less),
        LessThanOrEqual => order(actual, expected).map(|o| o != Ordering::Greater),
        Contains => Ok(contains(actual, expected)),
        NotEmpty => Ok(not_empty(actual)),
        IsTrue => Ok(actual == &Value::Bool(true)),
        IsFalse => Ok(actual == &Value::Bool(false)),
    }
}

/// JSON equality where numbers compare by value (1 == 1.0)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn order(actual: &Value, expected: &Value) -> Result<Ordering, String> {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a
            .partial_cmp(&b)
            .ok_or_else(|| "values are not comparable".to_string());
    }
    // ISO dates and other strings compare lexicographically
    if let (Value::String(a), Value::String(b)) = (actual, expected) {
        return Ok(a.cmp(b));
    }
    Err(format!("cannot order {actual} against {expected}"))
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => match expected {
            Value::String(needle) => s.contains(needle.as_str()),
            other => s.contains(&other.to_string()),
        },
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        Value::Object(map) => expected.as_str().map(|k| map.contains_key(k)).unwrap_or(false),
        _ => false,
    }
}

fn not_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn describe(operator: ComparisonOperator) -> &'static str {
    use ComparisonOperator::*;

    match operator {
        Equals => "==",
        NotEquals => "!=",
        GreaterThan => ">",
        GreaterThanOrEqual => ">=",
        LessThan => "<",
        LessThanOrEqual => "<=",
        Contains => "contains",
        NotEmpty => "not empty",
        IsTrue => "is true",
        IsFalse => "is false",
    }
}
