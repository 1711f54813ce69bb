
use crate::runner::error::RuleError;
use crate::runner::model::{ComparisonOperator, Condition, Configuration, FieldCondition, OptionId};
use crate::runner::trace::{ConditionTrace, FieldTrace, TypedValue};
use serde_json::Value;
use tracing::warn;

/// Evaluates a condition tree against a configuration snapshot.
///
/// Missing fields read as absent, never as an error; unknown operators evaluate to `false`.
pub fn evaluate_condition(condition: &Condition, configuration: &Configuration) -> bool {
    match condition {
        // vacuous truth for an empty list
        Condition::And(children) => children
            .iter()
            .all(|child| evaluate_condition(child, configuration)),
        Condition::Or(children) => children
            .iter()
            .any(|child| evaluate_condition(child, configuration)),
        Condition::Field(field_condition) => {
            evaluate_field_condition(field_condition, configuration.get(&field_condition.field))
        }
    }
}

/// Same result as [`evaluate_condition`], recording every leaf. Does not short-circuit.
pub fn evaluate_condition_with_trace(
    condition: &Condition,
    configuration: &Configuration,
) -> ConditionTrace {
    match condition {
        Condition::And(children) => {
            let children: Vec<ConditionTrace> = children
                .iter()
                .map(|child| evaluate_condition_with_trace(child, configuration))
                .collect();
            let result = children.iter().all(ConditionTrace::result);
            ConditionTrace::And { children, result }
        }
        Condition::Or(children) => {
            let children: Vec<ConditionTrace> = children
                .iter()
                .map(|child| evaluate_condition_with_trace(child, configuration))
                .collect();
            let result = children.iter().any(ConditionTrace::result);
            ConditionTrace::Or { children, result }
        }
        Condition::Field(field_condition) => {
            let actual = configuration.get(&field_condition.field);
            ConditionTrace::Field(FieldTrace {
                field: field_condition.field.clone(),
                operator: field_condition.operator.clone(),
                expected: TypedValue::from(&field_condition.value),
                actual: actual.map(TypedValue::from),
                result: evaluate_field_condition(field_condition, actual),
            })
        }
    }
}

pub fn evaluate_field_condition(condition: &FieldCondition, actual: Option<&Value>) -> bool {
    evaluate_comparison(actual, &condition.operator, &condition.value)
}

pub(crate) fn evaluate_comparison(
    actual: Option<&Value>,
    operator: &ComparisonOperator,
    expected: &Value,
) -> bool {
    use ComparisonOperator::*;

    match operator {
        Eq => compare_equal(actual, expected),
        Neq => !compare_equal(actual, expected),
        In => compare_in_list(actual, expected),
        Nin => !compare_in_list(actual, expected),
        Gt => compare_numbers(actual, expected, |l, r| l > r),
        Gte => compare_numbers(actual, expected, |l, r| l >= r),
        Lt => compare_numbers(actual, expected, |l, r| l < r),
        Lte => compare_numbers(actual, expected, |l, r| l <= r),
        Contains => compare_contains(actual, expected),
        NContains => !compare_contains(actual, expected),
        Empty => is_empty_value(actual),
        NEmpty => !is_empty_value(actual),
        Unknown(name) => {
            warn!(
                error = %RuleError::UnknownOperator(name.clone()),
                "Condition evaluates to false"
            );
            false
        }
    }
}

// Multi-select values match when any element matches.
fn compare_equal(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| loose_eq(Some(item), expected))
        }
        _ => loose_eq(actual, expected),
    }
}

fn compare_in_list(actual: Option<&Value>, expected: &Value) -> bool {
    let Value::Array(candidates) = expected else {
        warn!(value = %expected, "in/nin expects an array value");
        return false;
    };

    match actual {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| candidates.iter().any(|c| loose_eq(Some(item), c))),
        _ => candidates.iter().any(|c| loose_eq(actual, c)),
    }
}

fn compare_numbers(actual: Option<&Value>, expected: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    let left = to_number(actual);
    let right = to_number(Some(expected));
    // NaN never compares
    cmp(left, right)
}

fn compare_contains(actual: Option<&Value>, expected: &Value) -> bool {
    to_plain_string(actual).contains(&to_plain_string(Some(expected)))
}

/// Loose equality shared by every comparison that matches ids.
///
/// Absent and `null` are equal to each other only; numbers compare to numeric strings by value;
/// booleans compare as `1`/`0`; arrays compare to scalars through their joined string form.
pub fn loose_eq(left: Option<&Value>, right: &Value) -> bool {
    let left = left.unwrap_or(&Value::Null);
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            to_number(Some(left)) == to_number(Some(right))
        }
        (Value::Bool(b), other) | (other, Value::Bool(b)) => {
            let as_number = Value::from(if *b { 1 } else { 0 });
            match other {
                Value::Bool(o) => o == b,
                _ => loose_eq(Some(&as_number), other),
            }
        }
        (Value::Array(_), Value::Number(_) | Value::String(_))
        | (Value::Number(_) | Value::String(_), Value::Array(_)) => {
            let l = Value::String(to_plain_string(Some(left)));
            let r = Value::String(to_plain_string(Some(right)));
            match (left, right) {
                (Value::Number(_), _) => loose_eq(Some(left), &r),
                (_, Value::Number(_)) => loose_eq(Some(&l), right),
                _ => l == r,
            }
        }
        _ => left == right,
    }
}

/// Numeric coercion: absent is NaN, `null` and `""` are 0, booleans are 1/0.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(Some(single)),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

/// String coercion used by `contains`; absent and `null` read as the empty string.
pub fn to_plain_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| to_plain_string(Some(item)))
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

/// Falsy values, the empty string and the empty array are empty.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f == 0.0 || f.is_nan()),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(_)) => false,
    }
}

/// Integer id coercion; non-numeric and non-finite values yield `None`.
pub fn coerce_id(value: &Value) -> Option<OptionId> {
    if let Some(exact) = value.as_i64() {
        return Some(exact);
    }
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_finite() {
        Some(number.trunc() as OptionId)
    } else {
        None
    }
}

/// Collects every coercible id from a scalar or array value.
pub fn coerce_ids(value: &Value) -> Vec<OptionId> {
    match value {
        Value::Array(items) => items.iter().filter_map(coerce_id).collect(),
        other => coerce_id(other).into_iter().collect(),
    }
}
