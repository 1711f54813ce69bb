
use crate::runner::catalog::RawRule;
use crate::runner::constraints::collect_constraints;
use crate::runner::error::RuleError;
use crate::runner::evaluator::coerce_ids;
use crate::runner::model::{Action, ActionKind, ComparisonOperator, Condition, Rule, RuleSet};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Parses stored rule rows, skipping (and logging) any row that does not normalize.
///
/// The returned set is ordered by priority, highest first; equal priorities keep input order.
pub fn parse_rules(raw_rules: &[RawRule]) -> RuleSet {
    let mut rules = Vec::with_capacity(raw_rules.len());

    for (index, raw) in raw_rules.iter().enumerate() {
        match parse_rule(raw, index) {
            Ok(rule) => {
                debug!(rule = %rule.id, priority = rule.priority, condition = %rule.condition, "Parsed rule");
                rules.push(rule);
            }
            Err(error) => {
                warn!(rule = %raw_id(&raw.id, index), %error, "Skipping rule");
            }
        }
    }

    RuleSet::from_rules(rules)
}

/// `index` is the row's input position; a row without an id is named `#<index>`.
pub fn parse_rule(raw: &RawRule, index: usize) -> Result<Rule, RuleError> {
    let id = raw_id(&raw.id, index);

    let condition_json = decode_payload(&raw.if_this, "condition")?;
    let condition = parse_condition(&condition_json)?;

    let then_branch = decode_payload(&raw.than_that, "action")?;
    let actions = parse_actions(&then_branch)?;

    if actions.is_empty() && collect_constraints(&then_branch).is_empty() {
        return Err(RuleError::MalformedRule(format!(
            "rule '{}' has no recognized actions",
            id
        )));
    }

    Ok(Rule {
        name: raw.name.clone().unwrap_or_else(|| id.clone()),
        priority: parse_priority(&raw.priority),
        id,
        condition,
        actions,
        then_branch,
    })
}

/// Normalizes a stored condition into the canonical tree.
pub fn parse_condition(value: &Value) -> Result<Condition, RuleError> {
    match value {
        Value::Array(items) => Ok(Condition::And(parse_children(items)?)),
        Value::Object(map) => parse_condition_object(map),
        other => Err(RuleError::MalformedRule(format!(
            "condition must be an object, got {}",
            other
        ))),
    }
}

fn parse_condition_object(map: &Map<String, Value>) -> Result<Condition, RuleError> {
    if let Some(children) = map.get("and").or_else(|| map.get("_and")) {
        return Ok(Condition::And(parse_child_list(children)?));
    }
    if let Some(children) = map.get("or").or_else(|| map.get("_or")) {
        return Ok(Condition::Or(parse_child_list(children)?));
    }

    if let Some(field) = map.get("field") {
        let field = field
            .as_str()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| RuleError::MalformedRule(format!("invalid condition field: {}", field)))?;
        let operator = map
            .get("operator")
            .and_then(Value::as_str)
            .map(ComparisonOperator::from_name)
            .unwrap_or(ComparisonOperator::Eq);
        let value = map.get("value").cloned().unwrap_or(Value::Null);
        return Ok(Condition::field(field, operator, value));
    }

    // Legacy rows: only the first key becomes a condition.
    let (key, value) = map
        .iter()
        .next()
        .ok_or_else(|| RuleError::MalformedRule("empty condition object".to_string()))?;
    if map.len() > 1 {
        debug!(field = %key, ignored = map.len() - 1, "Flat condition uses first key only");
    }
    Ok(flat_condition(key, value))
}

/// `{"size": 3}` or `{"size": {"_gt": 3}}`.
fn flat_condition(field: &str, value: &Value) -> Condition {
    if let Value::Object(inner) = value {
        if inner.len() == 1 {
            if let Some((op, expected)) = inner.iter().next() {
                let operator = ComparisonOperator::from_name(op);
                if op.starts_with('_') && operator.is_known() {
                    return Condition::field(field, operator, expected.clone());
                }
            }
        }
    }
    Condition::field(field, ComparisonOperator::Eq, value.clone())
}

fn parse_child_list(children: &Value) -> Result<Vec<Condition>, RuleError> {
    match children {
        Value::Array(items) => parse_children(items),
        other => Err(RuleError::MalformedRule(format!(
            "and/or expects an array, got {}",
            other
        ))),
    }
}

fn parse_children(items: &[Value]) -> Result<Vec<Condition>, RuleError> {
    items.iter().map(parse_condition).collect()
}

/// Normalizes the stored then-branch into an ordered action list.
///
/// Filter-dialect keys (`_and`, `_in`, ...) are left for the constraint collector.
pub fn parse_actions(value: &Value) -> Result<Vec<Action>, RuleError> {
    match value {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => parse_action_object(map),
                other => {
                    warn!(action = %other, "Ignoring non-object action entry");
                    None
                }
            })
            .collect()),
        Value::Object(map) if map.contains_key("action") && map.contains_key("field") => {
            Ok(parse_action_object(map).into_iter().collect())
        }
        Value::Object(map) => Ok(parse_action_mapping(map)),
        other => Err(RuleError::MalformedRule(format!(
            "actions must be an object or array, got {}",
            other
        ))),
    }
}

/// `{"action": "disable", "field": "size", "options": [1, 2]}`
fn parse_action_object(map: &Map<String, Value>) -> Option<Action> {
    let name = map.get("action").and_then(Value::as_str)?;
    let field = map.get("field").and_then(Value::as_str)?;
    let kind = lookup_action(name)?;

    let payload = if kind.takes_options() {
        ["options", "option_ids", "values", "value"]
            .iter()
            .find_map(|key| map.get(*key))
    } else {
        map.get("value")
    };
    Some(build_action(kind, field, payload))
}

/// `{"mirror_styles": "disable"}` or `{"mirror_styles": {"disable": [4, 5]}}`
fn parse_action_mapping(map: &Map<String, Value>) -> Vec<Action> {
    let mut actions = Vec::new();

    for (field, shorthand) in map {
        if field.starts_with('_') {
            continue;
        }
        match shorthand {
            Value::String(name) => {
                if let Some(kind) = lookup_action(name) {
                    actions.push(build_action(kind, field, None));
                }
            }
            Value::Object(inner) => {
                for (name, payload) in inner {
                    if name.starts_with('_') {
                        continue;
                    }
                    if let Some(kind) = lookup_action(name) {
                        actions.push(build_action(kind, field, Some(payload)));
                    }
                }
            }
            other => warn!(field = %field, action = %other, "Ignoring unrecognized action shape"),
        }
    }

    actions
}

fn lookup_action(name: &str) -> Option<ActionKind> {
    let kind = ActionKind::from_name(name);
    if kind.is_none() {
        warn!(error = %RuleError::UnknownAction(name.to_string()), "Action ignored");
    }
    kind
}

fn build_action(kind: ActionKind, field: &str, payload: Option<&Value>) -> Action {
    let field = field.to_string();
    let option_ids = || payload.map(coerce_ids).unwrap_or_default();

    match kind {
        ActionKind::Disable => Action::Disable { field, option_ids: option_ids() },
        ActionKind::Enable => Action::Enable { field, option_ids: option_ids() },
        ActionKind::Hide => Action::Hide { field, option_ids: option_ids() },
        ActionKind::Show => Action::Show { field, option_ids: option_ids() },
        ActionKind::Require => Action::Require { field },
        ActionKind::SetValue => Action::SetValue {
            field,
            value: payload.cloned().unwrap_or(Value::Null),
        },
        ActionKind::ClearValue => Action::ClearValue { field },
    }
}

/// Stored payloads may be JSON text rather than JSON.
fn decode_payload(value: &Value, what: &str) -> Result<Value, RuleError> {
    match value {
        Value::Null => Err(RuleError::MalformedRule(format!("missing {} payload", what))),
        Value::String(text) if text.trim().is_empty() => {
            Err(RuleError::MalformedRule(format!("empty {} payload", what)))
        }
        Value::String(text) => serde_json::from_str(text).map_err(|e| {
            RuleError::MalformedRule(format!("{} payload is not valid JSON: {}", what, e))
        }),
        other => Ok(other.clone()),
    }
}

fn parse_priority(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn raw_id(id: &Value, fallback: usize) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => format!("#{}", fallback),
        other => other.to_string(),
    }
}
