
use crate::runner::model::ComparisonOperator;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize, Clone, Default)]
pub struct RuleSetTrace {
    pub execution: Vec<RuleTrace>,
}

impl RuleSetTrace {
    pub fn matched_rule_ids(&self) -> Vec<&str> {
        self.execution
            .iter()
            .filter(|trace| trace.matched)
            .map(|trace| trace.rule_id.as_str())
            .collect()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct RuleTrace {
    pub rule_id: String,
    pub name: String,
    pub priority: i64,
    pub condition: ConditionTrace,
    pub matched: bool,
    pub actions_applied: usize,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConditionTrace {
    Field(FieldTrace),
    And { children: Vec<ConditionTrace>, result: bool },
    Or { children: Vec<ConditionTrace>, result: bool },
}

impl ConditionTrace {
    pub fn result(&self) -> bool {
        match self {
            ConditionTrace::Field(field) => field.result,
            ConditionTrace::And { result, .. } | ConditionTrace::Or { result, .. } => *result,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct FieldTrace {
    pub field: String,
    pub operator: ComparisonOperator,
    pub expected: TypedValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<TypedValue>,
    pub result: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    #[serde(rename = "type")]
    pub value_type: String,
}

impl From<&Value> for TypedValue {
    fn from(value: &Value) -> Self {
        let value_type = match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "object",
        };
        TypedValue {
            value: value.clone(),
            value_type: value_type.to_string(),
        }
    }
}
