
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Flat selection record: attribute field name to scalar or array value.
pub type Configuration = HashMap<String, Value>;

pub type OptionId = i64;

/// Per-field constraints produced by the constraint collector.
pub type RuleConstraints = BTreeMap<String, ConstraintSet>;

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOperator {
    Eq,
    Neq,
    In,
    Nin,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NContains,
    Empty,
    NEmpty,
    Unknown(String),
}

impl ComparisonOperator {
    /// Accepts both the plain (`eq`) and filter-dialect (`_eq`) spellings.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().trim_start_matches('_').to_lowercase();
        match normalized.as_str() {
            "eq" => ComparisonOperator::Eq,
            "neq" | "ne" => ComparisonOperator::Neq,
            "in" => ComparisonOperator::In,
            "nin" | "not_in" => ComparisonOperator::Nin,
            "gt" => ComparisonOperator::Gt,
            "gte" => ComparisonOperator::Gte,
            "lt" => ComparisonOperator::Lt,
            "lte" => ComparisonOperator::Lte,
            "contains" => ComparisonOperator::Contains,
            "ncontains" | "not_contains" => ComparisonOperator::NContains,
            "empty" => ComparisonOperator::Empty,
            "nempty" | "not_empty" => ComparisonOperator::NEmpty,
            _ => ComparisonOperator::Unknown(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::Neq => "neq",
            ComparisonOperator::In => "in",
            ComparisonOperator::Nin => "nin",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Contains => "contains",
            ComparisonOperator::NContains => "ncontains",
            ComparisonOperator::Empty => "empty",
            ComparisonOperator::NEmpty => "nempty",
            ComparisonOperator::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ComparisonOperator::Unknown(_))
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ComparisonOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCondition {
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Field(FieldCondition),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn field(field: &str, operator: ComparisonOperator, value: Value) -> Self {
        Condition::Field(FieldCondition {
            field: field.to_string(),
            operator,
            value,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Field(c) => write!(f, "{} {} {}", c.field, c.operator, c.value),
            Condition::And(children) | Condition::Or(children) => {
                let joiner = if matches!(self, Condition::And(_)) { " and " } else { " or " };
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", joiner)?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Disable,
    Enable,
    Hide,
    Show,
    Require,
    SetValue,
    ClearValue,
}

impl ActionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "disable" => Some(ActionKind::Disable),
            "enable" => Some(ActionKind::Enable),
            "hide" => Some(ActionKind::Hide),
            "show" => Some(ActionKind::Show),
            "require" => Some(ActionKind::Require),
            "set_value" | "set" => Some(ActionKind::SetValue),
            "clear_value" | "clear" => Some(ActionKind::ClearValue),
            _ => None,
        }
    }

    /// Kinds that target a list of option ids.
    pub fn takes_options(&self) -> bool {
        matches!(
            self,
            ActionKind::Disable | ActionKind::Enable | ActionKind::Hide | ActionKind::Show
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Disable { field: String, option_ids: Vec<OptionId> },
    Enable { field: String, option_ids: Vec<OptionId> },
    Hide { field: String, option_ids: Vec<OptionId> },
    Show { field: String, option_ids: Vec<OptionId> },
    Require { field: String },
    SetValue { field: String, value: Value },
    ClearValue { field: String },
}

impl Action {
    pub fn field(&self) -> &str {
        match self {
            Action::Disable { field, .. }
            | Action::Enable { field, .. }
            | Action::Hide { field, .. }
            | Action::Show { field, .. }
            | Action::Require { field }
            | Action::SetValue { field, .. }
            | Action::ClearValue { field } => field,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Disable { .. } => ActionKind::Disable,
            Action::Enable { .. } => ActionKind::Enable,
            Action::Hide { .. } => ActionKind::Hide,
            Action::Show { .. } => ActionKind::Show,
            Action::Require { .. } => ActionKind::Require,
            Action::SetValue { .. } => ActionKind::SetValue,
            Action::ClearValue { .. } => ActionKind::ClearValue,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub priority: i64,
    pub condition: Condition,
    pub actions: Vec<Action>,
    /// The then-branch exactly as stored, read by the constraint collector.
    pub then_branch: Value,
}

/// Parsed rules in evaluation order (priority descending, ties in input order).
#[derive(Debug, Default, Clone)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    id_map: HashMap<String, usize>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet {
            rules: Vec::new(),
            id_map: HashMap::new(),
        }
    }

    pub fn from_rules(mut rules: Vec<Rule>) -> Self {
        // sort_by is stable, so equal priorities keep their input order
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        let mut rule_set = RuleSet::new();
        for rule in rules {
            rule_set.add_rule(rule);
        }
        rule_set
    }

    /// Appends without re-sorting; callers building by hand own the order.
    pub fn add_rule(&mut self, rule: Rule) {
        let index = self.rules.len();
        self.id_map.insert(rule.id.clone(), index);
        self.rules.push(rule);
    }

    pub fn get_rule(&self, id: &str) -> Option<&Rule> {
        self.id_map.get(id).map(|&index| &self.rules[index])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluationResult {
    pub disabled_options: BTreeMap<String, BTreeSet<OptionId>>,
    pub hidden_options: BTreeMap<String, BTreeSet<OptionId>>,
    pub required_fields: BTreeSet<String>,
    pub set_values: BTreeMap<String, Value>,
    pub cleared_fields: BTreeSet<String>,
}

impl RuleEvaluationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_disabled(&self, field: &str, id: OptionId) -> bool {
        self.disabled_options
            .get(field)
            .is_some_and(|ids| ids.contains(&id))
    }

    pub fn is_hidden(&self, field: &str, id: OptionId) -> bool {
        self.hidden_options
            .get(field)
            .is_some_and(|ids| ids.contains(&id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConstraintSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<BTreeSet<OptionId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny: Option<BTreeSet<OptionId>>,
}

impl ConstraintSet {
    pub fn allow<I: IntoIterator<Item = OptionId>>(ids: I) -> Self {
        ConstraintSet {
            allow: Some(ids.into_iter().collect()),
            deny: None,
        }
    }

    pub fn deny<I: IntoIterator<Item = OptionId>>(ids: I) -> Self {
        ConstraintSet {
            allow: None,
            deny: Some(ids.into_iter().collect()),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allow.is_none() && self.deny.as_ref().map_or(true, |d| d.is_empty())
    }

    /// Whether `id` survives this constraint; deny always wins over allow.
    pub fn permits(&self, id: OptionId) -> bool {
        if self.deny.as_ref().is_some_and(|d| d.contains(&id)) {
            return false;
        }
        self.allow.as_ref().map_or(true, |a| a.contains(&id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    And,
    Or,
}
