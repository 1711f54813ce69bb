
use crate::runner::evaluator::{coerce_ids, evaluate_condition};
use crate::runner::model::{
    Configuration, ConstraintSet, MergeMode, OptionId, Rule, RuleConstraints, RuleSet,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Schema keys that name the same attribute under two spellings.
const FIELD_ALIASES: &[(&str, &str)] = &[("mounting_option", "mounting")];

pub fn normalize_field_name(field: &str) -> &str {
    FIELD_ALIASES
        .iter()
        .find(|(raw, _)| *raw == field)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(field)
}

/// Folds the constraints of every currently matching rule, lowest priority first,
/// with AND semantics between rules.
pub fn build_rule_constraints(rule_set: &RuleSet, configuration: &Configuration) -> RuleConstraints {
    let mut matched: Vec<&Rule> = rule_set
        .iter()
        .filter(|rule| evaluate_condition(&rule.condition, configuration))
        .collect();
    matched.sort_by_key(|rule| rule.priority);

    let mut constraints = RuleConstraints::new();
    for rule in matched {
        let rule_constraints = collect_constraints(&rule.then_branch);
        if !rule_constraints.is_empty() {
            debug!(rule = %rule.id, fields = rule_constraints.len(), "Folding rule constraints");
        }
        merge_rule_constraints(&mut constraints, &rule_constraints, MergeMode::And);
    }
    constraints
}

/// Extracts per-field allow/deny sets from a filter-style then-branch.
///
/// `_eq`/`_in` feed `allow`, `_neq`/`_nin` feed `deny`; other keys are ignored.
pub fn collect_constraints(node: &Value) -> RuleConstraints {
    let mut constraints = RuleConstraints::new();
    collect_into(node, MergeMode::And, &mut constraints);
    constraints
}

fn collect_into(node: &Value, mode: MergeMode, acc: &mut RuleConstraints) {
    match node {
        Value::Array(children) => {
            for child in children {
                collect_into(child, MergeMode::And, acc);
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                match key.as_str() {
                    "_and" => {
                        if let Value::Array(children) = value {
                            for child in children {
                                collect_into(child, MergeMode::And, acc);
                            }
                        }
                    }
                    "_or" => {
                        if let Value::Array(branches) = value {
                            let combined = collect_or_branches(branches);
                            merge_rule_constraints(acc, &combined, mode);
                        }
                    }
                    field => {
                        if let Some(constraint) = field_constraint(value) {
                            let mut single = RuleConstraints::new();
                            single.insert(normalize_field_name(field).to_string(), constraint);
                            merge_rule_constraints(acc, &single, mode);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn collect_or_branches(branches: &[Value]) -> RuleConstraints {
    let mut branches = branches.iter().map(collect_constraints);
    let mut combined = branches.next().unwrap_or_default();
    for branch_constraints in branches {
        merge_rule_constraints(&mut combined, &branch_constraints, MergeMode::Or);
    }
    combined
}

fn field_constraint(value: &Value) -> Option<ConstraintSet> {
    let Value::Object(ops) = value else {
        return None;
    };

    let mut result: Option<ConstraintSet> = None;
    for (op, operand) in ops {
        let ids = coerce_ids(operand);
        if ids.is_empty() {
            continue;
        }
        let constraint = match op.as_str() {
            "_eq" | "_in" => ConstraintSet::allow(ids),
            "_neq" | "_nin" => ConstraintSet::deny(ids),
            _ => continue,
        };
        result = Some(match result {
            Some(existing) => merge_constraint_sets(&existing, &constraint, MergeMode::And),
            None => constraint,
        });
    }
    result
}

/// AND intersects allow-sets, OR unions them; deny-sets always union.
/// A missing allow-set places no restriction: AND keeps the other side, OR drops the allow-set.
pub fn merge_constraint_sets(a: &ConstraintSet, b: &ConstraintSet, mode: MergeMode) -> ConstraintSet {
    let allow = match (&a.allow, &b.allow) {
        (Some(left), Some(right)) => Some(match mode {
            MergeMode::And => left.intersection(right).copied().collect(),
            MergeMode::Or => left.union(right).copied().collect(),
        }),
        (Some(only), None) | (None, Some(only)) => match mode {
            MergeMode::And => Some(only.clone()),
            MergeMode::Or => None,
        },
        (None, None) => None,
    };

    let deny = match (&a.deny, &b.deny) {
        (Some(left), Some(right)) => Some(left.union(right).copied().collect()),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    };

    ConstraintSet { allow, deny }
}

/// Per-field merge. Under OR a field missing from one side is unrestricted on that side,
/// so its allow-set is dropped; fields left with no restriction are removed.
pub fn merge_rule_constraints(acc: &mut RuleConstraints, other: &RuleConstraints, mode: MergeMode) {
    if mode == MergeMode::Or {
        let unrestricted = ConstraintSet::default();
        let fields: BTreeSet<String> = acc.keys().chain(other.keys()).cloned().collect();
        for field in fields {
            let merged = merge_constraint_sets(
                acc.get(&field).unwrap_or(&unrestricted),
                other.get(&field).unwrap_or(&unrestricted),
                mode,
            );
            if merged.is_unrestricted() {
                acc.remove(&field);
            } else {
                acc.insert(field, merged);
            }
        }
        return;
    }

    for (field, constraint) in other {
        let merged = match acc.get(field) {
            Some(existing) => merge_constraint_sets(existing, constraint, mode),
            None => constraint.clone(),
        };
        acc.insert(field.clone(), merged);
    }
}

/// Narrows each field's ids by its constraint.
///
/// Ids come from `current_ids`, falling back to `all_ids_lookup`, then to the allow-set itself.
/// Deny is applied last and removes ids unconditionally.
pub fn apply_constraints_to_ids(
    current_ids: &BTreeMap<String, Vec<OptionId>>,
    constraints: &RuleConstraints,
    all_ids_lookup: &BTreeMap<String, Vec<OptionId>>,
) -> BTreeMap<String, Vec<OptionId>> {
    let mut filtered = current_ids.clone();

    for (field, constraint) in constraints {
        let base: Vec<OptionId> = current_ids
            .get(field)
            .or_else(|| all_ids_lookup.get(field))
            .cloned()
            .or_else(|| constraint.allow.as_ref().map(|a| a.iter().copied().collect()))
            .unwrap_or_default();

        let narrowed = base.into_iter().filter(|id| constraint.permits(*id)).collect();
        filtered.insert(field.clone(), narrowed);
    }

    filtered
}

/// Fields whose allow-set narrows to exactly one permitted id.
pub fn forced_values(constraints: &RuleConstraints) -> BTreeMap<String, OptionId> {
    constraints
        .iter()
        .filter_map(|(field, constraint)| {
            let allowed: BTreeSet<OptionId> = constraint
                .allow
                .as_ref()?
                .iter()
                .copied()
                .filter(|id| constraint.permits(*id))
                .collect();
            match allowed.len() {
                1 => allowed.into_iter().next().map(|id| (field.clone(), id)),
                _ => None,
            }
        })
        .collect()
}
