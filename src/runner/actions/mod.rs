mod lib;

use crate::runner::model::{Action, Configuration, OptionId, RuleEvaluationResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Applies actions in authored order to the accumulator.
pub fn apply_actions(actions: &[Action], result: &mut RuleEvaluationResult) {
    for action in actions {
        apply_action(action, result);
    }
}

pub fn apply_action(action: &Action, result: &mut RuleEvaluationResult) {
    trace!(field = %action.field(), kind = ?action.kind(), "Applying action");
    match action {
        Action::Disable { field, option_ids } => {
            add_ids(&mut result.disabled_options, field, option_ids)
        }
        Action::Hide { field, option_ids } => add_ids(&mut result.hidden_options, field, option_ids),
        Action::Enable { field, option_ids } => {
            remove_ids(&mut result.disabled_options, field, option_ids)
        }
        Action::Show { field, option_ids } => {
            remove_ids(&mut result.hidden_options, field, option_ids)
        }
        Action::Require { field } => {
            result.required_fields.insert(field.clone());
        }
        Action::SetValue { field, value } => {
            result.set_values.insert(field.clone(), value.clone());
        }
        Action::ClearValue { field } => {
            result.cleared_fields.insert(field.clone());
        }
    }
}

/// Writes value-changing actions through to a working configuration.
///
/// Used by sequential evaluation so later rules observe earlier overrides.
pub fn apply_to_configuration(actions: &[Action], configuration: &mut Configuration) {
    for action in actions {
        match action {
            Action::SetValue { field, value } => {
                configuration.insert(field.clone(), value.clone());
            }
            Action::ClearValue { field } => {
                configuration.remove(field);
            }
            _ => {}
        }
    }
}

fn add_ids(target: &mut BTreeMap<String, BTreeSet<OptionId>>, field: &str, ids: &[OptionId]) {
    if ids.is_empty() {
        return;
    }
    target.entry(field.to_string()).or_default().extend(ids.iter().copied());
}

fn remove_ids(target: &mut BTreeMap<String, BTreeSet<OptionId>>, field: &str, ids: &[OptionId]) {
    if let Some(existing) = target.get_mut(field) {
        for id in ids {
            existing.remove(id);
        }
        if existing.is_empty() {
            target.remove(field);
        }
    }
}
