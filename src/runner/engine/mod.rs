mod lib;

use crate::runner::actions::{apply_actions, apply_to_configuration};
use crate::runner::evaluator::{evaluate_condition, evaluate_condition_with_trace};
use crate::runner::model::{Configuration, Rule, RuleEvaluationResult, RuleSet};
use crate::runner::trace::{ConditionTrace, RuleSetTrace, RuleTrace};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How matching rules interact within one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Every rule sees the caller's configuration; used to narrow available options.
    #[default]
    Collect,
    /// Rules see the `set_value`/`clear_value` effects of rules evaluated before them;
    /// used to resolve a final override configuration.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialOutcome {
    pub result: RuleEvaluationResult,
    pub configuration: Configuration,
}

/// One-shot pass: every rule is matched against the original configuration.
pub fn evaluate_rules(rule_set: &RuleSet, configuration: &Configuration) -> RuleEvaluationResult {
    let mut result = RuleEvaluationResult::new();

    for rule in rule_set.iter() {
        if evaluate_condition(&rule.condition, configuration) {
            debug!(rule = %rule.id, priority = rule.priority, "Rule matched");
            apply_actions(&rule.actions, &mut result);
        }
    }

    result
}

/// Priority-ordered pass that threads value overrides through to later rules.
pub fn process_rules(rule_set: &RuleSet, configuration: &Configuration) -> SequentialOutcome {
    let mut working = configuration.clone();
    let mut result = RuleEvaluationResult::new();

    for rule in rule_set.iter() {
        if evaluate_condition(&rule.condition, &working) {
            debug!(rule = %rule.id, priority = rule.priority, "Rule matched, applying overrides");
            apply_actions(&rule.actions, &mut result);
            apply_to_configuration(&rule.actions, &mut working);
        }
    }

    SequentialOutcome {
        result,
        configuration: working,
    }
}

/// Runs either mode and records a trace entry per rule in evaluation order.
pub fn evaluate_rules_with_trace(
    rule_set: &RuleSet,
    configuration: &Configuration,
    mode: EvaluationMode,
) -> (SequentialOutcome, RuleSetTrace) {
    let mut working = configuration.clone();
    let mut result = RuleEvaluationResult::new();
    let mut trace = RuleSetTrace::default();

    for rule in rule_set.iter() {
        let snapshot = match mode {
            EvaluationMode::Collect => configuration,
            EvaluationMode::Sequential => &working,
        };
        let condition = evaluate_condition_with_trace(&rule.condition, snapshot);
        let matched = condition.result();

        if matched {
            apply_actions(&rule.actions, &mut result);
            if mode == EvaluationMode::Sequential {
                apply_to_configuration(&rule.actions, &mut working);
            }
        }

        trace.execution.push(rule_trace(rule, condition, matched));
    }

    let configuration = match mode {
        EvaluationMode::Collect => configuration.clone(),
        EvaluationMode::Sequential => working,
    };
    (SequentialOutcome { result, configuration }, trace)
}

fn rule_trace(rule: &Rule, condition: ConditionTrace, matched: bool) -> RuleTrace {
    RuleTrace {
        rule_id: rule.id.clone(),
        name: rule.name.clone(),
        priority: rule.priority,
        condition,
        matched,
        actions_applied: if matched { rule.actions.len() } else { 0 },
    }
}
