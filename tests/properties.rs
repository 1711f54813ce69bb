use configurator::runner::catalog::RawRule;
use configurator::runner::constraints::{apply_constraints_to_ids, merge_constraint_sets};
use configurator::runner::engine::evaluate_rules;
use configurator::runner::evaluator::evaluate_condition;
use configurator::runner::model::{
    ComparisonOperator, Condition, Configuration, ConstraintSet, MergeMode, OptionId, RuleConstraints,
};
use configurator::runner::parser::parse_rules;
use proptest::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

fn id_set() -> impl Strategy<Value = BTreeSet<OptionId>> {
    prop::collection::btree_set(1i64..50, 0..10)
}

fn configuration() -> impl Strategy<Value = Configuration> {
    prop::collection::hash_map("[a-c]", (0i64..20).prop_map(|n| json!(n)), 0..3)
}

proptest! {
    #[test]
    fn empty_and_is_true_and_empty_or_is_false(config in configuration()) {
        prop_assert!(evaluate_condition(&Condition::And(vec![]), &config));
        prop_assert!(!evaluate_condition(&Condition::Or(vec![]), &config));
    }

    #[test]
    fn numeric_strings_equal_numbers(n in -1000i64..1000) {
        let condition = Condition::field("f", ComparisonOperator::Eq, json!(n));
        let mut config = Configuration::new();
        config.insert("f".to_string(), json!(n.to_string()));
        prop_assert!(evaluate_condition(&condition, &config));
    }

    #[test]
    fn and_merge_narrows(a in id_set(), b in id_set()) {
        let merged = merge_constraint_sets(
            &ConstraintSet::allow(a.clone()),
            &ConstraintSet::allow(b.clone()),
            MergeMode::And,
        );
        let expected: BTreeSet<OptionId> = a.intersection(&b).copied().collect();
        prop_assert_eq!(merged.allow, Some(expected));
    }

    #[test]
    fn or_merge_widens(a in id_set(), b in id_set()) {
        let merged = merge_constraint_sets(
            &ConstraintSet::allow(a.clone()),
            &ConstraintSet::allow(b.clone()),
            MergeMode::Or,
        );
        let expected: BTreeSet<OptionId> = a.union(&b).copied().collect();
        prop_assert_eq!(merged.allow, Some(expected));
    }

    #[test]
    fn deny_wins_after_merge(allow in id_set(), deny in id_set(), mode in prop_oneof![Just(MergeMode::And), Just(MergeMode::Or)]) {
        let merged = merge_constraint_sets(
            &ConstraintSet::allow(allow.clone()),
            &ConstraintSet::deny(deny.clone()),
            mode,
        );
        let mut constraints = RuleConstraints::new();
        constraints.insert("f".to_string(), merged);
        let mut current = BTreeMap::new();
        current.insert("f".to_string(), (1i64..50).collect::<Vec<_>>());

        let filtered = apply_constraints_to_ids(&current, &constraints, &BTreeMap::new());
        for id in &filtered["f"] {
            prop_assert!(!deny.contains(id));
        }
    }

    #[test]
    fn evaluation_is_repeatable(config in configuration(), ids in prop::collection::vec(1i64..10, 0..4)) {
        let rules = parse_rules(&[
            RawRule {
                id: json!(1),
                priority: json!(2),
                if_this: json!({"field": "a", "operator": "gte", "value": 5}),
                than_that: json!({"b": {"disable": ids.clone()}}),
                ..RawRule::default()
            },
            RawRule {
                id: json!(2),
                priority: json!(1),
                if_this: json!({"or": [{"field": "b", "operator": "lt", "value": 3}, {"field": "c", "operator": "empty"}]}),
                than_that: json!({"c": "require", "b": {"hide": ids}}),
                ..RawRule::default()
            },
        ]);

        let first = evaluate_rules(&rules, &config);
        let second = evaluate_rules(&rules, &config);
        prop_assert_eq!(first, second);
    }
}

#[test]
fn duplicate_disables_appear_once() {
    let rules = parse_rules(&[
        RawRule {
            id: json!(1),
            if_this: json!({"frame_color": 7}),
            than_that: json!({"frame_color": {"disable": [5]}}),
            ..RawRule::default()
        },
        RawRule {
            id: json!(2),
            if_this: json!({"frame_color": 7}),
            than_that: json!({"frame_color": {"disable": [5, 6]}}),
            ..RawRule::default()
        },
    ]);
    let mut config = Configuration::new();
    config.insert("frame_color".to_string(), json!(7));

    let result = evaluate_rules(&rules, &config);
    assert_eq!(result.disabled_options["frame_color"].iter().filter(|id| **id == 5).count(), 1);
}
