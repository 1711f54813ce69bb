#[cfg(test)]
mod tests {
    use crate::runner::catalog::RawRule;
    use crate::runner::engine::{
        evaluate_rules, evaluate_rules_with_trace, process_rules, EvaluationMode,
    };
    use crate::runner::model::Configuration;
    use crate::runner::parser::parse_rules;
    use serde_json::{json, Value};

    fn raw_rule(id: i64, priority: i64, if_this: Value, than_that: Value) -> RawRule {
        RawRule {
            id: json!(id),
            name: Some(format!("rule {}", id)),
            priority: json!(priority),
            if_this,
            than_that,
        }
    }

    fn config(value: Value) -> Configuration {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_disable_shorthand_without_ids_leaves_result_empty() {
        let rule_set = parse_rules(&[raw_rule(
            1,
            0,
            json!({"field": "frame_color", "value": 7}),
            json!({"mirror_styles": "disable"}),
        )]);
        assert_eq!(rule_set.len(), 1);

        let result = evaluate_rules(&rule_set, &config(json!({"frame_color": 7})));
        assert!(result.disabled_options.is_empty());
        assert!(result.required_fields.is_empty());
    }

    #[test]
    fn test_disable_shorthand_with_ids() {
        let rule_set = parse_rules(&[raw_rule(
            1,
            0,
            json!({"field": "frame_color", "value": 7}),
            json!({"mirror_styles": {"disable": [4, 5]}}),
        )]);

        let result = evaluate_rules(&rule_set, &config(json!({"frame_color": "7"})));
        assert!(result.is_disabled("mirror_styles", 4));
        assert!(result.is_disabled("mirror_styles", 5));
        assert_eq!(result.disabled_options.len(), 1);

        let unmatched = evaluate_rules(&rule_set, &config(json!({"frame_color": 8})));
        assert!(unmatched.disabled_options.is_empty());
    }

    #[test]
    fn test_two_rules_disabling_same_option_merge_once() {
        let rule_set = parse_rules(&[
            raw_rule(1, 1, json!({"and": []}), json!({"frame_color": {"disable": [5]}})),
            raw_rule(2, 2, json!({"and": []}), json!({"frame_color": {"disable": [5, 6]}})),
        ]);
        let result = evaluate_rules(&rule_set, &config(json!({})));
        let ids: Vec<i64> = result.disabled_options["frame_color"].iter().copied().collect();
        assert_eq!(ids, vec![5, 6]);
    }

    #[test]
    fn test_lower_priority_set_value_lands_last_in_both_modes() {
        let rule_set = parse_rules(&[
            raw_rule(
                1,
                5,
                json!({"and": []}),
                json!([{"action": "set_value", "field": "frame_color", "value": 5}]),
            ),
            raw_rule(
                2,
                10,
                json!({"and": []}),
                json!([{"action": "set_value", "field": "frame_color", "value": 10}]),
            ),
        ]);
        let configuration = config(json!({}));

        let collected = evaluate_rules(&rule_set, &configuration);
        assert_eq!(collected.set_values["frame_color"], json!(5));

        let sequential = process_rules(&rule_set, &configuration);
        assert_eq!(sequential.result.set_values["frame_color"], json!(5));
        assert_eq!(sequential.configuration["frame_color"], json!(5));
    }

    #[test]
    fn test_collect_mode_ignores_earlier_overrides() {
        let rule_set = parse_rules(&[
            raw_rule(
                1,
                10,
                json!({"field": "size", "value": 24}),
                json!({"action": "set_value", "field": "frame_color", "value": 3}),
            ),
            raw_rule(
                2,
                5,
                json!({"field": "frame_color", "value": 3}),
                json!({"mounting": "require"}),
            ),
        ]);
        let configuration = config(json!({"size": 24}));

        let collected = evaluate_rules(&rule_set, &configuration);
        assert!(collected.required_fields.is_empty());
        assert_eq!(collected.set_values["frame_color"], json!(3));

        let sequential = process_rules(&rule_set, &configuration);
        assert!(sequential.result.required_fields.contains("mounting"));
        assert_eq!(sequential.configuration["frame_color"], json!(3));
        // caller's snapshot is untouched
        assert!(!configuration.contains_key("frame_color"));
    }

    #[test]
    fn test_sequential_clear_hides_value_from_later_rules() {
        let rule_set = parse_rules(&[
            raw_rule(1, 10, json!({"and": []}), json!({"size": "clear_value"})),
            raw_rule(
                2,
                5,
                json!({"field": "size", "operator": "nempty"}),
                json!({"size": {"disable": [1]}}),
            ),
        ]);
        let configuration = config(json!({"size": 24}));

        let sequential = process_rules(&rule_set, &configuration);
        assert!(sequential.result.cleared_fields.contains("size"));
        assert!(sequential.result.disabled_options.is_empty());
        assert!(!sequential.configuration.contains_key("size"));

        let collected = evaluate_rules(&rule_set, &configuration);
        assert!(collected.is_disabled("size", 1));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let rule_set = parse_rules(&[
            raw_rule(1, 3, json!({"frame_color": 7}), json!({"size": {"hide": [2]}})),
            raw_rule(2, 3, json!({"frame_color": 7}), json!({"size": {"show": [2]}})),
        ]);
        let configuration = config(json!({"frame_color": 7}));

        let first = evaluate_rules(&rule_set, &configuration);
        let second = evaluate_rules(&rule_set, &configuration);
        assert_eq!(first, second);
        // equal priorities keep input order: hide then show
        assert!(!first.is_hidden("size", 2));
    }

    #[test]
    fn test_trace_records_every_rule_in_order() {
        let rule_set = parse_rules(&[
            raw_rule(1, 1, json!({"field": "size", "value": 24}), json!({"finish": "require"})),
            raw_rule(2, 9, json!({"field": "size", "value": 30}), json!({"finish": "require"})),
        ]);
        let configuration = config(json!({"size": 24}));

        let (outcome, trace) =
            evaluate_rules_with_trace(&rule_set, &configuration, EvaluationMode::Collect);
        let ids: Vec<&str> = trace.execution.iter().map(|t| t.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(trace.matched_rule_ids(), vec!["1"]);
        assert_eq!(trace.execution[1].actions_applied, 1);
        assert_eq!(outcome.result, evaluate_rules(&rule_set, &configuration));
        assert_eq!(outcome.configuration, configuration);
    }

    #[test]
    fn test_trace_sequential_matches_process_rules() {
        let rule_set = parse_rules(&[
            raw_rule(
                1,
                10,
                json!({"and": []}),
                json!({"action": "set_value", "field": "frame_color", "value": 3}),
            ),
            raw_rule(2, 5, json!({"frame_color": 3}), json!({"mounting": "require"})),
        ]);
        let configuration = config(json!({}));

        let (outcome, trace) =
            evaluate_rules_with_trace(&rule_set, &configuration, EvaluationMode::Sequential);
        assert_eq!(outcome, process_rules(&rule_set, &configuration));
        assert_eq!(trace.matched_rule_ids(), vec!["1", "2"]);
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        let mode: EvaluationMode = serde_json::from_value(json!("sequential")).unwrap();
        assert_eq!(mode, EvaluationMode::Sequential);
        assert_eq!(EvaluationMode::default(), EvaluationMode::Collect);
    }
}
