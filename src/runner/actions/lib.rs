#[cfg(test)]
mod tests {
    use crate::runner::actions::{apply_actions, apply_to_configuration};
    use crate::runner::model::{Action, Configuration, RuleEvaluationResult};
    use serde_json::json;

    fn disable(field: &str, ids: &[i64]) -> Action {
        Action::Disable {
            field: field.to_string(),
            option_ids: ids.to_vec(),
        }
    }

    #[test]
    fn test_disable_deduplicates() {
        let mut result = RuleEvaluationResult::new();
        apply_actions(&[disable("frame_color", &[5, 6]), disable("frame_color", &[5])], &mut result);

        let ids: Vec<i64> = result.disabled_options["frame_color"].iter().copied().collect();
        assert_eq!(ids, vec![5, 6]);
    }

    #[test]
    fn test_enable_removes_disabled_ids() {
        let mut result = RuleEvaluationResult::new();
        apply_actions(
            &[
                disable("size", &[1, 2, 3]),
                Action::Enable {
                    field: "size".to_string(),
                    option_ids: vec![2, 9],
                },
            ],
            &mut result,
        );
        assert!(result.is_disabled("size", 1));
        assert!(!result.is_disabled("size", 2));
        assert!(result.is_disabled("size", 3));
    }

    #[test]
    fn test_enable_everything_drops_field_entry() {
        let mut result = RuleEvaluationResult::new();
        apply_actions(
            &[
                disable("size", &[1]),
                Action::Enable {
                    field: "size".to_string(),
                    option_ids: vec![1],
                },
            ],
            &mut result,
        );
        assert!(!result.disabled_options.contains_key("size"));
    }

    #[test]
    fn test_hide_and_show() {
        let mut result = RuleEvaluationResult::new();
        apply_actions(
            &[
                Action::Hide {
                    field: "mirror_styles".to_string(),
                    option_ids: vec![10, 11],
                },
                Action::Show {
                    field: "mirror_styles".to_string(),
                    option_ids: vec![10],
                },
            ],
            &mut result,
        );
        assert!(!result.is_hidden("mirror_styles", 10));
        assert!(result.is_hidden("mirror_styles", 11));
        assert!(result.disabled_options.is_empty());
    }

    #[test]
    fn test_disable_without_ids_leaves_no_entry() {
        let mut result = RuleEvaluationResult::new();
        apply_actions(&[disable("mirror_styles", &[])], &mut result);
        assert!(result.disabled_options.is_empty());
    }

    #[test]
    fn test_require_is_set_semantics() {
        let mut result = RuleEvaluationResult::new();
        let require = Action::Require {
            field: "size".to_string(),
        };
        apply_actions(&[require.clone(), require], &mut result);
        assert_eq!(result.required_fields.len(), 1);
    }

    #[test]
    fn test_set_value_last_writer_wins_and_clear_is_recorded() {
        let mut result = RuleEvaluationResult::new();
        apply_actions(
            &[
                Action::SetValue {
                    field: "frame_color".to_string(),
                    value: json!(3),
                },
                Action::SetValue {
                    field: "frame_color".to_string(),
                    value: json!(4),
                },
                Action::ClearValue {
                    field: "frame_color".to_string(),
                },
            ],
            &mut result,
        );
        assert_eq!(result.set_values["frame_color"], json!(4));
        assert!(result.cleared_fields.contains("frame_color"));
    }

    #[test]
    fn test_apply_to_configuration_preserves_action_order() {
        let mut configuration = Configuration::new();
        configuration.insert("size".to_string(), json!(24));

        apply_to_configuration(
            &[
                Action::SetValue {
                    field: "frame_color".to_string(),
                    value: json!(3),
                },
                Action::ClearValue {
                    field: "size".to_string(),
                },
                Action::Require {
                    field: "mounting".to_string(),
                },
            ],
            &mut configuration,
        );
        assert_eq!(configuration.get("frame_color"), Some(&json!(3)));
        assert!(!configuration.contains_key("size"));
        assert!(!configuration.contains_key("mounting"));

        // set after clear on the same field wins
        apply_to_configuration(
            &[
                Action::ClearValue {
                    field: "frame_color".to_string(),
                },
                Action::SetValue {
                    field: "frame_color".to_string(),
                    value: json!(8),
                },
            ],
            &mut configuration,
        );
        assert_eq!(configuration.get("frame_color"), Some(&json!(8)));
    }

    #[test]
    fn test_fresh_accumulators_are_identical() {
        let actions = vec![disable("frame_color", &[5]), Action::Require { field: "size".into() }];
        let mut first = RuleEvaluationResult::new();
        let mut second = RuleEvaluationResult::new();
        apply_actions(&actions, &mut first);
        apply_actions(&actions, &mut second);
        assert_eq!(first, second);
    }
}
