pub mod api;
pub mod config;
pub mod runner;

pub use runner::availability::{compute_availability, AvailabilityResult};
pub use runner::cache::CachedCatalog;
pub use runner::catalog::{AttributeField, AttributeSchema, CatalogSource, FileCatalog};
pub use runner::constraints::{apply_constraints_to_ids, build_rule_constraints, merge_constraint_sets};
pub use runner::engine::{evaluate_rules, evaluate_rules_with_trace, process_rules, EvaluationMode};
pub use runner::error::RuleError;
pub use runner::parser::parse_rules;
pub use runner::validator::{validate_current_selections, ValidationResult};
