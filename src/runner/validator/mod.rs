
use crate::runner::availability::constraints_by_collection;
use crate::runner::cache::CachedCatalog;
use crate::runner::catalog::{sort_options, AttributeField, AttributeSchema, OptionRow};
use crate::runner::constraints::{build_rule_constraints, forced_values};
use crate::runner::evaluator::{coerce_id, is_empty_value};
use crate::runner::model::{Configuration, OptionId};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Option universe of one product line, as the validator sees it.
#[derive(Debug, Clone, Default)]
pub struct ProductLineOptions {
    pub id: OptionId,
    /// Collection name to option rows, in any order.
    pub options: BTreeMap<String, Vec<OptionRow>>,
    pub forced_values: BTreeMap<String, OptionId>,
}

impl ProductLineOptions {
    pub fn new(id: OptionId) -> Self {
        ProductLineOptions {
            id,
            ..Default::default()
        }
    }

    pub fn with_options(mut self, collection: &str, options: Vec<OptionRow>) -> Self {
        self.options.insert(collection.to_string(), options);
        self
    }

    pub fn with_forced(mut self, collection: &str, id: OptionId) -> Self {
        self.forced_values.insert(collection.to_string(), id);
        self
    }

    /// Active options of a collection in display order.
    fn ordered(&self, collection: &str) -> Vec<OptionRow> {
        let mut rows: Vec<OptionRow> = self
            .options
            .get(collection)
            .map(|rows| rows.iter().filter(|o| o.active).cloned().collect())
            .unwrap_or_default();
        sort_options(&mut rows);
        rows
    }
}

/// Loads option collections and rule-forced values for a product line.
pub async fn load_product_line(
    product_line: OptionId,
    configuration: &Configuration,
    catalog: &CachedCatalog,
    schema: &AttributeSchema,
) -> ProductLineOptions {
    let collections = catalog.option_collections(&schema.collections()).await;
    let rule_set = catalog.rules().await;
    let constraints = constraints_by_collection(&build_rule_constraints(&rule_set, configuration), schema);

    ProductLineOptions {
        id: product_line,
        options: collections
            .into_iter()
            .map(|(name, rows)| (name, rows.as_ref().clone()))
            .collect(),
        forced_values: forced_values(&constraints),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidSelection {
    pub field: String,
    pub collection: String,
    pub current_value: Value,
    pub suggested_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub invalid_selections: Vec<InvalidSelection>,
    /// Present only when at least one field was corrected.
    pub adjusted_config: Option<Configuration>,
}

/// Checks every mapped selection against disabled ids and forced values,
/// suggesting the first valid replacement for each invalid one.
///
/// Multi-select fields drop invalid elements (a scalar counts as a one-element list).
/// Single-select fields holding a list keep one allowed value.
pub fn validate_current_selections(
    configuration: &Configuration,
    schema: &AttributeSchema,
    product_line: &ProductLineOptions,
    disabled_option_ids: &BTreeMap<String, Vec<OptionId>>,
) -> ValidationResult {
    let mut invalid_selections = Vec::new();
    let mut adjusted = configuration.clone();

    for attribute in schema.iter() {
        let Some(current) = configuration
            .get(&attribute.field)
            .filter(|value| !is_empty_value(Some(value)))
        else {
            continue;
        };

        let disabled = disabled_for(disabled_option_ids, attribute);
        let forced = product_line.forced_values.get(&attribute.collection).copied();
        let is_allowed = |id: OptionId| match forced {
            Some(forced) => id == forced,
            None => !disabled.contains(&id),
        };

        if attribute.multi {
            let items = match current {
                Value::Array(items) => items.clone(),
                scalar => vec![scalar.clone()],
            };
            let kept: Vec<Value> = items
                .iter()
                .filter(|item| coerce_id(item).map_or(true, is_allowed))
                .cloned()
                .collect();
            if kept.len() == items.len() {
                continue;
            }
            debug!(field = %attribute.field, dropped = items.len() - kept.len(), "Dropping disabled selections");
            invalid_selections.push(InvalidSelection {
                field: attribute.field.clone(),
                collection: attribute.collection.clone(),
                current_value: current.clone(),
                suggested_value: None,
            });
            adjusted.insert(attribute.field.clone(), Value::Array(kept));
            continue;
        }

        let first_valid = || {
            forced.or_else(|| {
                product_line
                    .ordered(&attribute.collection)
                    .iter()
                    .map(|o| o.id)
                    .find(|candidate| !disabled.contains(candidate))
            })
        };

        // single-select fields holding a list collapse to one allowed element
        let (suggestion, shape) = match current {
            Value::Array(items) => {
                let suggestion = items
                    .iter()
                    .filter_map(coerce_id)
                    .find(|id| is_allowed(*id))
                    .or_else(first_valid);
                (suggestion, items.first().unwrap_or(current))
            }
            scalar => {
                let Some(id) = coerce_id(scalar) else {
                    debug!(field = %attribute.field, value = %scalar, "Skipping non-id selection");
                    continue;
                };
                if is_allowed(id) {
                    continue;
                }
                (first_valid(), scalar)
            }
        };
        debug!(field = %attribute.field, current = %current, suggested = ?suggestion, "Invalid selection");

        invalid_selections.push(InvalidSelection {
            field: attribute.field.clone(),
            collection: attribute.collection.clone(),
            current_value: current.clone(),
            suggested_value: suggestion.map(|s| s.to_string()),
        });
        match suggestion {
            Some(replacement) => {
                adjusted.insert(attribute.field.clone(), same_shape(shape, replacement));
            }
            None => {
                adjusted.remove(&attribute.field);
            }
        }
    }

    let is_valid = invalid_selections.is_empty();
    ValidationResult {
        is_valid,
        invalid_selections,
        adjusted_config: if is_valid { None } else { Some(adjusted) },
    }
}

/// Disabled ids keyed by either the collection or the field name.
fn disabled_for(disabled: &BTreeMap<String, Vec<OptionId>>, attribute: &AttributeField) -> BTreeSet<OptionId> {
    disabled
        .iter()
        .filter(|(key, _)| attribute.answers_to(key))
        .flat_map(|(_, ids)| ids.iter().copied())
        .collect()
}

/// Keeps a string selection a string and a numeric one numeric.
fn same_shape(original: &Value, id: OptionId) -> Value {
    match original {
        Value::String(_) => Value::String(id.to_string()),
        _ => Value::from(id),
    }
}
