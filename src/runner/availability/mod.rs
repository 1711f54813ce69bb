
use crate::runner::cache::CachedCatalog;
use crate::runner::catalog::{sort_options, AttributeField, AttributeSchema, OptionRow, ProductRow};
use crate::runner::constraints::{
    apply_constraints_to_ids, build_rule_constraints, forced_values, merge_rule_constraints,
};
use crate::runner::engine::evaluate_rules;
use crate::runner::error::RuleError;
use crate::runner::evaluator::coerce_ids;
use crate::runner::model::{
    Configuration, MergeMode, OptionId, RuleConstraints, RuleSet,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Option availability per collection for one product line and selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResult {
    pub available_options: BTreeMap<String, Vec<OptionId>>,
    pub unavailable_options: BTreeMap<String, Vec<OptionId>>,
    pub hidden_options: BTreeMap<String, Vec<OptionId>>,
    pub required_fields: BTreeSet<String>,
    /// Collections narrowed by rules to exactly one id.
    pub forced_values: BTreeMap<String, OptionId>,
    pub matching_count: usize,
}

/// Inventory scan input: `None` products means the product fetch failed.
pub struct InventoryScope<'a> {
    pub product_line: OptionId,
    pub products: Option<&'a [ProductRow]>,
    pub universes: &'a HashMap<String, Arc<Vec<OptionRow>>>,
}

pub async fn compute_availability(
    product_line: OptionId,
    configuration: &Configuration,
    catalog: &CachedCatalog,
    schema: &AttributeSchema,
    required_collections: &[String],
) -> Result<AvailabilityResult, RuleError> {
    catalog.ensure_collections(required_collections).await?;

    let products = match catalog.products(product_line).await {
        Ok(rows) => Some(rows),
        Err(error) => {
            warn!(product_line, %error, "Product fetch failed, skipping inventory filtering");
            None
        }
    };
    let universes = catalog.option_collections(&schema.collections()).await;
    let rule_set = catalog.rules().await;

    let scope = InventoryScope {
        product_line,
        products: products.as_deref().map(Vec::as_slice),
        universes: &universes,
    };
    let inventory = inventory_availability(&scope, configuration, schema);
    Ok(apply_rule_outcome(inventory, &rule_set, configuration, schema, &universes))
}

/// Facet-driven availability, before any rule is applied.
pub fn inventory_availability(
    scope: &InventoryScope<'_>,
    configuration: &Configuration,
    schema: &AttributeSchema,
) -> AvailabilityResult {
    let mut result = AvailabilityResult::default();

    let in_scope: Vec<&ProductRow> = scope
        .products
        .unwrap_or(&[])
        .iter()
        .filter(|row| row.belongs_to(scope.product_line))
        .collect();

    result.matching_count = in_scope
        .iter()
        .filter(|row| schema.iter().all(|g| matches_selection(row, g, configuration)))
        .count();

    for attribute in schema.iter() {
        let universe = universe_ids(scope.universes.get(&attribute.collection));

        if attribute.protected || scope.products.is_none() {
            result.available_options.insert(attribute.collection.clone(), universe);
            result.unavailable_options.insert(attribute.collection.clone(), Vec::new());
            continue;
        }

        let facet = facet_ids(&in_scope, attribute, schema, configuration);
        let (available, unavailable): (Vec<OptionId>, Vec<OptionId>) = if universe.is_empty() {
            (facet.iter().copied().collect(), Vec::new())
        } else {
            universe.iter().copied().partition(|id| facet.contains(id))
        };

        debug!(
            collection = %attribute.collection,
            available = available.len(),
            unavailable = unavailable.len(),
            "Computed facet"
        );
        result.available_options.insert(attribute.collection.clone(), available);
        result.unavailable_options.insert(attribute.collection.clone(), unavailable);
    }

    result
}

/// Distinct ids of `attribute` among rows matching every other attribute's selection.
///
/// The attribute's own selection is left out so it cannot hide its own alternatives.
pub fn facet_ids(
    rows: &[&ProductRow],
    attribute: &AttributeField,
    schema: &AttributeSchema,
    configuration: &Configuration,
) -> BTreeSet<OptionId> {
    rows.iter()
        .filter(|row| {
            schema
                .iter()
                .filter(|other| other.field != attribute.field)
                .all(|other| matches_selection(row, other, configuration))
        })
        .flat_map(|row| row.attribute_ids(attribute.column()))
        .collect()
}

fn matches_selection(row: &ProductRow, attribute: &AttributeField, configuration: &Configuration) -> bool {
    let selected = configuration
        .get(&attribute.field)
        .map(coerce_ids)
        .unwrap_or_default();
    if selected.is_empty() {
        return true;
    }
    let present = row.attribute_ids(attribute.column());
    selected.iter().any(|id| present.contains(id))
}

fn universe_ids(options: Option<&Arc<Vec<OptionRow>>>) -> Vec<OptionId> {
    let mut rows: Vec<OptionRow> = options
        .map(|rows| rows.iter().filter(|o| o.active).cloned().collect())
        .unwrap_or_default();
    sort_options(&mut rows);
    rows.into_iter().map(|o| o.id).collect()
}

/// Layers rule actions and rule constraints over inventory availability.
///
/// Protected collections skip inventory filtering but are still subject to rules.
pub fn apply_rule_outcome(
    mut availability: AvailabilityResult,
    rule_set: &RuleSet,
    configuration: &Configuration,
    schema: &AttributeSchema,
    universes: &HashMap<String, Arc<Vec<OptionRow>>>,
) -> AvailabilityResult {
    let evaluation = evaluate_rules(rule_set, configuration);
    let constraints = constraints_by_collection(&build_rule_constraints(rule_set, configuration), schema);

    let all_ids: BTreeMap<String, Vec<OptionId>> = schema
        .iter()
        .map(|a| (a.collection.clone(), universe_ids(universes.get(&a.collection))))
        .collect();
    let narrowed = apply_constraints_to_ids(&availability.available_options, &constraints, &all_ids);

    for attribute in schema.iter() {
        let collection = &attribute.collection;
        let disabled = rule_ids_for(&evaluation.disabled_options, attribute);
        let before = availability.available_options.get(collection).cloned().unwrap_or_default();

        let available: Vec<OptionId> = narrowed
            .get(collection)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|id| !disabled.contains(id))
            .collect();

        let unavailable = availability.unavailable_options.entry(collection.clone()).or_default();
        for id in before.iter().filter(|id| !available.contains(id)) {
            if !unavailable.contains(id) {
                unavailable.push(*id);
            }
        }
        if let Some(order) = all_ids.get(collection).filter(|ids| !ids.is_empty()) {
            unavailable.sort_by_key(|id| order.iter().position(|o| o == id).unwrap_or(usize::MAX));
        }

        let hidden = rule_ids_for(&evaluation.hidden_options, attribute);
        if !hidden.is_empty() {
            availability
                .hidden_options
                .insert(collection.clone(), hidden.into_iter().collect());
        }
        availability.available_options.insert(collection.clone(), available);
    }

    availability.required_fields = evaluation.required_fields.clone();
    availability.forced_values = forced_values(&constraints);
    availability
}

fn rule_ids_for(
    per_field: &BTreeMap<String, BTreeSet<OptionId>>,
    attribute: &AttributeField,
) -> BTreeSet<OptionId> {
    per_field
        .iter()
        .filter(|(key, _)| attribute.answers_to(key))
        .flat_map(|(_, ids)| ids.iter().copied())
        .collect()
}

/// Re-keys field-named constraints to collection names; unknown keys are kept as-is.
pub fn constraints_by_collection(constraints: &RuleConstraints, schema: &AttributeSchema) -> RuleConstraints {
    let mut keyed = RuleConstraints::new();
    for (key, constraint) in constraints {
        let collection = schema
            .resolve(key)
            .map(|a| a.collection.clone())
            .unwrap_or_else(|| key.clone());
        let mut single = RuleConstraints::new();
        single.insert(collection, constraint.clone());
        merge_rule_constraints(&mut keyed, &single, MergeMode::And);
    }
    keyed
}
