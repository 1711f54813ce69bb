mod lib;

use crate::runner::error::RuleError;
use crate::runner::evaluator::{coerce_id, coerce_ids};
use crate::runner::model::OptionId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

/// A stored rule row before normalization.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRule {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Value,
    #[serde(default)]
    pub if_this: Value,
    #[serde(default, alias = "then_that")]
    pub than_that: Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProductRow {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub product_line: Value,
    #[serde(default)]
    pub active: bool,
    /// Attribute foreign-key columns.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ProductRow {
    pub fn belongs_to(&self, product_line: OptionId) -> bool {
        self.active && attribute_ids(&self.product_line).contains(&product_line)
    }

    /// Ids held by an attribute column: a plain id, an `{"id": n}` object, or a list of either.
    pub fn attribute_ids(&self, column: &str) -> Vec<OptionId> {
        self.attributes.get(column).map(attribute_ids).unwrap_or_default()
    }
}

fn attribute_ids(value: &Value) -> Vec<OptionId> {
    match value {
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("key"))
            .and_then(coerce_id)
            .or_else(|| map.values().find_map(coerce_id))
            .into_iter()
            .collect(),
        Value::Array(items) => items.iter().flat_map(attribute_ids).collect(),
        other => coerce_ids(other),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OptionRow {
    pub id: OptionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku_code: Option<String>,
    #[serde(default)]
    pub sort: Option<i64>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl OptionRow {
    pub fn new(id: OptionId, name: &str) -> Self {
        OptionRow {
            id,
            name: name.to_string(),
            sku_code: None,
            sort: None,
            active: true,
        }
    }
}

/// Collection order: explicit `sort` first (ascending), then name.
pub fn sort_options(options: &mut [OptionRow]) {
    options.sort_by(|a, b| match (a.sort, b.sort) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });
}

/// One selectable product dimension and where it lives.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AttributeField {
    /// Configuration key, e.g. `frame_color`.
    pub field: String,
    /// Option collection, e.g. `frame_colors`.
    pub collection: String,
    /// Product column holding the option id; defaults to `field`.
    #[serde(default)]
    pub product_column: Option<String>,
    /// Never disabled by inventory, only by explicit rules.
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub multi: bool,
}

impl AttributeField {
    pub fn new(field: &str, collection: &str) -> Self {
        AttributeField {
            field: field.to_string(),
            collection: collection.to_string(),
            product_column: None,
            protected: false,
            multi: false,
        }
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn column(&self) -> &str {
        self.product_column.as_deref().unwrap_or(&self.field)
    }

    /// Rules may name an attribute by field or by collection.
    pub fn answers_to(&self, key: &str) -> bool {
        self.field == key || self.collection == key
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct AttributeSchema {
    pub fields: Vec<AttributeField>,
}

impl AttributeSchema {
    pub fn new(fields: Vec<AttributeField>) -> Self {
        AttributeSchema { fields }
    }

    pub fn resolve(&self, key: &str) -> Option<&AttributeField> {
        self.fields.iter().find(|f| f.answers_to(key))
    }

    pub fn collections(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.collection.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeField> {
        self.fields.iter()
    }
}

/// Backend the core reads rules, products and option collections from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_rules(&self) -> Result<Vec<RawRule>, RuleError>;

    async fn fetch_products(&self, product_line: OptionId) -> Result<Vec<ProductRow>, RuleError>;

    async fn fetch_option_collection(&self, name: &str) -> Result<Vec<OptionRow>, RuleError>;

    async fn collection_exists(&self, name: &str) -> Result<bool, RuleError>;
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub rules: Vec<RawRule>,
    #[serde(default)]
    pub products: Vec<ProductRow>,
    #[serde(default)]
    pub collections: HashMap<String, Vec<OptionRow>>,
}

/// Catalog held in memory, loaded from a JSON document.
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    document: CatalogDocument,
}

impl FileCatalog {
    pub fn new(document: CatalogDocument) -> Self {
        FileCatalog { document }
    }

    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub async fn from_path(path: &Path) -> Result<Self, RuleError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }
}

#[async_trait]
impl CatalogSource for FileCatalog {
    async fn fetch_rules(&self) -> Result<Vec<RawRule>, RuleError> {
        Ok(self.document.rules.clone())
    }

    async fn fetch_products(&self, product_line: OptionId) -> Result<Vec<ProductRow>, RuleError> {
        Ok(self
            .document
            .products
            .iter()
            .filter(|row| attribute_ids(&row.product_line).contains(&product_line))
            .cloned()
            .collect())
    }

    async fn fetch_option_collection(&self, name: &str) -> Result<Vec<OptionRow>, RuleError> {
        self.document
            .collections
            .get(name)
            .cloned()
            .ok_or_else(|| RuleError::Collaborator(format!("collection '{}' not found", name)))
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, RuleError> {
        Ok(self.document.collections.contains_key(name))
    }
}
