
use crate::runner::catalog::{CatalogSource, OptionRow, ProductRow};
use crate::runner::error::RuleError;
use crate::runner::model::{OptionId, RuleSet};
use crate::runner::parser::parse_rules;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

struct CacheEntry<V> {
    value: Arc<V>,
    fetched_at: DateTime<Utc>,
}

/// TTL-stamped map of immutable snapshots.
///
/// A refresh swaps the whole `Arc`, so readers see either the old or the new value.
pub struct TtlStore<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash + Clone, V> TtlStore<K, V> {
    pub fn new(ttl: Duration) -> Self {
        TtlStore {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value only while it is younger than the TTL.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.get_at(key, Utc::now())
    }

    pub(crate) fn get_at(&self, key: &K, now: DateTime<Utc>) -> Option<Arc<V>> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .map(|entry| Arc::clone(&entry.value))
    }

    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        self.insert_at(key, value, Utc::now())
    }

    pub(crate) fn insert_at(&self, key: K, value: V, fetched_at: DateTime<Utc>) -> Arc<V> {
        let value = Arc::new(value);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key,
                CacheEntry {
                    value: Arc::clone(&value),
                    fetched_at,
                },
            );
        }
        value
    }

    pub fn invalidate(&self, key: &K) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps a [`CatalogSource`] with TTL stores for rules, products and option collections.
///
/// Fetch failures are never cached.
pub struct CachedCatalog {
    source: Arc<dyn CatalogSource>,
    rules: TtlStore<(), RuleSet>,
    products: TtlStore<OptionId, Vec<ProductRow>>,
    options: TtlStore<String, Vec<OptionRow>>,
}

impl CachedCatalog {
    pub fn new(source: Arc<dyn CatalogSource>, ttl: Duration) -> Self {
        CachedCatalog {
            source,
            rules: TtlStore::new(ttl),
            products: TtlStore::new(ttl),
            options: TtlStore::new(ttl),
        }
    }

    /// Parsed rules; an unreachable backend yields an empty rule set.
    pub async fn rules(&self) -> Arc<RuleSet> {
        match self.rules.get(&()) {
            Some(rules) => rules,
            None => self.refresh_rules().await,
        }
    }

    pub async fn refresh_rules(&self) -> Arc<RuleSet> {
        match self.source.fetch_rules().await {
            Ok(raw) => {
                let rule_set = parse_rules(&raw);
                info!(fetched = raw.len(), parsed = rule_set.len(), "Refreshed rules");
                self.rules.insert((), rule_set)
            }
            Err(error) => {
                warn!(%error, "Rule fetch failed, evaluating with no rules");
                Arc::new(RuleSet::new())
            }
        }
    }

    pub async fn products(&self, product_line: OptionId) -> Result<Arc<Vec<ProductRow>>, RuleError> {
        if let Some(rows) = self.products.get(&product_line) {
            return Ok(rows);
        }
        let rows = self.source.fetch_products(product_line).await?;
        Ok(self.products.insert(product_line, rows))
    }

    pub async fn option_collection(&self, name: &str) -> Result<Arc<Vec<OptionRow>>, RuleError> {
        let key = name.to_string();
        if let Some(rows) = self.options.get(&key) {
            return Ok(rows);
        }
        let rows = self.source.fetch_option_collection(name).await?;
        Ok(self.options.insert(key, rows))
    }

    /// Fetches several collections concurrently; a failed collection reads as empty.
    pub async fn option_collections(&self, names: &[String]) -> HashMap<String, Arc<Vec<OptionRow>>> {
        let fetches = names.iter().map(|name| async move {
            let rows = match self.option_collection(name).await {
                Ok(rows) => rows,
                Err(error) => {
                    warn!(collection = %name, %error, "Option collection unavailable");
                    Arc::new(Vec::new())
                }
            };
            (name.clone(), rows)
        });
        join_all(fetches).await.into_iter().collect()
    }

    /// Fails when a collection the configurator cannot work without is absent.
    /// A failed existence check is logged and does not count as absent.
    pub async fn ensure_collections(&self, required: &[String]) -> Result<(), RuleError> {
        for name in required {
            match self.source.collection_exists(name).await {
                Ok(true) => {}
                Ok(false) => return Err(RuleError::RequiredTableMissing(name.clone())),
                Err(error) => {
                    warn!(collection = %name, %error, "Could not check required collection");
                }
            }
        }
        Ok(())
    }

    pub fn invalidate(&self) {
        self.rules.invalidate_all();
        self.products.invalidate_all();
        self.options.invalidate_all();
        info!("Catalog cache invalidated");
    }
}
