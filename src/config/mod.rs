
use crate::runner::catalog::AttributeSchema;
use crate::runner::error::RuleError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cache_ttl() -> u64 {
    300
}

/// Service settings, read from a JSON file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Collections whose absence is a hard error.
    #[serde(default)]
    pub required_collections: Vec<String>,
    /// Attribute field to option collection mapping.
    #[serde(default)]
    pub fields: AttributeSchema,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: default_host(),
            port: default_port(),
            cache_ttl_secs: default_cache_ttl(),
            required_collections: Vec::new(),
            fields: AttributeSchema::default(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| RuleError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RuleError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Command-line values win over file values.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>, cache_ttl_secs: Option<u64>) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(ttl) = cache_ttl_secs {
            self.cache_ttl_secs = ttl;
        }
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), RuleError> {
        let mut seen = HashSet::new();
        for attribute in self.fields.iter() {
            if attribute.field.is_empty() || attribute.collection.is_empty() {
                return Err(RuleError::Config(
                    "attribute field and collection must be non-empty".to_string(),
                ));
            }
            if !seen.insert(attribute.field.as_str()) {
                return Err(RuleError::Config(format!(
                    "attribute field '{}' is mapped twice",
                    attribute.field
                )));
            }
        }
        Ok(())
    }
}
