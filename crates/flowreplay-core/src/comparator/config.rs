//! Comparison rule configuration.
//!
//! Rules are read from a YAML document:
//!
//! ```yaml
//! rules:
//!   - name: orders
//!     urlPattern: "/api/orders.*"
//!     strategies:
//!       - type: http-status
//!       - type: json-structure
//!         config:
//!           ignoreFields: ["$.timestamp", "$.items[*].id"]
//! ```
//!
//! Loading never fails: a missing, unreadable, malformed or empty file
//! yields [`default_rules`] and a warning.

use super::ComparatorError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// One comparison rule: a URI pattern and the strategies to run for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonConfig {
    pub name: String,
    /// Regex that must match the whole request URI
    pub url_pattern: String,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}

impl ComparisonConfig {
    pub fn new(
        name: impl Into<String>,
        url_pattern: impl Into<String>,
        strategies: Vec<StrategyConfig>,
    ) -> Self {
        Self {
            name: name.into(),
            url_pattern: url_pattern.into(),
            strategies,
        }
    }
}

/// A strategy reference inside a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(
        default,
        rename = "config",
        alias = "params",
        skip_serializing_if = "Option::is_none"
    )]
    pub params: Option<HashMap<String, serde_json::Value>>,
}

impl StrategyConfig {
    pub fn new(strategy_type: impl Into<String>) -> Self {
        Self {
            strategy_type: strategy_type.into(),
            params: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.as_ref().and_then(|params| params.get(key))
    }

    /// The `ignoreFields` parameter as a list of path patterns.
    pub fn ignore_fields(&self) -> Result<Vec<String>, ComparatorError> {
        let Some(value) = self.param("ignoreFields") else {
            return Ok(Vec::new());
        };
        let invalid = || ComparatorError::InvalidParams {
            strategy: self.strategy_type.clone(),
            message: "ignoreFields must be a list of strings".to_string(),
        };
        match value {
            serde_json::Value::Null => Ok(Vec::new()),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
                .collect(),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Option<Vec<ComparisonConfig>>,
}

/// Built-in rule list: status code plus JSON structure for every URI.
pub fn default_rules() -> Vec<ComparisonConfig> {
    vec![ComparisonConfig::new(
        "default",
        ".*",
        vec![
            StrategyConfig::new("http-status"),
            StrategyConfig::new("json-structure"),
        ],
    )]
}

/// Parse a rules document. An empty document or empty list is `Ok(vec![])`.
pub fn parse_rules(yaml: &str) -> Result<Vec<ComparisonConfig>, serde_yaml::Error> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: RulesFile = serde_yaml::from_str(yaml)?;
    Ok(file.rules.unwrap_or_default())
}

/// Load rules from a file, falling back to [`default_rules`].
pub fn load_rules(path: impl AsRef<Path>) -> Vec<ComparisonConfig> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("Comparison rules file not found: {}, using defaults", path.display());
        return default_rules();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read comparison rules {}: {}, using defaults", path.display(), e);
            return default_rules();
        }
    };

    match parse_rules(&content) {
        Ok(rules) if rules.is_empty() => {
            warn!("No comparison rules in {}, using defaults", path.display());
            default_rules()
        }
        Ok(rules) => {
            info!("Loaded {} comparison rules from {}", rules.len(), path.display());
            rules
        }
        Err(e) => {
            warn!("Invalid comparison rules {}: {}, using defaults", path.display(), e);
            default_rules()
        }
    }
}
