//! Rule-driven comparison of recorded and replayed responses.
//!
//! # Module Structure
//!
//! - `config` - Rule definitions and the YAML rule loader
//! - `strategy` - Strategy name lookup and dispatch
//! - `http_status` / `exact_match` / `json_structure` - Strategy implementations
//!
//! # Rule selection
//!
//! SOCKET records always use exact-match. HTTP records use the first rule
//! whose `urlPattern` matches the whole request URI, or the first rule when
//! none matches, or the built-in `http-status` + `json-structure` rule when no
//! rules are configured.
//!
//! Strategies that report themselves skipped are left out of the verdict. If
//! every strategy of the selected rule skipped, exact-match decides instead.

mod config;
mod exact_match;
mod http_status;
mod json_structure;
mod strategy;


pub use config::{default_rules, load_rules, parse_rules, ComparisonConfig, StrategyConfig};
pub use exact_match::ExactMatchStrategy;
pub use http_status::HttpStatusStrategy;
pub use json_structure::{is_json_content, JsonStructureStrategy, SKIP_NOT_JSON, SKIP_PARSE_FAILED};
pub use strategy::{Strategy, StrategyKind};

use crate::model::{ComparisonResult, Protocol, ReplayResult, ResponseData, TrafficRecord};
use regex::Regex;
use tracing::debug;

/// Metric naming the rule that produced a verdict.
pub const RULE_METRIC: &str = "rule";
/// Metric listing strategies that skipped.
pub const SKIPPED_STRATEGIES_METRIC: &str = "skippedStrategies";
/// Metric set when the exact-match fallback decided the verdict.
pub const FALLBACK_METRIC: &str = "fallback";

#[derive(Debug, thiserror::Error)]
pub enum ComparatorError {
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Unknown comparison strategy '{0}'")]
    UnknownStrategy(String),
    #[error("Invalid parameters for strategy '{strategy}': {message}")]
    InvalidParams { strategy: String, message: String },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    /// Absent for built-in rules that apply unconditionally
    pattern: Option<Regex>,
    strategies: Vec<Strategy>,
}

impl CompiledRule {
    fn compile(config: &ComparisonConfig) -> Result<Self, ComparatorError> {
        let pattern = Regex::new(&format!("^(?:{})$", config.url_pattern)).map_err(|source| {
            ComparatorError::InvalidPattern {
                pattern: config.url_pattern.clone(),
                source,
            }
        })?;
        let strategies = config
            .strategies
            .iter()
            .map(Strategy::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: config.name.clone(),
            pattern: Some(pattern),
            strategies,
        })
    }

    fn builtin(name: &str, strategies: Vec<Strategy>) -> Self {
        Self {
            name: name.to_string(),
            pattern: None,
            strategies,
        }
    }

    fn matches(&self, uri: &str) -> bool {
        self.pattern.as_ref().map_or(true, |pattern| pattern.is_match(uri))
    }
}

/// Compares replayed responses against recordings.
///
/// Immutable after construction; share it freely between concurrent callers.
#[derive(Debug, Clone)]
pub struct Comparator {
    rules: Vec<CompiledRule>,
    default_rule: CompiledRule,
    socket_rule: CompiledRule,
}

impl Comparator {
    /// Compile a rule list. Invalid URL patterns and unknown strategy names
    /// are rejected here rather than at comparison time.
    pub fn new(configs: &[ComparisonConfig]) -> Result<Self, ComparatorError> {
        let rules = configs
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules,
            ..Self::default()
        })
    }

    fn select_rule(&self, record: &TrafficRecord) -> &CompiledRule {
        if record.protocol == Protocol::Socket {
            return &self.socket_rule;
        }
        self.rules
            .iter()
            .find(|rule| rule.matches(&record.request.uri))
            .or_else(|| self.rules.first())
            .unwrap_or(&self.default_rule)
    }

    pub fn compare(&self, record: &TrafficRecord, replayed: &ResponseData) -> ComparisonResult {
        let rule = self.select_rule(record);

        let mut matched = true;
        let mut differences = Vec::new();
        let mut skipped = Vec::new();
        let mut contributed = 0usize;

        for strategy in &rule.strategies {
            let result = strategy.compare(&record.response, replayed);
            if result.is_skipped() {
                skipped.push(strategy.name());
                continue;
            }
            contributed += 1;
            matched &= result.matched;
            differences.extend(result.differences);
        }

        let mut verdict = if contributed == 0 {
            debug!(
                "All strategies skipped for record {} (rule {}), using exact-match",
                record.id, rule.name
            );
            let mut fallback = ExactMatchStrategy.compare(&record.response, replayed);
            fallback.metrics.insert(
                FALLBACK_METRIC.to_string(),
                StrategyKind::ExactMatch.name().into(),
            );
            fallback
        } else {
            ComparisonResult {
                matched,
                differences,
                metrics: Default::default(),
            }
        };

        verdict
            .metrics
            .insert(RULE_METRIC.to_string(), rule.name.clone().into());
        if !skipped.is_empty() {
            verdict
                .metrics
                .insert(SKIPPED_STRATEGIES_METRIC.to_string(), skipped.into());
        }
        verdict
    }

    /// Compare a replay outcome; a failed replay is a mismatch by definition.
    pub fn compare_replay(&self, record: &TrafficRecord, replay: &ReplayResult) -> ComparisonResult {
        match (&replay.response, replay.success) {
            (Some(response), true) => self.compare(record, response),
            _ => ComparisonResult::replay_failure(replay.error_message.as_deref()),
        }
    }
}

impl Default for Comparator {
    /// Comparator with no configured rules.
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_rule: CompiledRule::builtin(
                "default",
                vec![
                    Strategy::HttpStatus(HttpStatusStrategy),
                    Strategy::JsonStructure(JsonStructureStrategy::new()),
                ],
            ),
            socket_rule: CompiledRule::builtin(
                "socket",
                vec![Strategy::ExactMatch(ExactMatchStrategy)],
            ),
        }
    }
}
