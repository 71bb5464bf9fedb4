//! The closed set of comparison strategies and their name lookup.

use super::config::StrategyConfig;
use super::exact_match::ExactMatchStrategy;
use super::http_status::HttpStatusStrategy;
use super::json_structure::JsonStructureStrategy;
use super::ComparatorError;
use crate::model::{ComparisonResult, ResponseData};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    HttpStatus,
    ExactMatch,
    JsonStructure,
}

/// Configuration name of every strategy.
const STRATEGY_NAMES: [(&str, StrategyKind); 3] = [
    ("http-status", StrategyKind::HttpStatus),
    ("exact-match", StrategyKind::ExactMatch),
    ("json-structure", StrategyKind::JsonStructure),
];

impl StrategyKind {
    pub fn from_name(name: &str) -> Option<Self> {
        STRATEGY_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::HttpStatus => "http-status",
            StrategyKind::ExactMatch => "exact-match",
            StrategyKind::JsonStructure => "json-structure",
        }
    }

    pub fn all() -> impl Iterator<Item = StrategyKind> {
        STRATEGY_NAMES.iter().map(|(_, kind)| *kind)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configured strategy, ready to compare.
#[derive(Debug, Clone)]
pub enum Strategy {
    HttpStatus(HttpStatusStrategy),
    ExactMatch(ExactMatchStrategy),
    JsonStructure(JsonStructureStrategy),
}

impl Strategy {
    pub fn from_config(config: &StrategyConfig) -> Result<Self, ComparatorError> {
        let kind = StrategyKind::from_name(&config.strategy_type)
            .ok_or_else(|| ComparatorError::UnknownStrategy(config.strategy_type.clone()))?;

        Ok(match kind {
            StrategyKind::HttpStatus => Strategy::HttpStatus(HttpStatusStrategy),
            StrategyKind::ExactMatch => Strategy::ExactMatch(ExactMatchStrategy),
            StrategyKind::JsonStructure => Strategy::JsonStructure(
                JsonStructureStrategy::with_ignore_patterns(config.ignore_fields()?)?,
            ),
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::HttpStatus(_) => StrategyKind::HttpStatus,
            Strategy::ExactMatch(_) => StrategyKind::ExactMatch,
            Strategy::JsonStructure(_) => StrategyKind::JsonStructure,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn compare(&self, recorded: &ResponseData, replayed: &ResponseData) -> ComparisonResult {
        match self {
            Strategy::HttpStatus(strategy) => strategy.compare(recorded, replayed),
            Strategy::ExactMatch(strategy) => strategy.compare(recorded, replayed),
            Strategy::JsonStructure(strategy) => strategy.compare(recorded, replayed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup_roundtrips() {
        for kind in StrategyKind::all() {
            assert_eq!(StrategyKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StrategyKind::from_name("HTTP-STATUS"), None);
        assert_eq!(StrategyKind::from_name("fuzzy"), None);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let err = Strategy::from_config(&StrategyConfig::new("fuzzy")).unwrap_err();
        assert!(matches!(err, ComparatorError::UnknownStrategy(name) if name == "fuzzy"));
    }

    #[test]
    fn test_json_structure_takes_ignore_fields() {
        let config = StrategyConfig::new("json-structure")
            .with_param("ignoreFields", serde_json::json!(["$.ts"]));
        let strategy = Strategy::from_config(&config).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::JsonStructure);

        let result = strategy.compare(
            &ResponseData::new(200, r#"{"ts":1}"#),
            &ResponseData::new(200, r#"{"ts":2}"#),
        );
        assert!(result.matched);
    }
}
