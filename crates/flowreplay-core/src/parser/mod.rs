//! Service-name classification for reports.
//!
//! A [`ServiceNameParser`] maps a record to the logical service it belongs
//! to, so statistics can be grouped per service. Parsers are looked up by
//! name through a [`ParserRegistry`] built by the caller.

mod esb;
mod uri;

pub use esb::EsbServiceNameParser;
pub use uri::UriServiceNameParser;

use crate::model::TrafficRecord;
use std::collections::HashMap;
use std::sync::Arc;

/// Parser used when no name is given.
pub const DEFAULT_PARSER: &str = "uri";

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("Unknown service name parser '{name}' (available: {available})")]
    UnknownParser { name: String, available: String },
}

pub trait ServiceNameParser: Send + Sync {
    /// Registry key of this parser.
    fn name(&self) -> &'static str;

    fn service_name(&self, record: &TrafficRecord) -> String;
}

/// Name → parser map. Names are case-insensitive.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn ServiceNameParser>>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry with the `uri` and `esb` parsers.
    pub fn with_builtin() -> Self {
        Self::empty()
            .with_parser(Arc::new(UriServiceNameParser))
            .with_parser(Arc::new(EsbServiceNameParser::new()))
    }

    pub fn with_parser(mut self, parser: Arc<dyn ServiceNameParser>) -> Self {
        self.parsers
            .insert(parser.name().to_ascii_lowercase(), parser);
        self
    }

    /// Look up a parser; `None` or an empty name selects the `uri` parser.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn ServiceNameParser>, ParserError> {
        let key = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PARSER)
            .to_ascii_lowercase();

        self.parsers
            .get(&key)
            .cloned()
            .ok_or_else(|| ParserError::UnknownParser {
                name: key,
                available: self.names().join(", "),
            })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.parsers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
