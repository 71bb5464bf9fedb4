//! Replay and comparison outcomes.

use super::traffic::ResponseData;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Metric key a strategy sets when it declines to judge an exchange.
pub const SKIPPED_METRIC: &str = "skipped";

/// Outcome of replaying one record against the new target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayResult {
    pub record_id: String,
    /// Present iff `success`
    pub response: Option<ResponseData>,
    /// Wall-clock replay time in milliseconds
    pub duration: u64,
    pub success: bool,
    pub error_message: Option<String>,
}

impl ReplayResult {
    pub fn success(record_id: impl Into<String>, response: ResponseData, duration: u64) -> Self {
        Self {
            record_id: record_id.into(),
            response: Some(response),
            duration,
            success: true,
            error_message: None,
        }
    }

    pub fn failure(record_id: impl Into<String>, duration: u64, message: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            response: None,
            duration,
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Kind of a single difference between recorded and replayed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// Same shape, different value
    Value,
    /// Different JSON node kinds
    Type,
    /// Field present in the recording, absent from the replay
    Missing,
    /// The replay itself failed, nothing was compared
    Error,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::Value => "value",
            DiffKind::Type => "type",
            DiffKind::Missing => "missing",
            DiffKind::Error => "error",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    /// JSON path (`$.a[0].b`) or a field label such as `statusCode` or `body`
    pub path: String,
    #[serde(rename = "type")]
    pub kind: DiffKind,
    pub expected: String,
    pub actual: String,
}

impl Difference {
    pub fn new(
        path: impl Into<String>,
        kind: DiffKind,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Verdict for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub matched: bool,
    pub differences: Vec<Difference>,
    #[serde(default)]
    pub metrics: HashMap<String, serde_json::Value>,
}

impl ComparisonResult {
    pub fn success() -> Self {
        Self {
            matched: true,
            differences: Vec::new(),
            metrics: HashMap::new(),
        }
    }

    /// Build a verdict from differences; matched iff there are none.
    pub fn from_differences(differences: Vec<Difference>) -> Self {
        Self {
            matched: differences.is_empty(),
            differences,
            metrics: HashMap::new(),
        }
    }

    /// A strategy that cannot judge this exchange.
    pub fn skipped(reason: &str) -> Self {
        let mut metrics = HashMap::new();
        metrics.insert(SKIPPED_METRIC.to_string(), serde_json::Value::from(reason));
        Self {
            matched: true,
            differences: Vec::new(),
            metrics,
        }
    }

    /// Verdict for a record whose replay never produced a response.
    pub fn replay_failure(message: Option<&str>) -> Self {
        Self {
            matched: false,
            differences: vec![Difference::new(
                "replay",
                DiffKind::Error,
                "success",
                format!("failed: {}", message.unwrap_or("unknown error")),
            )],
            metrics: HashMap::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.metrics.contains_key(SKIPPED_METRIC)
    }
}
