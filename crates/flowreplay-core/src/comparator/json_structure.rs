//! Structural JSON comparison.
//!
//! Both bodies are parsed and walked in parallel from the root path `$`.
//! Object members are looked up by name, so key order never matters; array
//! elements are compared by index, so element order always does.
//!
//! Paths use `$.field` for object members and `$[i]` for array elements.
//! Ignore patterns are matched against the whole path, with `*` matching any
//! run of characters (`$.items[*].id`, `$.meta.*`).

use super::ComparatorError;
use crate::model::{ComparisonResult, DiffKind, Difference, ResponseData};
use regex::Regex;
use serde_json::Value;

pub const SKIP_NOT_JSON: &str = "not-json-content";
pub const SKIP_PARSE_FAILED: &str = "json-parse-failed";

#[derive(Debug, Clone, Default)]
pub struct JsonStructureStrategy {
    ignore: Vec<Regex>,
}

impl JsonStructureStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build with ignore patterns such as `$.timestamp` or `$.items[*].id`.
    pub fn with_ignore_patterns<I, S>(patterns: I) -> Result<Self, ComparatorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignore = patterns
            .into_iter()
            .map(|pattern| compile_glob(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ignore })
    }

    pub fn compare(&self, recorded: &ResponseData, replayed: &ResponseData) -> ComparisonResult {
        if !is_json_content(recorded) || !is_json_content(replayed) {
            return ComparisonResult::skipped(SKIP_NOT_JSON);
        }

        let (expected, actual) = match (
            serde_json::from_slice::<Value>(&recorded.body),
            serde_json::from_slice::<Value>(&replayed.body),
        ) {
            (Ok(expected), Ok(actual)) => (expected, actual),
            _ => return ComparisonResult::skipped(SKIP_PARSE_FAILED),
        };

        let mut differences = Vec::new();
        self.diff("$", &expected, &actual, &mut differences);
        ComparisonResult::from_differences(differences)
    }

    fn is_ignored(&self, path: &str) -> bool {
        self.ignore.iter().any(|pattern| pattern.is_match(path))
    }

    fn diff(&self, path: &str, expected: &Value, actual: &Value, out: &mut Vec<Difference>) {
        if self.is_ignored(path) {
            return;
        }

        let (expected_kind, actual_kind) = (kind_name(expected), kind_name(actual));
        if expected_kind != actual_kind {
            out.push(Difference::new(path, DiffKind::Type, expected_kind, actual_kind));
            return;
        }

        match (expected, actual) {
            (Value::Object(expected), Value::Object(actual)) => {
                for (field, expected_value) in expected {
                    let field_path = format!("{path}.{field}");
                    match actual.get(field) {
                        Some(actual_value) => {
                            self.diff(&field_path, expected_value, actual_value, out)
                        }
                        None if self.is_ignored(&field_path) => {}
                        None => out.push(Difference::new(
                            field_path,
                            DiffKind::Missing,
                            "exists",
                            "missing",
                        )),
                    }
                }
            }
            (Value::Array(expected), Value::Array(actual)) => {
                if expected.len() != actual.len() {
                    out.push(Difference::new(
                        format!("{path}.length"),
                        DiffKind::Value,
                        expected.len().to_string(),
                        actual.len().to_string(),
                    ));
                    return;
                }
                for (index, (expected_item, actual_item)) in
                    expected.iter().zip(actual.iter()).enumerate()
                {
                    self.diff(&format!("{path}[{index}]"), expected_item, actual_item, out);
                }
            }
            _ => {
                if expected != actual {
                    out.push(Difference::new(
                        path,
                        DiffKind::Value,
                        scalar_text(expected),
                        scalar_text(actual),
                    ));
                }
            }
        }
    }
}

/// JSON if declared so by Content-Type, or if the body opens like a JSON
/// document. Empty bodies are never JSON.
pub fn is_json_content(response: &ResponseData) -> bool {
    let Some(first) = response
        .body
        .iter()
        .find(|byte| !byte.is_ascii_whitespace())
    else {
        return false;
    };

    if response
        .header("content-type")
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    {
        return true;
    }

    matches!(first, b'{' | b'[')
}

fn compile_glob(pattern: &str) -> Result<Regex, ComparatorError> {
    let translated = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{translated}$")).map_err(|source| ComparatorError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null => "null",
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(body: &str) -> ResponseData {
        ResponseData::new(200, body)
    }

    fn compare(expected: &str, actual: &str) -> ComparisonResult {
        JsonStructureStrategy::new().compare(&json(expected), &json(actual))
    }

    #[test]
    fn test_key_order_is_irrelevant() {
        let result = compare(r#"{"a":1,"b":2}"#, r#"{"b":2,"a":1}"#);
        assert!(result.matched);
        assert!(!result.is_skipped());
    }

    #[test]
    fn test_array_order_matters() {
        let result = compare("[1,2]", "[2,1]");
        assert!(!result.matched);
        let paths: Vec<_> = result.differences.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["$[0]", "$[1]"]);
    }

    #[test]
    fn test_value_difference_uses_plain_text() {
        let result = compare(r#"{"x":1,"s":"a","n":null}"#, r#"{"x":2,"s":"b","n":null}"#);
        assert_eq!(
            result.differences,
            vec![
                Difference::new("$.s", DiffKind::Value, "a", "b"),
                Difference::new("$.x", DiffKind::Value, "1", "2"),
            ]
        );
    }

    #[test]
    fn test_type_difference_stops_descent() {
        let result = compare(r#"{"a":{"b":1}}"#, r#"{"a":[1]}"#);
        assert_eq!(
            result.differences,
            vec![Difference::new("$.a", DiffKind::Type, "object", "array")]
        );

        let result = compare(r#"{"a":null}"#, r#"{"a":0}"#);
        assert_eq!(result.differences[0].kind, DiffKind::Type);
        assert_eq!(result.differences[0].expected, "null");
        assert_eq!(result.differences[0].actual, "number");
    }

    #[test]
    fn test_missing_field() {
        let result = compare(r#"{"a":1,"b":2}"#, r#"{"a":1}"#);
        assert_eq!(
            result.differences,
            vec![Difference::new("$.b", DiffKind::Missing, "exists", "missing")]
        );
    }

    #[test]
    fn test_extra_replayed_fields_are_ignored() {
        assert!(compare(r#"{"a":1}"#, r#"{"a":1,"added":true}"#).matched);
    }

    #[test]
    fn test_array_length_mismatch_reports_length_only() {
        let result = compare(r#"{"items":[1,2,3]}"#, r#"{"items":[9]}"#);
        assert_eq!(
            result.differences,
            vec![Difference::new("$.items.length", DiffKind::Value, "3", "1")]
        );
    }

    #[test]
    fn test_ignore_exact_path() {
        let strategy = JsonStructureStrategy::with_ignore_patterns(["$.timestamp"]).unwrap();
        let result = strategy.compare(
            &json(r#"{"timestamp":1,"x":1}"#),
            &json(r#"{"timestamp":2,"x":1}"#),
        );
        assert!(result.matched);
    }

    #[test]
    fn test_ignore_wildcard_and_missing_ignored_field() {
        let strategy =
            JsonStructureStrategy::with_ignore_patterns(["$.items[*].id", "$.trace*"]).unwrap();
        let result = strategy.compare(
            &json(r#"{"items":[{"id":1,"v":"a"},{"id":2,"v":"b"}],"traceId":"x"}"#),
            &json(r#"{"items":[{"id":7,"v":"a"},{"id":8,"v":"b"}]}"#),
        );
        assert!(result.matched, "{:?}", result.differences);
    }

    #[test]
    fn test_ignore_pattern_is_anchored() {
        let strategy = JsonStructureStrategy::with_ignore_patterns(["$.id"]).unwrap();
        let result = strategy.compare(&json(r#"{"idx":1}"#), &json(r#"{"idx":2}"#));
        assert!(!result.matched);
    }

    #[test]
    fn test_non_json_is_skipped() {
        let result = compare("hello", r#"{"a":1}"#);
        assert!(result.matched);
        assert_eq!(result.metrics["skipped"], SKIP_NOT_JSON);

        let result = compare("", "");
        assert!(result.is_skipped());
    }

    #[test]
    fn test_content_type_marks_json() {
        let recorded = ResponseData::new(200, "1").with_header("Content-Type", "application/JSON");
        let replayed = ResponseData::new(200, "2").with_header("content-type", "application/json");
        let result = JsonStructureStrategy::new().compare(&recorded, &replayed);
        assert!(!result.is_skipped());
        assert_eq!(result.differences[0].path, "$");
    }

    #[test]
    fn test_parse_failure_is_skipped() {
        let result = compare(r#"{"a":"#, r#"{"a":1}"#);
        assert!(result.matched);
        assert_eq!(result.metrics["skipped"], SKIP_PARSE_FAILED);
    }

    #[test]
    fn test_leading_whitespace_before_json() {
        let result = compare("  \n{\"a\":1}", "{\"a\":1}");
        assert!(result.matched);
        assert!(!result.is_skipped());
    }
}
