use super::uri::UriServiceNameParser;
use super::ServiceNameParser;
use crate::model::TrafficRecord;
use regex::Regex;

/// Service name from an enterprise-service-bus envelope.
///
/// Looks for `<ServiceCode>..</ServiceCode>` in the request body, then for a
/// top-level `ServiceCode` field of a JSON body, and otherwise groups by URI.
#[derive(Debug, Clone)]
pub struct EsbServiceNameParser {
    xml_service_code: Option<Regex>,
}

impl EsbServiceNameParser {
    pub fn new() -> Self {
        Self {
            xml_service_code: Regex::new(r"<ServiceCode>([^<]+)</ServiceCode>").ok(),
        }
    }

    fn from_xml(&self, body: &str) -> Option<String> {
        self.xml_service_code
            .as_ref()?
            .captures(body)
            .and_then(|captures| captures.get(1))
            .map(|code| code.as_str().to_string())
    }

    fn from_json(body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        match value.get("ServiceCode")? {
            serde_json::Value::String(code) => Some(code.clone()),
            serde_json::Value::Number(code) => Some(code.to_string()),
            serde_json::Value::Bool(code) => Some(code.to_string()),
            _ => None,
        }
    }
}

impl Default for EsbServiceNameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceNameParser for EsbServiceNameParser {
    fn name(&self) -> &'static str {
        "esb"
    }

    fn service_name(&self, record: &TrafficRecord) -> String {
        let body = record
            .request
            .body
            .as_deref()
            .filter(|body| !body.is_empty())
            .map(String::from_utf8_lossy);

        body.and_then(|body| self.from_xml(&body).or_else(|| Self::from_json(&body)))
            .unwrap_or_else(|| UriServiceNameParser.service_name(record))
    }
}
