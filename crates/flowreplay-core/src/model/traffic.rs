//! Captured request/response exchanges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Free-form metadata attached to requests, responses and records.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Wire protocol of a captured exchange.
///
/// The protocol decides how a record is replayed and which comparison rule
/// applies to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum Protocol {
    /// One HTTP request/response pair
    #[default]
    #[serde(rename = "HTTP")]
    Http,
    /// A whole raw TCP session captured as two opaque byte streams
    #[serde(rename = "SOCKET")]
    Socket,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Socket => "SOCKET",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HTTP" => Ok(Protocol::Http),
            "SOCKET" | "TCP" => Ok(Protocol::Socket),
            other => Err(format!("Unknown protocol: {other}")),
        }
    }
}

/// Request side of a captured exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// HTTP method, or the protocol parser name for raw TCP sessions
    pub method: String,
    /// Request URI as received, or `host:port` of the target for raw TCP sessions
    pub uri: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, with = "super::body::optional_payload")]
    pub body: Option<Vec<u8>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl RequestData {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: HashMap::new(),
            body: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response side of a captured or replayed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    /// HTTP status code; 0 when not applicable (raw TCP)
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, with = "super::body::payload")]
    pub body: Vec<u8>,
    /// Response time in milliseconds
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ResponseData {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            headers: HashMap::new(),
            body: body.into(),
            duration: 0,
            metadata: Metadata::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = duration_ms;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One captured exchange: an HTTP request/response pair or a whole TCP session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRecord {
    pub id: String,
    pub protocol: Protocol,
    pub timestamp: DateTime<Utc>,
    pub request: RequestData,
    pub response: ResponseData,
    #[serde(default)]
    pub metadata: Metadata,
}

impl TrafficRecord {
    pub fn new(
        id: impl Into<String>,
        protocol: Protocol,
        request: RequestData,
        response: ResponseData,
    ) -> Self {
        Self {
            id: id.into(),
            protocol,
            timestamp: Utc::now(),
            request,
            response,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_wire_names() {
        assert_eq!(serde_json::to_string(&Protocol::Http).unwrap(), "\"HTTP\"");
        assert_eq!(
            serde_json::to_string(&Protocol::Socket).unwrap(),
            "\"SOCKET\""
        );
        assert_eq!("socket".parse::<Protocol>().unwrap(), Protocol::Socket);
        assert!("ftp".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let response =
            ResponseData::new(200, "{}").with_header("Content-Type", "application/json");
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(response.header("accept"), None);
    }

    #[test]
    fn test_record_json_uses_base64_bodies() {
        let record = TrafficRecord::new(
            "r1",
            Protocol::Http,
            RequestData::new("POST", "/api/x").with_body("hello"),
            ResponseData::new(200, "{\"x\":1}"),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["request"]["body"], "aGVsbG8=");
        assert_eq!(json["response"]["statusCode"], 200);

        let parsed: TrafficRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_null_bodies_deserialize_as_empty() {
        let json = serde_json::json!({
            "id": "r2",
            "protocol": "SOCKET",
            "timestamp": "2024-01-30T10:00:00Z",
            "request": { "method": "raw", "uri": "localhost:6379", "body": null },
            "response": { "statusCode": 0, "body": null }
        });

        let record: TrafficRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.protocol, Protocol::Socket);
        assert_eq!(record.request.body, None);
        assert!(record.response.body.is_empty());
        assert_eq!(record.response.duration, 0);
    }
}
