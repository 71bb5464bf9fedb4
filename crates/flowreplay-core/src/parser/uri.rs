use super::ServiceNameParser;
use crate::model::TrafficRecord;

/// Service name = request path without its query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriServiceNameParser;

impl ServiceNameParser for UriServiceNameParser {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn service_name(&self, record: &TrafficRecord) -> String {
        let uri = record.request.uri.as_str();
        let path = match uri.find('?') {
            Some(idx) if idx > 0 => &uri[..idx],
            _ => uri,
        };
        if path.is_empty() {
            "unknown".to_string()
        } else {
            path.to_string()
        }
    }
}
