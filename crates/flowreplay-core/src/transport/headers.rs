//! Header filtering for forwarded and replayed requests.

use hyper::HeaderMap;
use std::collections::HashMap;

/// Request headers never copied onto an outbound request; the client
/// recomputes them for the new connection.
pub const RESTRICTED_REQUEST_HEADERS: [&str; 5] =
    ["host", "connection", "content-length", "expect", "upgrade"];

/// Response headers never copied back to the capturing client; the server
/// recomputes framing for the body it actually sends.
pub const SKIPPED_RESPONSE_HEADERS: [&str; 2] = ["content-length", "transfer-encoding"];

pub fn is_restricted_request_header(name: &str) -> bool {
    RESTRICTED_REQUEST_HEADERS
        .iter()
        .any(|restricted| restricted.eq_ignore_ascii_case(name))
}

pub fn is_skipped_response_header(name: &str) -> bool {
    SKIPPED_RESPONSE_HEADERS
        .iter()
        .any(|skipped| skipped.eq_ignore_ascii_case(name))
}

/// Flatten a header map; repeated headers are joined with `", "`.
pub fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    for (name, value) in headers.iter() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}
