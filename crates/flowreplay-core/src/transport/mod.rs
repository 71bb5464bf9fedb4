//! HTTP plumbing shared by the capture proxy and the replay engine.
//!
//! - `uri` - Absolute-form to origin-form normalization and target joining
//! - `headers` - Hop-by-hop filtering and header map conversion
//! - `client` - Pooled HTTP/1.1 client with fixed connect/request timeouts

mod client;
mod headers;
mod uri;

pub use client::{create_http_client, HttpClient, HttpForwarder, TransportError};
pub use headers::{
    headers_to_map, is_restricted_request_header, is_skipped_response_header,
    RESTRICTED_REQUEST_HEADERS, SKIPPED_RESPONSE_HEADERS,
};
pub use uri::{join_target, normalize_uri};
