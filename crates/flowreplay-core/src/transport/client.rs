//! HTTP client creation and request execution.
//!
//! One pooled HTTP/1.1 client is shared by every forwarded or replayed
//! request. Connect and whole-request timeouts are fixed at construction.

use super::headers::{headers_to_map, is_restricted_request_header};
use crate::model::{Metadata, ResponseData};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Type alias for the HTTP client used for forwarding and replay.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("Invalid request for {url}: {message}")]
    InvalidRequest { url: String, message: String },
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Create the shared HTTP client.
///
/// Native root certificates are used when available. Without them the client
/// still speaks plain HTTP and HTTPS targets fail certificate verification.
pub fn create_http_client(connect_timeout: Duration) -> Result<HttpClient, TransportError> {
    let mut http_connector = HttpConnector::new();
    http_connector.set_connect_timeout(Some(connect_timeout));
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let builder = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            warn!("Native root certificates unavailable ({}), HTTPS targets will not verify", e);
            let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
                rustls::crypto::ring::default_provider(),
            ))
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportError::Tls(e.to_string()))?
            .with_root_certificates(rustls::RootCertStore::empty())
            .with_no_client_auth();
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(tls_config)
        }
    };

    let https_connector = builder
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    Ok(Client::builder(TokioExecutor::new()).build(https_connector))
}

/// Sends fully-buffered requests and captures fully-buffered responses.
#[derive(Clone)]
pub struct HttpForwarder {
    client: HttpClient,
    request_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: create_http_client(connect_timeout)?,
            request_timeout,
        })
    }

    pub fn with_client(client: HttpClient, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// Send one request to an absolute `url`.
    ///
    /// Restricted hop-by-hop headers are dropped; headers that are not valid
    /// HTTP are skipped with a warning. The returned response carries the
    /// elapsed time in milliseconds.
    pub async fn send(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body: Bytes,
    ) -> Result<ResponseData, TransportError> {
        let start = Instant::now();
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(method.to_string()))?;

        let mut request = Request::builder().method(method).uri(url);
        for (name, value) in headers {
            if is_restricted_request_header(name) {
                continue;
            }
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => warn!("Skipping invalid header '{}' for {}", name, url),
            }
        }

        let request = request
            .body(Full::new(body))
            .map_err(|e| TransportError::InvalidRequest {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        debug!("Sending {} {}", request.method(), url);

        let exchange = async {
            let response =
                self.client
                    .request(request)
                    .await
                    .map_err(|e| TransportError::Request {
                        url: url.to_string(),
                        message: error_chain(&e),
                    })?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| TransportError::Body {
                    url: url.to_string(),
                    message: error_chain(&e),
                })?
                .to_bytes();
            Ok::<_, TransportError>((parts, body))
        };

        let (parts, body) = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout {
                url: url.to_string(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            })??;

        Ok(ResponseData {
            status_code: parts.status.as_u16(),
            headers: headers_to_map(&parts.headers),
            body: body.to_vec(),
            duration: start.elapsed().as_millis() as u64,
            metadata: Metadata::new(),
        })
    }
}

/// Render an error with its full source chain.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
