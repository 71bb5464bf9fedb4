//! Per-request capture: forward, record, answer.

use crate::metrics;
use crate::sink::{deliver, target_metadata};
use bytes::Bytes;
use flowreplay_core::model::{Protocol, RequestData, ResponseData, TrafficRecord};
use flowreplay_core::transport::{
    headers_to_map, is_skipped_response_header, join_target, HttpForwarder,
};
use flowreplay_core::TrafficRecorder;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// State shared by every connection of one HTTP capture server.
pub(crate) struct CaptureContext {
    pub target_host: String,
    pub target_port: u16,
    /// `http://host:port`
    pub target_base: String,
    pub forwarder: HttpForwarder,
    pub recorder: Arc<dyn TrafficRecorder>,
    pub max_body_bytes: usize,
}

pub(crate) async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<CaptureContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let keep_alive = is_keep_alive(&req);
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, ctx.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(
                "Rejecting {} {}: body exceeds {} bytes",
                parts.method, parts.uri, ctx.max_body_bytes
            );
            metrics::record_rejected_request("body_too_large");
            return Ok(error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "request body too large",
            ));
        }
        Err(err) => {
            warn!(
                "Failed to read body of {} {}: {}",
                parts.method, parts.uri, err
            );
            metrics::record_rejected_request("body_read");
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                "failed to read request body",
            ));
        }
    };

    let method = parts.method.to_string();
    let uri = parts.uri.to_string();
    let headers = headers_to_map(&parts.headers);
    let url = join_target(&ctx.target_base, &uri);
    debug!("Forwarding {} {} to {}", method, uri, url);

    let mut response = match ctx.forwarder.send(&method, &url, &headers, body.clone()).await {
        Ok(response) => response,
        Err(err) => {
            error!("Failed to forward {} {}: {}", method, uri, err);
            metrics::record_forward_failure(Protocol::Http.as_str());
            ResponseData::new(500, err.to_string())
        }
    };
    response.duration = started.elapsed().as_millis() as u64;
    debug!(
        "Captured {} {} -> {} ({} bytes, {}ms)",
        method,
        uri,
        response.status_code,
        response.body.len(),
        response.duration
    );

    let client_response = build_response(&response, keep_alive);
    let duration_ms = response.duration;
    let record = TrafficRecord::new(
        Uuid::new_v4().to_string(),
        Protocol::Http,
        RequestData::new(method, uri)
            .with_headers(headers)
            .with_body(body.to_vec()),
        response,
    )
    .with_metadata(target_metadata(&ctx.target_host, ctx.target_port));

    deliver(&ctx.recorder, record).await;
    metrics::record_capture(Protocol::Http.as_str(), duration_ms);

    Ok(client_response)
}

/// HTTP/1.1 stays open unless the client sent `Connection: close`; HTTP/1.0
/// only stays open on an explicit `Connection: keep-alive`.
pub(crate) fn is_keep_alive<B>(req: &Request<B>) -> bool {
    let has_token = |token: &str| {
        req.headers().get_all(CONNECTION).iter().any(|value| {
            value.to_str().map_or(false, |value| {
                value
                    .split(',')
                    .any(|t| t.trim().eq_ignore_ascii_case(token))
            })
        })
    };

    match req.version() {
        Version::HTTP_09 | Version::HTTP_10 => has_token("keep-alive"),
        _ => !has_token("close"),
    }
}

/// Mirror a captured response back to the client.
///
/// Framing headers are recomputed for the body actually sent; headers that
/// cannot be represented are dropped with a warning.
pub(crate) fn build_response(captured: &ResponseData, keep_alive: bool) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(captured.status_code).unwrap_or_else(|_| {
        warn!(
            "Upstream status {} is not valid HTTP, answering 502",
            captured.status_code
        );
        StatusCode::BAD_GATEWAY
    });

    let mut response = Response::new(Full::new(Bytes::from(captured.body.clone())));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &captured.headers {
        if is_skipped_response_header(name) || name.eq_ignore_ascii_case("connection") {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!("Dropping unrepresentable response header '{}'", name),
        }
    }

    headers.insert(CONTENT_LENGTH, HeaderValue::from(captured.body.len()));
    headers.insert(
        CONNECTION,
        HeaderValue::from_static(if keep_alive { "keep-alive" } else { "close" }),
    );
    response
}

/// Plain JSON error for requests that never reach the target.
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    response
}
