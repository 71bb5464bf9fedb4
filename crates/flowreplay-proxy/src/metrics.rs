//! Prometheus metrics for the capture proxies.
//!
//! Tracks captured records, upstream failures, live TCP sessions and how long
//! each capture took. Exposed in text format by [`MetricsServer`].

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

struct CaptureMetrics {
    records_total: CounterVec,
    forward_failures_total: CounterVec,
    rejected_requests_total: CounterVec,
    active_tcp_sessions: GaugeVec,
    capture_duration_ms: HistogramVec,
}

impl CaptureMetrics {
    fn register() -> Result<Self, prometheus::Error> {
        Ok(Self {
            records_total: register_counter_vec!(
                "flowreplay_captured_records_total",
                "Total number of traffic records captured",
                &["protocol"]
            )?,
            forward_failures_total: register_counter_vec!(
                "flowreplay_forward_failures_total",
                "Upstream calls that failed during capture",
                &["protocol"]
            )?,
            rejected_requests_total: register_counter_vec!(
                "flowreplay_rejected_requests_total",
                "Inbound requests answered without forwarding or recording",
                &["reason"] // reason: body_too_large|body_read
            )?,
            active_tcp_sessions: register_gauge_vec!(
                "flowreplay_active_tcp_sessions",
                "TCP sessions currently being relayed",
                &["target"]
            )?,
            capture_duration_ms: register_histogram_vec!(
                "flowreplay_capture_duration_ms",
                "Duration of a captured exchange or session in milliseconds",
                &["protocol"],
                vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 30000.0]
            )?,
        })
    }
}

lazy_static! {
    static ref METRICS: Option<CaptureMetrics> = match CaptureMetrics::register() {
        Ok(metrics) => Some(metrics),
        Err(err) => {
            error!("Failed to register capture metrics: {}", err);
            None
        }
    };
}

/// Record one captured exchange and its duration.
pub fn record_capture(protocol: &str, duration_ms: u64) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.records_total.with_label_values(&[protocol]).inc();
        metrics
            .capture_duration_ms
            .with_label_values(&[protocol])
            .observe(duration_ms as f64);
    }
}

pub fn record_forward_failure(protocol: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics
            .forward_failures_total
            .with_label_values(&[protocol])
            .inc();
    }
}

pub fn record_rejected_request(reason: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics
            .rejected_requests_total
            .with_label_values(&[reason])
            .inc();
    }
}

pub fn tcp_session_opened(target: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.active_tcp_sessions.with_label_values(&[target]).inc();
    }
}

pub fn tcp_session_closed(target: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.active_tcp_sessions.with_label_values(&[target]).dec();
    }
}

/// Gather all registered metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Serves `/metrics` on its own listener.
pub struct MetricsServer {
    addr: SocketAddr,
}

impl MetricsServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        Self::serve(listener).await
    }

    pub async fn serve(listener: TcpListener) -> Result<(), anyhow::Error> {
        info!("Metrics listening on http://{}/metrics", listener.local_addr()?);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                if let Err(e) = http1::Builder::new()
                    .serve_connection(io, service_fn(metrics_response))
                    .await
                {
                    debug!("Metrics connection error: {}", e);
                }
            });
        }
    }
}

async fn metrics_response(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, content_type, body) = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => (
            StatusCode::OK,
            "text/plain; version=0.0.4",
            Bytes::from(collect_metrics()),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            "text/plain",
            Bytes::from_static(b"not found"),
        ),
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(content_type),
    );
    Ok(response)
}
