//! One relayed TCP session.

use crate::metrics;
use crate::sink::{authority, deliver, target_metadata};
use flowreplay_core::model::{Protocol, RequestData, ResponseData, TrafficRecord};
use flowreplay_core::TrafficRecorder;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHUNK_SIZE: usize = 16 * 1024;

/// Settings shared by every session of one TCP capture server.
pub(crate) struct SessionSettings {
    pub target_host: String,
    pub target_port: u16,
    pub protocol_parser: String,
    pub connect_timeout: Duration,
    pub drain_timeout: Duration,
    pub recorder: Arc<dyn TrafficRecorder>,
}

impl SessionSettings {
    pub(crate) fn target(&self) -> String {
        authority(&self.target_host, self.target_port)
    }
}

#[derive(Debug)]
enum PumpEnd {
    /// Reader hit end-of-stream and the peer's write half was shut down
    Eof,
    Failed(std::io::Error),
}

/// Copy `reader` into `writer`, keeping every byte in `captured`.
///
/// The next read is issued only after the previous chunk was fully written.
async fn pump<R, W>(mut reader: R, mut writer: W, captured: &mut Vec<u8>) -> PumpEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = writer.shutdown().await;
                return PumpEnd::Eof;
            }
            Ok(n) => n,
            Err(err) => return PumpEnd::Failed(err),
        };
        captured.extend_from_slice(&buf[..n]);
        if let Err(err) = writer.write_all(&buf[..n]).await {
            return PumpEnd::Failed(err);
        }
    }
}

/// Relay `client` to the target and record the session once it ends.
///
/// Nothing is recorded when the target cannot be reached; the client
/// connection is simply closed.
pub(crate) async fn run_session(client: TcpStream, peer: SocketAddr, settings: Arc<SessionSettings>) {
    let started = Instant::now();
    let target = settings.target();

    let upstream = match timeout(
        settings.connect_timeout,
        TcpStream::connect((settings.target_host.as_str(), settings.target_port)),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            warn!("Failed to connect to {} for {}: {}", target, peer, err);
            metrics::record_forward_failure(Protocol::Socket.as_str());
            return;
        }
        Err(_) => {
            warn!(
                "Connecting to {} for {} timed out after {:?}",
                target, peer, settings.connect_timeout
            );
            metrics::record_forward_failure(Protocol::Socket.as_str());
            return;
        }
    };
    let _ = upstream.set_nodelay(true);

    debug!("Relaying {} <-> {}", peer, target);
    metrics::tcp_session_opened(&target);
    let (request, response) = relay(client, upstream, settings.drain_timeout).await;
    metrics::tcp_session_closed(&target);

    let duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "TCP session {} -> {} closed: {} bytes sent, {} bytes received, {}ms",
        peer,
        target,
        request.len(),
        response.len(),
        duration_ms
    );

    let mut metadata = target_metadata(&settings.target_host, settings.target_port);
    metadata.insert("protocol".to_string(), json!(settings.protocol_parser));
    metadata.insert("duration".to_string(), json!(duration_ms));

    let record = TrafficRecord::new(
        Uuid::new_v4().to_string(),
        Protocol::Socket,
        RequestData::new(settings.protocol_parser.clone(), target).with_body(request),
        ResponseData::new(0, response).with_duration(duration_ms),
    )
    .with_metadata(metadata);

    deliver(&settings.recorder, record).await;
    metrics::record_capture(Protocol::Socket.as_str(), duration_ms);
}

/// Pump both directions until the session ends.
///
/// When one direction reaches end-of-stream the other may keep flowing for
/// `drain_timeout`; an I/O error on either side ends the session at once.
/// Returns the bytes sent by the client and by the target.
pub(crate) async fn relay<C, T>(client: C, target: T, drain_timeout: Duration) -> (Vec<u8>, Vec<u8>)
where
    C: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (target_read, target_write) = tokio::io::split(target);
    let mut request = Vec::new();
    let mut response = Vec::new();

    {
        let upstream = pump(client_read, target_write, &mut request);
        let downstream = pump(target_read, client_write, &mut response);
        tokio::pin!(upstream, downstream);

        tokio::select! {
            end = &mut upstream => {
                if finished_cleanly("client", end) {
                    drain("target", downstream, drain_timeout).await;
                }
            }
            end = &mut downstream => {
                if finished_cleanly("target", end) {
                    drain("client", upstream, drain_timeout).await;
                }
            }
        }
    }

    (request, response)
}

fn finished_cleanly(side: &str, end: PumpEnd) -> bool {
    match end {
        PumpEnd::Eof => {
            debug!("{} closed its side of the session", side);
            true
        }
        PumpEnd::Failed(err) => {
            debug!("{} side failed, ending session: {}", side, err);
            false
        }
    }
}

async fn drain<F>(side: &str, remaining: F, drain_timeout: Duration)
where
    F: std::future::Future<Output = PumpEnd>,
{
    match timeout(drain_timeout, remaining).await {
        Ok(end) => {
            finished_cleanly(side, end);
        }
        Err(_) => debug!(
            "{} still open after {:?}, ending session",
            side, drain_timeout
        ),
    }
}
