//! Raw TCP session replay.
//!
//! A new connection is opened per record, the captured request bytes are
//! written in one go, and the response is read until the peer closes or
//! stays silent. Opaque streams carry no end-of-message marker, so silence
//! is the only completion signal: the first read may wait
//! `tcp_initial_read_timeout`, every later one `tcp_idle_timeout`. A peer
//! that pauses longer than that mid-response gets truncated.

use super::{ReplayConfig, ReplayError};
use crate::model::{ResponseData, TrafficRecord};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const READ_CHUNK: usize = 8192;
const DEFAULT_PORT: u16 = 80;

pub struct TcpReplayer {
    host: String,
    port: u16,
    connect_timeout: Duration,
    initial_read_timeout: Duration,
    idle_timeout: Duration,
}

impl TcpReplayer {
    pub fn new(target: &str, config: &ReplayConfig) -> Result<Self, ReplayError> {
        let (host, port) = parse_socket_target(target)?;
        Ok(Self {
            host,
            port,
            connect_timeout: config.connect_timeout,
            initial_read_timeout: config.tcp_initial_read_timeout,
            idle_timeout: config.tcp_idle_timeout,
        })
    }

    fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub async fn replay(&self, record: &TrafficRecord) -> Result<ResponseData, ReplayError> {
        let started = Instant::now();
        let address = self.address();

        let mut stream = timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| ReplayError::ConnectTimeout {
            target: address.clone(),
            timeout_ms: self.connect_timeout.as_millis() as u64,
        })?
        .map_err(|source| ReplayError::Connect {
            target: address.clone(),
            source,
        })?;

        let io_error = |source: std::io::Error| ReplayError::Io {
            target: address.clone(),
            source,
        };

        if let Some(body) = record.request.body.as_deref() {
            stream.write_all(body).await.map_err(io_error)?;
        }
        stream.flush().await.map_err(io_error)?;

        let mut response = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut wait = self.initial_read_timeout;
        loop {
            match timeout(wait, stream.read(&mut chunk)).await {
                Err(_) => {
                    debug!("{} idle for {}ms, response complete", address, wait.as_millis());
                    break;
                }
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    response.extend_from_slice(&chunk[..n]);
                    wait = self.idle_timeout;
                }
                Ok(Err(source)) => return Err(io_error(source)),
            }
        }

        Ok(ResponseData::new(0, response).with_duration(started.elapsed().as_millis() as u64))
    }
}

/// Split a replay target into host and port.
///
/// Accepts `host:port`, `[v6]:port`, a bare host (port 80) and URL forms
/// such as `tcp://host:port/`.
fn parse_socket_target(target: &str) -> Result<(String, u16), ReplayError> {
    let invalid = || ReplayError::InvalidTarget(target.to_string());

    let trimmed = target.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(invalid());
    }

    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match after.strip_prefix(':') {
            Some(port) => port.parse().map_err(|_| invalid())?,
            None if after.is_empty() => DEFAULT_PORT,
            None => return Err(invalid()),
        };
        return Ok((host.to_string(), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port.parse().map_err(|_| invalid())?;
            Ok((host.to_string(), port))
        }
        _ => Ok((authority.to_string(), DEFAULT_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket_target() {
        assert_eq!(
            parse_socket_target("localhost:6379").unwrap(),
            ("localhost".to_string(), 6379)
        );
        assert_eq!(
            parse_socket_target("redis.internal").unwrap(),
            ("redis.internal".to_string(), 80)
        );
        assert_eq!(
            parse_socket_target("tcp://10.0.0.1:9000/").unwrap(),
            ("10.0.0.1".to_string(), 9000)
        );
        assert_eq!(
            parse_socket_target("[::1]:7000").unwrap(),
            ("::1".to_string(), 7000)
        );
        assert!(parse_socket_target("host:notaport").is_err());
        assert!(parse_socket_target("").is_err());
    }
}
