//! Replay engine.
//!
//! Re-issues captured records against a new target and returns one
//! [`ReplayResult`] per record, aligned by index with the input.
//!
//! # Module Structure
//!
//! - `executor` - Per-record execution seam and protocol dispatch
//! - `http` - HTTP replay
//! - `tcp` - Raw TCP session replay
//!
//! # Modes
//!
//! - [`ReplayMode::Sequential`] runs one record at a time in input order. Use
//!   it when exchanges depend on server-side state left by earlier ones.
//! - [`ReplayMode::Concurrent`] runs every record as its own task. Results are
//!   still returned in input order, but requests reach the target in no
//!   particular order.
//!
//! A failing record never stops the batch; its error becomes a failed result.

mod executor;
mod http;
mod tcp;

#[cfg(test)]
mod tests;

pub use executor::{ReplayExecutor, TargetExecutor};
pub use http::HttpReplayer;
pub use tcp::TcpReplayer;

use crate::model::{ReplayResult, TrafficRecord};
use crate::transport::TransportError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    #[default]
    Sequential,
    Concurrent,
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayMode::Sequential => f.write_str("sequential"),
            ReplayMode::Concurrent => f.write_str("concurrent"),
        }
    }
}

impl FromStr for ReplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(ReplayMode::Sequential),
            "concurrent" => Ok(ReplayMode::Concurrent),
            other => Err(format!("Unknown replay mode: {other}")),
        }
    }
}

/// Timeouts and limits for a replay session.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub connect_timeout: Duration,
    /// Whole HTTP exchange, including reading the response body
    pub request_timeout: Duration,
    /// Wait for the first byte of a TCP response
    pub tcp_initial_read_timeout: Duration,
    /// Silence after which a TCP response is considered complete
    pub tcp_idle_timeout: Duration,
    /// Cap on in-flight records in concurrent mode; `None` is unbounded
    pub max_concurrency: Option<usize>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            tcp_initial_read_timeout: Duration::from_secs(30),
            tcp_idle_timeout: Duration::from_secs(5),
            max_concurrency: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Invalid target '{0}'")]
    InvalidTarget(String),
    #[error("Connection to {target} timed out after {timeout_ms}ms")]
    ConnectTimeout { target: String, timeout_ms: u64 },
    #[error("Connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// Drives a batch of records through a [`ReplayExecutor`].
#[derive(Clone)]
pub struct Replayer {
    executor: Arc<dyn ReplayExecutor>,
    max_concurrency: Option<usize>,
}

impl Replayer {
    /// Replayer against `target` (`host:port` or a base URL).
    pub fn new(target: &str, config: ReplayConfig) -> Result<Self, ReplayError> {
        let executor = TargetExecutor::new(target, &config)?;
        Ok(Self {
            executor: Arc::new(executor),
            max_concurrency: config.max_concurrency,
        })
    }

    pub fn with_executor(executor: Arc<dyn ReplayExecutor>, max_concurrency: Option<usize>) -> Self {
        Self {
            executor,
            max_concurrency,
        }
    }

    /// Replay every record. `result[i]` always belongs to `records[i]`.
    pub async fn replay(&self, records: &[TrafficRecord], mode: ReplayMode) -> Vec<ReplayResult> {
        info!("Replaying {} records in {} mode", records.len(), mode);
        let started = Instant::now();

        let results = match mode {
            ReplayMode::Sequential => self.replay_sequential(records).await,
            ReplayMode::Concurrent => self.replay_concurrent(records).await,
        };

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            "Replay finished: {} succeeded, {} failed in {}ms",
            succeeded,
            results.len() - succeeded,
            started.elapsed().as_millis()
        );
        results
    }

    async fn replay_sequential(&self, records: &[TrafficRecord]) -> Vec<ReplayResult> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(replay_one(self.executor.as_ref(), record).await);
        }
        results
    }

    async fn replay_concurrent(&self, records: &[TrafficRecord]) -> Vec<ReplayResult> {
        let limiter = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let mut tasks = JoinSet::new();

        for (index, record) in records.iter().enumerate() {
            let executor = self.executor.clone();
            let limiter = limiter.clone();
            let record = record.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                (index, replay_one(executor.as_ref(), &record).await)
            });
        }

        let mut slots: Vec<Option<ReplayResult>> = (0..records.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!("Replay task failed: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(records)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| {
                    ReplayResult::failure(record.id.clone(), 0, "replay task aborted")
                })
            })
            .collect()
    }
}

/// Replay a single record, turning every error into a failed result.
async fn replay_one(executor: &dyn ReplayExecutor, record: &TrafficRecord) -> ReplayResult {
    let started = Instant::now();
    let outcome = executor.execute(record).await;
    let duration = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(response) => {
            debug!(
                "Replayed {} -> status {} in {}ms",
                record.id, response.status_code, duration
            );
            ReplayResult::success(record.id.clone(), response, duration)
        }
        Err(e) => {
            warn!("Replay of {} failed: {}", record.id, e);
            ReplayResult::failure(record.id.clone(), duration, e.to_string())
        }
    }
}
