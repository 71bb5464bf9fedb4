use super::http::HttpReplayer;
use super::tcp::TcpReplayer;
use super::{ReplayConfig, ReplayError};
use crate::model::{Protocol, ResponseData, TrafficRecord};
use async_trait::async_trait;

/// Executes one recorded exchange against a target.
#[async_trait]
pub trait ReplayExecutor: Send + Sync {
    async fn execute(&self, record: &TrafficRecord) -> Result<ResponseData, ReplayError>;
}

/// Dispatches each record to the HTTP or TCP replayer by its protocol.
pub struct TargetExecutor {
    http: HttpReplayer,
    tcp: TcpReplayer,
}

impl TargetExecutor {
    pub fn new(target: &str, config: &ReplayConfig) -> Result<Self, ReplayError> {
        if target.trim().is_empty() {
            return Err(ReplayError::InvalidTarget(target.to_string()));
        }
        Ok(Self {
            http: HttpReplayer::new(target, config)?,
            tcp: TcpReplayer::new(target, config)?,
        })
    }
}

#[async_trait]
impl ReplayExecutor for TargetExecutor {
    async fn execute(&self, record: &TrafficRecord) -> Result<ResponseData, ReplayError> {
        match record.protocol {
            Protocol::Http => self.http.replay(record).await,
            Protocol::Socket => self.tcp.replay(record).await,
        }
    }
}
