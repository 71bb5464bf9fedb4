//! TcpCaptureServer and its accept loop.

use super::session::{run_session, SessionSettings};
use crate::config::ProxyConfig;
use crate::network::create_listener;
use anyhow::Context;
use flowreplay_core::TrafficRecorder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Raw TCP relay that records one exchange per connection.
pub struct TcpCaptureServer {
    listen: SocketAddr,
    settings: Arc<SessionSettings>,
}

impl TcpCaptureServer {
    pub fn new(
        config: &ProxyConfig,
        recorder: Arc<dyn TrafficRecorder>,
    ) -> Result<Self, anyhow::Error> {
        let (target_host, target_port) = config.target_addr()?;

        Ok(Self {
            listen: config.listen,
            settings: Arc::new(SessionSettings {
                target_host,
                target_port,
                protocol_parser: config.protocol_parser.clone(),
                connect_timeout: config.connect_timeout(),
                drain_timeout: config.drain_timeout(),
                recorder,
            }),
        })
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = create_listener(self.listen)
            .with_context(|| format!("Failed to bind {}", self.listen))?;
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!(
            "Capturing TCP on {} -> {} (parser: {})",
            listener.local_addr()?,
            self.settings.target(),
            self.settings.protocol_parser
        );

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("Failed to accept connection: {}", err);
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);
            let settings = Arc::clone(&self.settings);

            tokio::spawn(run_session(stream, peer, settings));
        }
    }
}
