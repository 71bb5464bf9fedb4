//! HttpCaptureServer and its accept loop.

use super::handler::{handle_request, CaptureContext};
use crate::config::ProxyConfig;
use crate::network::create_listener;
use crate::sink::authority;
use anyhow::Context;
use flowreplay_core::transport::HttpForwarder;
use flowreplay_core::TrafficRecorder;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// HTTP/1.1 proxy that records one exchange per request.
pub struct HttpCaptureServer {
    listen: SocketAddr,
    context: Arc<CaptureContext>,
}

impl HttpCaptureServer {
    pub fn new(
        config: &ProxyConfig,
        recorder: Arc<dyn TrafficRecorder>,
    ) -> Result<Self, anyhow::Error> {
        let (target_host, target_port) = config.target_addr()?;
        let forwarder = HttpForwarder::new(config.connect_timeout(), config.request_timeout())
            .context("Failed to create forwarding client")?;

        Ok(Self {
            listen: config.listen,
            context: Arc::new(CaptureContext {
                target_base: format!("http://{}", authority(&target_host, target_port)),
                target_host,
                target_port,
                forwarder,
                recorder,
                max_body_bytes: config.max_body_bytes,
            }),
        })
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = create_listener(self.listen)
            .with_context(|| format!("Failed to bind {}", self.listen))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!(
            "Capturing HTTP on {} -> {}",
            listener.local_addr()?,
            self.context.target_base
        );

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("Failed to accept connection: {}", err);
                    continue;
                }
            };
            let context = Arc::clone(&self.context);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| handle_request(req, Arc::clone(&context)));
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(
                        "Error serving HTTP connection from {}: {}",
                        remote_addr, err
                    );
                }
            });
        }
    }
}
