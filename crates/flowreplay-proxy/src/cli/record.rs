use crate::config::{CaptureProtocol, MetricsConfig, ProxyConfig};
use crate::metrics::MetricsServer;
use crate::proxy::HttpCaptureServer;
use crate::tcp::TcpCaptureServer;
use anyhow::Context;
use clap::Args;
use flowreplay_core::recorder::StorageRecorder;
use flowreplay_core::storage::FileStorage;
use flowreplay_core::TrafficRecorder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// YAML proxy configuration; flags override its values
    #[arg(short, long, env = "FLOWREPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on (all interfaces)
    #[arg(short, long, env = "FLOWREPLAY_PORT", conflicts_with = "listen")]
    pub port: Option<u16>,

    /// Full listen address, e.g. 127.0.0.1:8080
    #[arg(long, env = "FLOWREPLAY_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Upstream to forward to, as host:port
    #[arg(short, long, env = "FLOWREPLAY_TARGET")]
    pub target: Option<String>,

    /// Directory that receives the captured records
    #[arg(short, long, env = "FLOWREPLAY_OUTPUT")]
    pub output: Option<PathBuf>,

    /// http or tcp
    #[arg(long, env = "FLOWREPLAY_PROTOCOL")]
    pub protocol: Option<CaptureProtocol>,

    /// Label stored with TCP records (raw, redis, ...)
    #[arg(long, env = "FLOWREPLAY_PROTOCOL_PARSER")]
    pub protocol_parser: Option<String>,

    #[arg(long, env = "FLOWREPLAY_CONNECT_TIMEOUT_SECS")]
    pub connect_timeout_secs: Option<u64>,

    #[arg(long, env = "FLOWREPLAY_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Reject larger HTTP request bodies with 413
    #[arg(long, env = "FLOWREPLAY_MAX_BODY_BYTES")]
    pub max_body_bytes: Option<usize>,

    /// Time a TCP session may keep flowing one way after the other side closed
    #[arg(long, env = "FLOWREPLAY_DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: Option<u64>,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "FLOWREPLAY_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl RecordArgs {
    /// Configuration file (or defaults) overlaid with the given flags.
    pub fn proxy_config(&self) -> Result<ProxyConfig, anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => ProxyConfig::from_file(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(port) = self.port {
            config.listen.set_port(port);
        }
        if let Some(target) = &self.target {
            config.target = target.clone();
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(parser) = &self.protocol_parser {
            config.protocol_parser = parser.clone();
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(bytes) = self.max_body_bytes {
            config.max_body_bytes = bytes;
        }
        if let Some(ms) = self.drain_timeout_ms {
            config.drain_timeout_ms = ms;
        }
        if let Some(port) = self.metrics_port {
            config.metrics = Some(MetricsConfig { port });
        }

        config.validate()?;
        Ok(config)
    }
}

pub(crate) async fn run(args: RecordArgs) -> Result<(), anyhow::Error> {
    let config = args.proxy_config()?;

    let storage = FileStorage::new(&config.output)
        .with_context(|| format!("Failed to open output {}", config.output.display()))?;
    let recorder: Arc<dyn TrafficRecorder> = Arc::new(StorageRecorder::new(Arc::new(storage)));

    info!(
        "Starting {} capture on {} -> {}, writing to {}",
        config.protocol,
        config.listen,
        config.target,
        config.output.display()
    );

    if let Some(metrics) = &config.metrics {
        let addr = SocketAddr::new(config.listen.ip(), metrics.port);
        tokio::spawn(async move {
            if let Err(err) = MetricsServer::new(addr).run().await {
                error!("Metrics server stopped: {:#}", err);
            }
        });
    }

    let server = async {
        match config.protocol {
            CaptureProtocol::Http => {
                HttpCaptureServer::new(&config, Arc::clone(&recorder))?
                    .run()
                    .await
            }
            CaptureProtocol::Tcp => {
                TcpCaptureServer::new(&config, Arc::clone(&recorder))?
                    .run()
                    .await
            }
        }
    };

    let result = tokio::select! {
        result = server => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down capture");
            Ok(())
        }
    };

    recorder.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args() -> RecordArgs {
        RecordArgs {
            config: None,
            port: None,
            listen: None,
            target: None,
            output: None,
            protocol: None,
            protocol_parser: None,
            connect_timeout_secs: None,
            request_timeout_secs: None,
            max_body_bytes: None,
            drain_timeout_ms: None,
            metrics_port: None,
        }
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "listen: 127.0.0.1:7000\ntarget: old:1\nprotocol: tcp\nprotocol_parser: redis"
        )
        .unwrap();

        let config = RecordArgs {
            config: Some(file.path().to_path_buf()),
            port: Some(7001),
            target: Some("new:2".to_string()),
            metrics_port: Some(9100),
            ..args()
        }
        .proxy_config()
        .unwrap();

        assert_eq!(config.listen, "127.0.0.1:7001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.target, "new:2");
        assert_eq!(config.protocol, CaptureProtocol::Tcp);
        assert_eq!(config.protocol_parser, "redis");
        assert_eq!(config.metrics.unwrap().port, 9100);
    }

    #[test]
    fn test_invalid_target_rejected() {
        let result = RecordArgs {
            target: Some("http://host/".to_string()),
            ..args()
        }
        .proxy_config();
        assert!(result.is_err());
    }
}
