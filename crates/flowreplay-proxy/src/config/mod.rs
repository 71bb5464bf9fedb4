//! Capture proxy configuration.
//!
//! A [`ProxyConfig`] can be loaded from YAML and is then overlaid with
//! command-line flags before the proxy starts.
//!
//! ```yaml
//! listen: 0.0.0.0:8080
//! target: localhost:9000
//! protocol: tcp
//! output: ./recordings
//! protocol_parser: redis
//! drain_timeout_ms: 2000
//! metrics:
//!   port: 9091
//! ```

mod protocol;

pub use protocol::CaptureProtocol;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TARGET_PORT: u16 = 80;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid target '{0}': expected host:port")]
    InvalidTarget(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Upstream as `host:port`; a bare host means port 80
    #[serde(default = "default_target")]
    pub target: String,

    #[serde(default)]
    pub protocol: CaptureProtocol,

    /// Storage directory for captured records
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Label stored as the request method of TCP records
    #[serde(default = "default_protocol_parser")]
    pub protocol_parser: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Larger inbound HTTP bodies are rejected with 413
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// How long the opposite TCP direction may keep flowing after a half-close
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_target() -> String {
    "localhost:8080".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("./recordings")
}

fn default_protocol_parser() -> String {
    "raw".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            target: default_target(),
            protocol: CaptureProtocol::default(),
            output: default_output(),
            protocol_parser: default_protocol_parser(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            drain_timeout_ms: default_drain_timeout_ms(),
            metrics: None,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ProxyConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.target_addr()?;

        if self.protocol_parser.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "protocol_parser must not be empty".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs and request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be positive".to_string(),
            ));
        }
        if let Some(metrics) = &self.metrics {
            if metrics.port == self.listen.port() && metrics.port != 0 {
                return Err(ConfigError::Invalid(format!(
                    "metrics port {} collides with the capture listener",
                    metrics.port
                )));
            }
        }
        Ok(())
    }

    /// Split `target` into host and port.
    pub fn target_addr(&self) -> Result<(String, u16), ConfigError> {
        split_host_port(&self.target)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

fn split_host_port(target: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidTarget(target.to_string());
    let target = target.trim();
    if target.is_empty() || target.contains('/') {
        return Err(invalid());
    }

    if let Some(rest) = target.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match after {
            "" => DEFAULT_TARGET_PORT,
            _ => after
                .strip_prefix(':')
                .and_then(|port| port.parse().ok())
                .ok_or_else(invalid)?,
        };
        return Ok((host.to_string(), port));
    }

    match target.split_once(':') {
        None => Ok((target.to_string(), DEFAULT_TARGET_PORT)),
        Some((host, port)) if !host.is_empty() => {
            let port: u16 = port.parse().map_err(|_| invalid())?;
            if port == 0 {
                return Err(invalid());
            }
            Ok((host.to_string(), port))
        }
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.protocol, CaptureProtocol::Http);
        assert_eq!(config.protocol_parser, "raw");
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let yaml = r#"
listen: 127.0.0.1:6380
target: localhost:6379
protocol: tcp
protocol_parser: redis
metrics: {}
"#;
        let config: ProxyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.port(), 6380);
        assert_eq!(config.protocol, CaptureProtocol::Tcp);
        assert_eq!(config.protocol_parser, "redis");
        assert_eq!(config.drain_timeout(), Duration::from_millis(5000));
        assert_eq!(config.metrics.unwrap().port, 9090);
        assert_eq!(config.output, PathBuf::from("./recordings"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "target: backend:9000\nmax_body_bytes: 1024").unwrap();

        let config = ProxyConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.target_addr().unwrap(),
            ("backend".to_string(), 9000)
        );
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            ProxyConfig::from_file("/nonexistent/proxy.yaml"),
            Err(ConfigError::Io { .. })
        ));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "protocol: carrier-pigeon").unwrap();
        assert!(matches!(
            ProxyConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_target_forms() {
        assert_eq!(
            split_host_port("localhost").unwrap(),
            ("localhost".to_string(), 80)
        );
        assert_eq!(
            split_host_port("[::1]:6379").unwrap(),
            ("::1".to_string(), 6379)
        );
        assert!(split_host_port("").is_err());
        assert!(split_host_port(":80").is_err());
        assert!(split_host_port("host:0").is_err());
        assert!(split_host_port("host:http").is_err());
        assert!(split_host_port("http://host:80/").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ProxyConfig {
            max_body_bytes: 0,
            ..ProxyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.max_body_bytes = 1;
        config.protocol_parser = " ".to_string();
        assert!(config.validate().is_err());

        config.protocol_parser = "raw".to_string();
        config.metrics = Some(MetricsConfig { port: 8080 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("TCP".parse::<CaptureProtocol>(), Ok(CaptureProtocol::Tcp));
        assert_eq!("http".parse::<CaptureProtocol>(), Ok(CaptureProtocol::Http));
        assert!("udp".parse::<CaptureProtocol>().is_err());
    }
}
