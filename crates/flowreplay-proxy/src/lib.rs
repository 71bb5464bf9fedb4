//! Capture proxies and the `flowreplay` command line.
//!
//! # Module Structure
//!
//! - `config` - ProxyConfig, YAML loading and validation
//! - `proxy` - HTTP capture proxy
//! - `tcp` - Raw TCP capture proxy
//! - `metrics` - Prometheus metrics and the `/metrics` listener
//! - `network` - Listener construction
//! - `cli` - `record` and `replay` subcommands

pub mod cli;
pub mod config;
pub mod metrics;
pub mod network;
pub mod proxy;
mod sink;
pub mod tcp;

pub use config::{CaptureProtocol, ConfigError, ProxyConfig};
pub use proxy::HttpCaptureServer;
pub use tcp::TcpCaptureServer;
