//! Command-line surface of the `flowreplay` binary.
//!
//! # Module Structure
//!
//! - `record` - Run an HTTP or TCP capture proxy into a storage directory
//! - `replay` - Replay stored records, compare and report

mod record;
mod replay;

pub use record::RecordArgs;
pub use replay::ReplayArgs;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "flowreplay",
    version,
    about = "Record production traffic, replay it against a new target and compare the responses"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "FLOWREPLAY_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture traffic through a proxy
    Record(RecordArgs),
    /// Replay captured traffic and optionally compare the responses
    Replay(ReplayArgs),
}

impl Cli {
    pub async fn run(self) -> Result<(), anyhow::Error> {
        match self.command {
            Command::Record(args) => record::run(args).await,
            Command::Replay(args) => replay::run(args).await,
        }
    }
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = result {
        eprintln!("Logging already initialized: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureProtocol;
    use flowreplay_core::{Protocol, ReplayMode};

    #[test]
    fn test_record_arguments() {
        let cli = Cli::try_parse_from([
            "flowreplay",
            "record",
            "--protocol",
            "tcp",
            "--port",
            "6380",
            "--target",
            "localhost:6379",
            "--output",
            "/tmp/recordings",
            "--protocol-parser",
            "redis",
        ])
        .unwrap();

        let Command::Record(args) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(args.protocol, Some(CaptureProtocol::Tcp));
        assert_eq!(args.port, Some(6380));
        assert_eq!(args.target.as_deref(), Some("localhost:6379"));
        assert_eq!(args.protocol_parser.as_deref(), Some("redis"));
    }

    #[test]
    fn test_replay_arguments() {
        let cli = Cli::try_parse_from([
            "flowreplay",
            "--log-json",
            "replay",
            "--input",
            "./recordings",
            "--target",
            "http://localhost:9090",
            "--mode",
            "concurrent",
            "--compare",
            "--report",
            "report.html",
            "--protocol",
            "HTTP",
            "--limit",
            "10",
        ])
        .unwrap();

        assert!(cli.log_json);
        let Command::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.mode, ReplayMode::Concurrent);
        assert!(args.compare);
        assert_eq!(args.protocol, Some(Protocol::Http));
        assert_eq!(args.limit, 10);
        assert_eq!(args.offset, 0);
        assert_eq!(args.service_parser, "uri");
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Cli::try_parse_from([
            "flowreplay",
            "replay",
            "--target",
            "http://localhost:9090",
            "--mode",
            "parallel",
        ])
        .is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
