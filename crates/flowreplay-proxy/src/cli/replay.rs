use anyhow::Context;
use clap::Args;
use flowreplay_core::comparator::{default_rules, load_rules, Comparator};
use flowreplay_core::parser::ParserRegistry;
use flowreplay_core::report::{
    collect_statistics, render_text_summary, replay_and_compare, HtmlReportGenerator,
    ReportSummary,
};
use flowreplay_core::storage::{FileStorage, QueryCriteria, DEFAULT_QUERY_LIMIT};
use flowreplay_core::{Protocol, ReplayConfig, ReplayMode, Replayer, TrafficStorage};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Directory holding recorded traffic
    #[arg(short, long, env = "FLOWREPLAY_INPUT", default_value = "./recordings")]
    pub input: PathBuf,

    /// Replay target, e.g. http://localhost:9090
    #[arg(short, long, env = "FLOWREPLAY_REPLAY_TARGET")]
    pub target: String,

    /// sequential or concurrent
    #[arg(short, long, env = "FLOWREPLAY_MODE", default_value_t = ReplayMode::Sequential)]
    pub mode: ReplayMode,

    /// Compare every replayed response with its recording
    #[arg(long)]
    pub compare: bool,

    /// Comparison rules file; built-in defaults when absent or unusable
    #[arg(long, env = "FLOWREPLAY_RULES")]
    pub rules: Option<PathBuf>,

    /// Write an HTML report here (implies --compare)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Service name parser used for per-service statistics (uri, esb)
    #[arg(long, default_value = "uri")]
    pub service_parser: String,

    /// Only replay records of this protocol (HTTP or SOCKET)
    #[arg(long)]
    pub protocol: Option<Protocol>,

    #[arg(long, default_value_t = DEFAULT_QUERY_LIMIT)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Cap on in-flight records in concurrent mode
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Silence that ends a TCP response
    #[arg(long, default_value_t = 5000)]
    pub tcp_idle_timeout_ms: u64,
}

impl ReplayArgs {
    fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            tcp_idle_timeout: Duration::from_millis(self.tcp_idle_timeout_ms),
            max_concurrency: self.max_concurrency,
            ..ReplayConfig::default()
        }
    }

    fn criteria(&self) -> QueryCriteria {
        let criteria = QueryCriteria::new().limit(self.limit).offset(self.offset);
        match self.protocol {
            Some(protocol) => criteria.protocol(protocol),
            None => criteria,
        }
    }
}

pub(crate) async fn run(args: ReplayArgs) -> Result<(), anyhow::Error> {
    // Fail on an unknown parser before spending time on the replay.
    let service_parser = ParserRegistry::with_builtin().get(Some(args.service_parser.as_str()))?;

    let storage = FileStorage::new(&args.input)
        .with_context(|| format!("Failed to open input {}", args.input.display()))?;
    let records = storage
        .query(&args.criteria())
        .context("Failed to load recorded traffic")?;
    info!(
        "Loaded {} records from {}",
        records.len(),
        args.input.display()
    );
    if records.is_empty() {
        warn!("Nothing to replay");
        return Ok(());
    }

    let replayer = Replayer::new(&args.target, args.replay_config())
        .with_context(|| format!("Invalid replay target {}", args.target))?;

    if !args.compare && args.report.is_none() {
        let results = replayer.replay(&records, args.mode).await;
        let succeeded = results.iter().filter(|r| r.success).count();
        println!("Replay completed: {}/{} succeeded", succeeded, results.len());
        return Ok(());
    }

    let rules = match &args.rules {
        Some(path) => load_rules(path),
        None => default_rules(),
    };
    let comparator = Comparator::new(&rules).context("Invalid comparison rules")?;

    let reports = replay_and_compare(&replayer, &comparator, &records, args.mode).await;
    let summary = ReportSummary::from_reports(&reports);
    let services = collect_statistics(&reports, service_parser.as_ref());

    print!("{}", render_text_summary(&summary, &services));

    if let Some(path) = &args.report {
        HtmlReportGenerator::new().write(&reports, &services, path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}
