//! Comparison reports.
//!
//! # Module Structure
//!
//! - `statistics` - Summary counters and per-service latency statistics
//! - `html` - Self-contained HTML report
//! - `text` - Console summary

mod html;
mod statistics;
mod text;

pub use html::HtmlReportGenerator;
pub use statistics::{collect_statistics, DurationStats, ReportSummary, ServiceStatistics};
pub use text::render_text_summary;

use crate::comparator::Comparator;
use crate::model::{ComparisonResult, ReplayResult, ResponseData, TrafficRecord};
use crate::replay::{ReplayMode, Replayer};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One record with its replay outcome and verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub record: TrafficRecord,
    /// Absent when the replay failed
    pub replayed_response: Option<ResponseData>,
    pub result: ComparisonResult,
    pub replay_duration_ms: u64,
    pub replay_timestamp: DateTime<Utc>,
}

/// Pair replay results with their records and compare each pair.
///
/// Pairing is by index. The output always has one entry per record, in
/// record order; a missing or failed replay becomes a failure verdict.
pub fn build_reports(
    records: &[TrafficRecord],
    results: &[ReplayResult],
    comparator: &Comparator,
    replay_timestamp: DateTime<Utc>,
) -> Vec<ComparisonReport> {
    if records.len() != results.len() {
        warn!(
            "Replay produced {} results for {} records",
            results.len(),
            records.len()
        );
    }

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let replay = results.get(index);
            let result = match replay {
                Some(replay) => comparator.compare_replay(record, replay),
                None => ComparisonResult::replay_failure(Some("no replay result")),
            };
            ComparisonReport {
                record: record.clone(),
                replayed_response: replay.and_then(|r| r.response.clone()),
                result,
                replay_duration_ms: replay.map_or(0, |r| r.duration),
                replay_timestamp,
            }
        })
        .collect()
}

/// Replay a batch and compare every outcome.
pub async fn replay_and_compare(
    replayer: &Replayer,
    comparator: &Comparator,
    records: &[TrafficRecord],
    mode: ReplayMode,
) -> Vec<ComparisonReport> {
    let started = Utc::now();
    let results = replayer.replay(records, mode).await;
    build_reports(records, &results, comparator, started)
}
