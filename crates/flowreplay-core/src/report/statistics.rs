//! Aggregate counters over a report batch.

use super::ComparisonReport;
use crate::parser::ServiceNameParser;
use serde::Serialize;
use std::collections::BTreeMap;

/// Batch-level totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
    /// Records whose replay never produced a response
    pub replay_failures: usize,
    /// Percentage of matched records, 0 for an empty batch
    pub success_rate: f64,
}

impl ReportSummary {
    pub fn from_reports(reports: &[ComparisonReport]) -> Self {
        let total = reports.len();
        let matched = reports.iter().filter(|r| r.result.matched).count();
        let replay_failures = reports
            .iter()
            .filter(|r| r.replayed_response.is_none())
            .count();
        Self {
            total,
            matched,
            mismatched: total - matched,
            replay_failures,
            success_rate: percentage(matched, total),
        }
    }
}

/// Min/avg/max of a series of millisecond durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DurationStats {
    count: u64,
    total: u64,
    min: Option<u64>,
    max: u64,
}

impl DurationStats {
    pub fn add(&mut self, duration_ms: u64) {
        self.count += 1;
        self.total += duration_ms;
        self.min = Some(self.min.map_or(duration_ms, |min| min.min(duration_ms)));
        self.max = self.max.max(duration_ms);
    }

    pub fn min(&self) -> u64 {
        self.min.unwrap_or(0)
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

/// Per-service counters and latencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatistics {
    pub service_name: String,
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
    /// Response times recorded at capture
    pub original: DurationStats,
    /// Response times observed at replay
    pub replay: DurationStats,
}

impl ServiceStatistics {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            total: 0,
            matched: 0,
            mismatched: 0,
            original: DurationStats::default(),
            replay: DurationStats::default(),
        }
    }

    pub fn add(&mut self, report: &ComparisonReport) {
        self.total += 1;
        if report.result.matched {
            self.matched += 1;
        } else {
            self.mismatched += 1;
        }
        self.original.add(report.record.response.duration);
        self.replay.add(report.replay_duration_ms);
    }

    pub fn success_rate(&self) -> f64 {
        percentage(self.matched, self.total)
    }
}

/// Group reports by service name, sorted by name.
pub fn collect_statistics(
    reports: &[ComparisonReport],
    parser: &dyn ServiceNameParser,
) -> Vec<ServiceStatistics> {
    let mut by_service: BTreeMap<String, ServiceStatistics> = BTreeMap::new();
    for report in reports {
        let name = parser.service_name(&report.record);
        by_service
            .entry(name.clone())
            .or_insert_with(|| ServiceStatistics::new(name))
            .add(report);
    }
    by_service.into_values().collect()
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}
