use super::statistics::{ReportSummary, ServiceStatistics};
use std::fmt::Write as _;

/// Plain-text summary for the console.
pub fn render_text_summary(summary: &ReportSummary, services: &[ServiceStatistics]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total:           {}", summary.total);
    let _ = writeln!(out, "Matched:         {}", summary.matched);
    let _ = writeln!(out, "Mismatched:      {}", summary.mismatched);
    let _ = writeln!(out, "Replay failures: {}", summary.replay_failures);
    let _ = writeln!(out, "Success rate:    {:.2}%", summary.success_rate);

    if services.is_empty() {
        return out;
    }

    let width = services
        .iter()
        .map(|s| s.service_name.len())
        .max()
        .unwrap_or(0)
        .max("Service".len());

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<width$}  {:>6}  {:>7}  {:>8}  {:>12}  {:>12}",
        "Service", "Total", "Matched", "Success", "Orig avg ms", "Replay avg ms"
    );
    for service in services {
        let _ = writeln!(
            out,
            "{:<width$}  {:>6}  {:>7}  {:>7.2}%  {:>12.1}  {:>12.1}",
            service.service_name,
            service.total,
            service.matched,
            service.success_rate(),
            service.original.avg(),
            service.replay.avg(),
        );
    }
    out
}
