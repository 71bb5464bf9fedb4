//! HTML report rendering.

use super::statistics::{ReportSummary, ServiceStatistics};
use super::{ComparisonReport, ReportError};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

const STYLES: &str = r#"
    body { font-family: Arial, sans-serif; margin: 20px; background: #f5f5f5; }
    .header { background: #2196F3; color: white; padding: 20px; border-radius: 5px; }
    .summary, .services { background: white; padding: 20px; margin: 20px 0; border-radius: 5px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
    .stat { display: inline-block; margin: 10px 20px; }
    .stat-value { font-size: 32px; font-weight: bold; }
    .stat-label { color: #666; }
    .matched { color: #4CAF50; }
    .mismatched { color: #f44336; }
    table { border-collapse: collapse; width: 100%; }
    th, td { text-align: left; padding: 6px 10px; border-bottom: 1px solid #eee; }
    .report-item { background: white; margin: 10px 0; padding: 15px; border-radius: 5px; border-left: 4px solid #ddd; }
    .report-item.matched { border-left-color: #4CAF50; color: inherit; }
    .report-item.mismatched { border-left-color: #f44336; color: inherit; }
    .diff { background: #fff3cd; padding: 10px; margin: 5px 0; border-radius: 3px; }
    .diff-path { font-weight: bold; color: #856404; }
    .diff-value { font-family: monospace; white-space: pre-wrap; }
"#;

/// Renders a batch of reports as one self-contained HTML page.
#[derive(Debug, Clone, Default)]
pub struct HtmlReportGenerator {
    title: Option<String>,
}

impl HtmlReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn render(&self, reports: &[ComparisonReport], services: &[ServiceStatistics]) -> String {
        let title = escape_html(self.title.as_deref().unwrap_or("FlowReplay Comparison Report"));
        let mut html = String::with_capacity(4096 + reports.len() * 512);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        let _ = writeln!(html, "<title>{title}</title>");
        let _ = writeln!(html, "<style>{STYLES}</style>");
        html.push_str("</head>\n<body>\n");

        let _ = writeln!(
            html,
            "<div class=\"header\"><h1>{title}</h1><p>Generated at {}</p></div>",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );

        render_summary(&mut html, &ReportSummary::from_reports(reports));
        if !services.is_empty() {
            render_services(&mut html, services);
        }
        render_details(&mut html, reports);

        html.push_str("</body>\n</html>\n");
        html
    }

    pub fn write(
        &self,
        reports: &[ComparisonReport],
        services: &[ServiceStatistics],
        path: impl AsRef<Path>,
    ) -> Result<(), ReportError> {
        let path = path.as_ref();
        std::fs::write(path, self.render(reports, services)).map_err(|source| {
            ReportError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
        info!("Wrote HTML report to {}", path.display());
        Ok(())
    }
}

fn render_summary(html: &mut String, summary: &ReportSummary) {
    html.push_str("<div class=\"summary\">\n<h2>Summary</h2>\n");
    let stats = [
        ("", summary.total.to_string(), "Total"),
        ("matched", summary.matched.to_string(), "Matched"),
        ("mismatched", summary.mismatched.to_string(), "Mismatched"),
        ("mismatched", summary.replay_failures.to_string(), "Replay failures"),
        ("", format!("{:.2}%", summary.success_rate), "Success rate"),
    ];
    for (class, value, label) in stats {
        let _ = writeln!(
            html,
            "<div class=\"stat\"><div class=\"stat-value {class}\">{value}</div><div class=\"stat-label\">{label}</div></div>"
        );
    }
    html.push_str("</div>\n");
}

fn render_services(html: &mut String, services: &[ServiceStatistics]) {
    html.push_str("<div class=\"services\">\n<h2>Services</h2>\n<table>\n");
    html.push_str(
        "<tr><th>Service</th><th>Total</th><th>Matched</th><th>Mismatched</th><th>Success</th>\
         <th>Original min/avg/max (ms)</th><th>Replay min/avg/max (ms)</th></tr>\n",
    );
    for service in services {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td><td>{} / {:.1} / {}</td><td>{} / {:.1} / {}</td></tr>",
            escape_html(&service.service_name),
            service.total,
            service.matched,
            service.mismatched,
            service.success_rate(),
            service.original.min(),
            service.original.avg(),
            service.original.max(),
            service.replay.min(),
            service.replay.avg(),
            service.replay.max(),
        );
    }
    html.push_str("</table>\n</div>\n");
}

fn render_details(html: &mut String, reports: &[ComparisonReport]) {
    html.push_str("<div class=\"details\">\n<h2>Details</h2>\n");
    for (index, report) in reports.iter().enumerate() {
        let (class, verdict) = if report.result.matched {
            ("matched", "&#10003; matched")
        } else {
            ("mismatched", "&#10007; mismatched")
        };
        let record = &report.record;

        let _ = writeln!(html, "<div class=\"report-item {class}\">");
        let _ = writeln!(
            html,
            "<h3>#{} - {}</h3>",
            index + 1,
            escape_html(&record.id)
        );
        let _ = writeln!(
            html,
            "<p><strong>{}</strong> {} <code>{}</code></p>",
            record.protocol,
            escape_html(&record.request.method),
            escape_html(&record.request.uri)
        );
        let _ = writeln!(
            html,
            "<p>Status: <span class=\"{class}\">{verdict}</span> &middot; replay {}ms</p>",
            report.replay_duration_ms
        );

        for diff in &report.result.differences {
            let _ = writeln!(
                html,
                "<div class=\"diff\"><div class=\"diff-path\">{} ({})</div>\
                 <div class=\"diff-value\">expected: {}</div>\
                 <div class=\"diff-value\">actual: {}</div></div>",
                escape_html(&diff.path),
                diff.kind,
                escape_html(&diff.expected),
                escape_html(&diff.actual)
            );
        }
        html.push_str("</div>\n");
    }
    html.push_str("</div>\n");
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
