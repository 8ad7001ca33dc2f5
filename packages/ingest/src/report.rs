//! End-of-run summary table.

use std::fmt::Write as _;

use masters_game_models::{RunStatistics, SourceDescriptor, SourceOutcome, SourceReport};

use crate::pipeline::RunOutcome;

const RULE_WIDTH: usize = 78;

/// Renders per-source and aggregate counts, followed by the list of
/// skipped sources and the flag to re-run just those.
#[must_use]
pub fn render_summary(outcome: &RunOutcome) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{:<20} {:>8} {:>9} {:>9} {:>10}  STATUS",
        "SOURCE", "TOTAL", "ACCEPTED", "REJECTED", "DUPLICATES"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for report in &outcome.reports {
        write_row(&mut out, &report.source.label, &report.stats, &status(report));
    }

    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    write_row(
        &mut out,
        "TOTAL",
        &outcome.totals,
        &format!("{:.1}s", outcome.elapsed.as_secs_f64()),
    );

    let skipped: Vec<&SourceReport> = outcome.skipped().collect();
    if !skipped.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Skipped {} source(s):", skipped.len());
        for report in &skipped {
            if let SourceOutcome::Skipped { stage, reason } = &report.outcome {
                let _ = writeln!(out, "  {} ({stage}): {reason}", report.source.label);
            }
        }
        let labels: Vec<&str> = skipped.iter().map(|r| r.source.label.as_str()).collect();
        let _ = writeln!(out, "Re-run with: --sources {}", labels.join(","));
    }

    out
}

/// Renders the configured source list with each archive's URL.
#[must_use]
pub fn render_sources(sources: &[SourceDescriptor], base_url: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<20} URL", "LABEL");
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for source in sources {
        let _ = writeln!(out, "{:<20} {}", source.label, source.url(base_url));
    }
    out
}

fn status(report: &SourceReport) -> String {
    match &report.outcome {
        SourceOutcome::Completed => "ok".to_string(),
        SourceOutcome::Skipped { stage, .. } => format!("SKIPPED ({stage})"),
    }
}

fn write_row(out: &mut String, label: &str, stats: &RunStatistics, status: &str) {
    let _ = writeln!(
        out,
        "{label:<20} {:>8} {:>9} {:>9} {:>10}  {status}",
        stats.total, stats.accepted, stats.rejected, stats.duplicates
    );
}
