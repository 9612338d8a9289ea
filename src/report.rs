//! Dashboard rendering for `pulse report`.
//!
//! Loads a snapshot (an explicit file, or the newest one in the output
//! directory), computes metrics once, and renders them either as a plain
//! text dashboard on stdout or as a single JSON document.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::config::Config;
use crate::metrics::{self, DateRange, MetricsResult};
use crate::models::NormalizedRecord;
use crate::store;

/// Output format for `pulse report`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

const TITLE_WIDTH: usize = 48;

/// Run the report command.
pub fn run_report(
    config: &Config,
    file: Option<PathBuf>,
    since: Option<String>,
    until: Option<String>,
    format: ReportFormat,
    top: usize,
) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => store::latest_snapshot(
            &config.output.dir,
            &config.output.prefix,
            config.github.project_number,
        )?
        .with_context(|| {
            format!(
                "no snapshot found in {} (run `pulse sync` first or pass --file)",
                config.output.dir.display()
            )
        })?,
    };

    let snapshot = store::read_snapshot(&path)
        .with_context(|| format!("failed to load snapshot {}", path.display()))?;
    tracing::debug!(path = %path.display(), records = snapshot.len(), "loaded snapshot");

    let since = parse_date(since.as_deref(), "--since")?;
    let until = parse_date(until.as_deref(), "--until")?;
    if let (Some(s), Some(u)) = (since, until) {
        if s > u {
            anyhow::bail!("--since ({}) is after --until ({})", s, u);
        }
    }

    let range = DateRange::resolve(&snapshot, since, until);
    let now = Utc::now().naive_utc();
    let result = metrics::compute(&snapshot, range, now);

    match format {
        ReportFormat::Text => print!("{}", render_text(&result, top)),
        ReportFormat::Json => println!("{}", render_json(&result)?),
    }
    Ok(())
}

fn parse_date(value: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .with_context(|| format!("{} expects YYYY-MM-DD, got '{}'", flag, v))
        })
        .transpose()
}

pub fn render_json(result: &MetricsResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Render the text dashboard. `top` limits the label ranking.
pub fn render_text(result: &MetricsResult, top: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Project Pulse: Team Overview");
    let _ = writeln!(out, "============================");
    match result.range {
        Some(range) => {
            let _ = writeln!(
                out,
                "Showing {} items created between {} and {}.",
                result.total, range.start, range.end
            );
        }
        None => {
            let _ = writeln!(out, "Showing {} items.", result.total);
        }
    }

    section(&mut out, "Completion Rate");
    let _ = writeln!(out, "  Completion Rate (%): {:.1}", result.completion_rate);
    let _ = writeln!(out, "  Completed: {} / {}", result.completed, result.total);

    section(&mut out, "Average Time to Completion (Done/Closed)");
    match result.mean_cycle_days {
        Some(days) => {
            let _ = writeln!(out, "  Average Days to Completion: {:.1}", days);
        }
        None => empty(&mut out, "No completed items in the selected date range."),
    }

    section(&mut out, "Items Created vs. Closed (per Month)");
    if result.trend.is_empty() {
        empty(&mut out, "No items in the selected date range.");
    } else {
        let _ = writeln!(out, "  {:<10} {:>8} {:>8}", "MONTH", "CREATED", "CLOSED");
        let _ = writeln!(out, "  {}", "-".repeat(28));
        for point in &result.trend {
            let _ = writeln!(
                out,
                "  {:<10} {:>8} {:>8}",
                point.month.to_string(),
                point.created,
                point.closed
            );
        }
    }

    section(&mut out, "Open vs. Closed Items by Assignee");
    if result.workload.is_empty() {
        empty(&mut out, "No assignee data available.");
    } else {
        let _ = writeln!(out, "  {:<24} {:>6} {:>8}", "ASSIGNEE", "OPEN", "CLOSED");
        let _ = writeln!(out, "  {}", "-".repeat(40));
        for row in &result.workload {
            let _ = writeln!(out, "  {:<24} {:>6} {:>8}", row.assignee, row.open, row.closed);
        }
    }

    section(&mut out, &format!("Most Common Labels (top {})", top));
    if result.labels.is_empty() {
        empty(&mut out, "No label data available.");
    } else {
        let _ = writeln!(out, "  {:<32} {:>6}", "LABEL", "COUNT");
        let _ = writeln!(out, "  {}", "-".repeat(39));
        for label in result.labels.iter().take(top) {
            let _ = writeln!(out, "  {:<32} {:>6}", label.label, label.count);
        }
    }

    section(&mut out, "Flagged Items: Missing Label or Assignee");
    record_table(&mut out, &result.missing_metadata, "No flagged items found.", |_| None);

    section(
        &mut out,
        &format!(
            "Stale Items (Open, Not Updated in {}+ Days)",
            metrics::STALE_AFTER_DAYS
        ),
    );
    record_table(&mut out, &result.stale, "No stale items found.", |r| {
        Some(r.updated_at.format("%Y-%m-%d").to_string())
    });

    section(
        &mut out,
        &format!(
            "Recently Closed Items (Last {} Days)",
            metrics::RECENT_WITHIN_DAYS
        ),
    );
    record_table(
        &mut out,
        &result.recently_closed,
        "No recently closed items found.",
        |r| Some(r.updated_at.format("%Y-%m-%d").to_string()),
    );

    section(&mut out, "Items With Multiple Assignees");
    record_table(
        &mut out,
        &result.multi_owner,
        "No items with multiple assignees found.",
        |r| Some(r.assignees.join(", ")),
    );

    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", title);
}

fn empty(out: &mut String, message: &str) {
    let _ = writeln!(out, "  {}", message);
}

/// Title, status and URL per record, plus an optional trailing column.
fn record_table<F>(out: &mut String, records: &[NormalizedRecord], empty_message: &str, extra: F)
where
    F: Fn(&NormalizedRecord) -> Option<String>,
{
    if records.is_empty() {
        empty(out, empty_message);
        return;
    }
    for record in records {
        let mut line = format!(
            "  {:<width$} {:<14} {}",
            truncate(&record.title, TITLE_WIDTH),
            record.status.as_deref().unwrap_or("-"),
            record.url.as_deref().unwrap_or("-"),
            width = TITLE_WIDTH
        );
        if let Some(extra) = extra(record) {
            line.push_str("  ");
            line.push_str(&extra);
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
