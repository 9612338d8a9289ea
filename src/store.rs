//! CSV persistence for snapshots and discovery of the latest snapshot file.
//!
//! The on-disk format is one row per record with the columns
//! `title,number,url,assignees,labels,status,created_at,updated_at`.
//! Multi-value columns are joined with `", "` and split again exactly once,
//! when a file is read. Timestamps are written as ISO-8601 without an offset;
//! sub-second precision is kept when present.
//!
//! File names follow `{prefix}_{project_number}_items_{YYYY-MM-DD}.csv`, so
//! the lexicographically greatest match in a directory is the newest one.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use globset::Glob;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{PulseError, Result};
use crate::models::NormalizedRecord;
use crate::snapshot::Snapshot;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const LIST_SEPARATOR: &str = ", ";

/// A CSV row. Field order defines the column order.
#[derive(Debug, Serialize, Deserialize)]
struct Row {
    title: String,
    number: Option<String>,
    url: Option<String>,
    assignees: Option<String>,
    labels: Option<String>,
    status: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<&NormalizedRecord> for Row {
    fn from(record: &NormalizedRecord) -> Self {
        Row {
            title: record.title.clone(),
            number: record.number.map(|n| n.to_string()),
            url: record.url.clone(),
            assignees: Some(record.assignees.join(LIST_SEPARATOR)),
            labels: Some(record.labels.join(LIST_SEPARATOR)),
            status: record.status.clone(),
            created_at: record.created_at.format(TIMESTAMP_FORMAT).to_string(),
            updated_at: record.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl Row {
    /// `line` is the 1-based data row, used in error messages.
    fn into_record(self, line: usize) -> Result<NormalizedRecord> {
        Ok(NormalizedRecord {
            title: self.title,
            number: non_empty(self.number)
                .map(|n| parse_number(&n, line))
                .transpose()?,
            url: non_empty(self.url),
            assignees: split_list(self.assignees.as_deref()),
            labels: split_list(self.labels.as_deref()),
            status: non_empty(self.status),
            created_at: parse_timestamp(&self.created_at, line, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, line, "updated_at")?,
        })
    }
}

/// Write a snapshot as CSV, creating parent directories as needed.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    write_rows(&mut writer, snapshot)?;
    writer.flush()?;

    tracing::info!(path = %path.display(), records = snapshot.len(), "saved snapshot");
    Ok(())
}

/// Serialize a snapshot to an in-memory CSV string.
pub fn snapshot_to_csv(snapshot: &Snapshot) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_rows(&mut writer, snapshot)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| PulseError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| PulseError::Validation(e.to_string()))
}

fn write_rows<W: std::io::Write>(writer: &mut csv::Writer<W>, snapshot: &Snapshot) -> Result<()> {
    if snapshot.is_empty() {
        // serde only emits the header alongside the first record
        writer.write_record([
            "title",
            "number",
            "url",
            "assignees",
            "labels",
            "status",
            "created_at",
            "updated_at",
        ])?;
    }
    for record in snapshot {
        writer.serialize(Row::from(record))?;
    }
    Ok(())
}

/// Read a snapshot previously written by [`write_snapshot`] (or any CSV with
/// the same columns).
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let file = std::fs::File::open(path)?;
    let snapshot = read_csv(file)?;
    tracing::info!(path = %path.display(), records = snapshot.len(), "loaded snapshot");
    Ok(snapshot)
}

/// Parse snapshot CSV from any reader.
pub fn read_csv<R: std::io::Read>(reader: R) -> Result<Snapshot> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (i, row) in csv_reader.deserialize::<Row>().enumerate() {
        records.push(row?.into_record(i + 1)?);
    }
    Ok(Snapshot::new(records))
}

/// File name for a snapshot of `project_number` taken on `date`.
pub fn snapshot_file_name(prefix: &str, project_number: u64, date: NaiveDate) -> String {
    format!(
        "{}_{}_items_{}.csv",
        prefix,
        project_number,
        date.format("%Y-%m-%d")
    )
}

/// Newest snapshot file for the project in `dir`, if any.
///
/// Only the top level of `dir` is searched.
pub fn latest_snapshot(dir: &Path, prefix: &str, project_number: u64) -> Result<Option<PathBuf>> {
    let pattern = format!("{}_{}_items_*.csv", globset::escape(prefix), project_number);
    let matcher = Glob::new(&pattern)
        .map_err(|e| PulseError::Validation(format!("invalid snapshot pattern '{}': {}", pattern, e)))?
        .compile_matcher();

    if !dir.exists() {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| PulseError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if matcher.is_match(&name) {
            candidates.push((name, entry.into_path()));
        }
    }

    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(candidates.pop().map(|(_, path)| path))
}

// ============ Cell parsing ============

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Split a joined list cell: comma-separated, trimmed, empty tokens dropped.
pub fn split_list(cell: Option<&str>) -> Vec<String> {
    cell.map(|c| {
        c.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Accepts `12` and the float form `12.0` some tabular tools write.
fn parse_number(value: &str, line: usize) -> Result<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        _ => Err(PulseError::Validation(format!(
            "row {}: number '{}' is not an integer",
            line, value
        ))),
    }
}

/// Naive timestamps with `T` or space separators, or RFC 3339 with an
/// offset (converted to UTC and the offset dropped).
fn parse_timestamp(value: &str, line: usize, column: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.naive_utc());
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts.naive_utc());
    }
    Err(PulseError::Validation(format!(
        "row {}: {} '{}' is not a timestamp",
        line, column, value
    )))
}
