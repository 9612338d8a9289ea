//! Metrics engine.
//!
//! Derives completion rate, cycle time, monthly trends, workload, label
//! frequency, and four flagged-item lists from a [`Snapshot`]. Everything is
//! recomputed from scratch on each call; nothing is cached between calls and
//! the snapshot is never modified.
//!
//! # Time
//!
//! A single `now` is passed in by the caller and used for every
//! time-relative comparison in one pass, so the stale and recently-closed
//! lists always agree with each other.
//!
//! # Date filter
//!
//! The optional [`DateRange`] restricts records by the calendar date of
//! `created_at` (inclusive on both ends). Every metric uses the filtered set
//! except the recently-closed list, which looks at all completed records.
//!
//! # Empty input
//!
//! An empty (or fully filtered-out) snapshot is not an error: the completion
//! rate is `0`, the mean cycle time is `None`, and every list is empty.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Serialize, Serializer};

use crate::models::NormalizedRecord;
use crate::snapshot::Snapshot;

/// Status values treated as terminal.
pub const DONE_STATUSES: [&str; 2] = ["Done", "Closed"];

/// Open items not updated for more than this many whole days are stale.
pub const STALE_AFTER_DAYS: i64 = 30;

/// Completed items updated within this many whole days are recently closed.
pub const RECENT_WITHIN_DAYS: i64 = 30;

pub fn is_done(record: &NormalizedRecord) -> bool {
    record
        .status
        .as_deref()
        .map(|s| DONE_STATUSES.contains(&s))
        .unwrap_or(false)
}

/// Inclusive range of creation dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let date = ts.date();
        date >= self.start && date <= self.end
    }

    /// From the earliest to the latest creation date in the snapshot.
    pub fn spanning(snapshot: &Snapshot) -> Option<Self> {
        let min = snapshot.iter().map(|r| r.created_at.date()).min()?;
        let max = snapshot.iter().map(|r| r.created_at.date()).max()?;
        Some(Self::new(min, max))
    }

    /// Fill whichever bound is missing from the snapshot's span.
    ///
    /// Returns `None` only when a bound is missing and the snapshot is empty.
    pub fn resolve(
        snapshot: &Snapshot,
        since: Option<NaiveDate>,
        until: Option<NaiveDate>,
    ) -> Option<Self> {
        match (since, until) {
            (Some(start), Some(end)) => Some(Self::new(start, end)),
            _ => {
                let span = Self::spanning(snapshot)?;
                Some(Self::new(
                    since.unwrap_or(span.start),
                    until.unwrap_or(span.end),
                ))
            }
        }
    }
}

/// A calendar month, displayed and serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(ts: NaiveDateTime) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub month: YearMonth,
    pub created: usize,
    pub closed: usize,
}

/// Open/closed item counts for one assignee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadRow {
    pub assignee: String,
    pub open: usize,
    pub closed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Everything the engine derives in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsResult {
    pub now: NaiveDateTime,
    pub range: Option<DateRange>,
    pub total: usize,
    pub completed: usize,
    /// Percentage of done items, `0.0` when there are no items.
    pub completion_rate: f64,
    /// Mean whole days from creation to last update over done items.
    pub mean_cycle_days: Option<f64>,
    pub trend: Vec<TrendPoint>,
    pub workload: Vec<WorkloadRow>,
    pub labels: Vec<LabelCount>,
    pub missing_metadata: Vec<NormalizedRecord>,
    pub stale: Vec<NormalizedRecord>,
    pub recently_closed: Vec<NormalizedRecord>,
    pub multi_owner: Vec<NormalizedRecord>,
}

/// Compute every metric for `snapshot`, optionally restricted to `range`.
pub fn compute(snapshot: &Snapshot, range: Option<DateRange>, now: NaiveDateTime) -> MetricsResult {
    let filtered: Vec<&NormalizedRecord> = snapshot
        .iter()
        .filter(|r| range.map(|rg| rg.contains(r.created_at)).unwrap_or(true))
        .collect();

    let completed: Vec<&NormalizedRecord> = filtered.iter().copied().filter(|r| is_done(r)).collect();

    MetricsResult {
        now,
        range,
        total: filtered.len(),
        completed: completed.len(),
        completion_rate: completion_rate(&filtered),
        mean_cycle_days: mean_cycle_days(&completed),
        trend: monthly_trend(&filtered),
        workload: assignee_workload(&filtered),
        labels: label_frequency(&filtered),
        missing_metadata: missing_metadata(&filtered),
        stale: stale(&filtered, now),
        recently_closed: recently_closed(snapshot.records(), now),
        multi_owner: multi_owner(&filtered),
    }
}

/// Whole days in `delta`, rounded toward negative infinity.
pub fn whole_days(delta: TimeDelta) -> i64 {
    delta.num_milliseconds().div_euclid(86_400_000)
}

/// Trimmed, non-empty entries of a multi-value field.
fn entries(values: &[String]) -> impl Iterator<Item = &str> {
    values.iter().map(|v| v.trim()).filter(|v| !v.is_empty())
}

pub fn completion_rate(records: &[&NormalizedRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let done = records.iter().filter(|r| is_done(r)).count();
    done as f64 / records.len() as f64 * 100.0
}

/// `None` when no completed records are given.
pub fn mean_cycle_days(completed: &[&NormalizedRecord]) -> Option<f64> {
    if completed.is_empty() {
        return None;
    }
    let sum: i64 = completed
        .iter()
        .map(|r| whole_days(r.updated_at - r.created_at))
        .sum();
    Some(sum as f64 / completed.len() as f64)
}

/// Created per month of `created_at`, closed per month of `updated_at` for
/// done records. Months missing from one series are zero in it.
pub fn monthly_trend(records: &[&NormalizedRecord]) -> Vec<TrendPoint> {
    let mut months: BTreeMap<YearMonth, (usize, usize)> = BTreeMap::new();
    for record in records {
        months.entry(YearMonth::of(record.created_at)).or_default().0 += 1;
        if is_done(record) {
            months.entry(YearMonth::of(record.updated_at)).or_default().1 += 1;
        }
    }
    months
        .into_iter()
        .map(|(month, (created, closed))| TrendPoint {
            month,
            created,
            closed,
        })
        .collect()
}

/// One row per assignee, sorted by name. Records without assignees are skipped.
pub fn assignee_workload(records: &[&NormalizedRecord]) -> Vec<WorkloadRow> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in records {
        let done = is_done(record);
        for assignee in entries(&record.assignees) {
            let cell = counts.entry(assignee).or_default();
            if done {
                cell.1 += 1;
            } else {
                cell.0 += 1;
            }
        }
    }
    counts
        .into_iter()
        .map(|(assignee, (open, closed))| WorkloadRow {
            assignee: assignee.to_string(),
            open,
            closed,
        })
        .collect()
}

/// Labels by descending count; equal counts keep first-seen order.
pub fn label_frequency(records: &[&NormalizedRecord]) -> Vec<LabelCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<LabelCount> = Vec::new();
    for record in records {
        for label in entries(&record.labels) {
            match index.get(label) {
                Some(&i) => counts[i].count += 1,
                None => {
                    index.insert(label, counts.len());
                    counts.push(LabelCount {
                        label: label.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }
    // stable: ties stay in insertion order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Records with no labels or no assignees.
pub fn missing_metadata(records: &[&NormalizedRecord]) -> Vec<NormalizedRecord> {
    records
        .iter()
        .filter(|r| entries(&r.labels).next().is_none() || entries(&r.assignees).next().is_none())
        .map(|r| (*r).clone())
        .collect()
}

/// Open records whose last update is more than [`STALE_AFTER_DAYS`] before `now`.
pub fn stale(records: &[&NormalizedRecord], now: NaiveDateTime) -> Vec<NormalizedRecord> {
    records
        .iter()
        .filter(|r| !is_done(r) && whole_days(now - r.updated_at) > STALE_AFTER_DAYS)
        .map(|r| (*r).clone())
        .collect()
}

/// Done records updated within [`RECENT_WITHIN_DAYS`] of `now`.
pub fn recently_closed(records: &[NormalizedRecord], now: NaiveDateTime) -> Vec<NormalizedRecord> {
    records
        .iter()
        .filter(|r| is_done(r) && whole_days(now - r.updated_at) <= RECENT_WITHIN_DAYS)
        .cloned()
        .collect()
}

/// Records with more than one assignee.
pub fn multi_owner(records: &[&NormalizedRecord]) -> Vec<NormalizedRecord> {
    records
        .iter()
        .filter(|r| entries(&r.assignees).count() > 1)
        .map(|r| (*r).clone())
        .collect()
}
