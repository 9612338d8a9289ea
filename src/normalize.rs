//! Item normalizer: [`RawItemNode`] → [`NormalizedRecord`].
//!
//! A pure function. Each content variant supplies the fields it has and
//! defaults the rest; null or unknown content falls back to the container
//! timestamps and empty/absent values everywhere else. Nothing here fails.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{ContentVariant, FieldValue, NormalizedRecord, RawItemNode};

/// Title used when the content has none (drafts without a title, null content).
pub const DEFAULT_TITLE: &str = "(No title)";

/// Name of the single-select field that carries the board column.
const STATUS_FIELD: &str = "status";

/// Content-derived fields before timestamps are resolved.
struct ContentFields<'a> {
    title: Option<&'a str>,
    number: Option<i64>,
    url: Option<&'a str>,
    assignees: &'a [String],
    labels: &'a [String],
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'a> ContentFields<'a> {
    fn empty() -> Self {
        Self {
            title: None,
            number: None,
            url: None,
            assignees: &[],
            labels: &[],
            created_at: None,
            updated_at: None,
        }
    }

    fn from_content(content: Option<&'a ContentVariant>) -> Self {
        match content {
            Some(ContentVariant::Issue(c)) | Some(ContentVariant::PullRequest(c)) => Self {
                title: c.title.as_deref(),
                number: c.number,
                url: c.url.as_deref(),
                assignees: &c.assignees,
                labels: &c.labels,
                created_at: c.created_at,
                updated_at: c.updated_at,
            },
            Some(ContentVariant::DraftItem(d)) => Self {
                title: d.title.as_deref(),
                created_at: d.created_at,
                updated_at: d.updated_at,
                ..Self::empty()
            },
            Some(ContentVariant::Unknown) | None => Self::empty(),
        }
    }
}

/// Normalize one item. Identical input always yields an identical record.
pub fn normalize_item(node: &RawItemNode) -> NormalizedRecord {
    let fields = ContentFields::from_content(node.content.as_ref());

    NormalizedRecord {
        title: fields.title.unwrap_or(DEFAULT_TITLE).to_string(),
        number: fields.number,
        url: fields.url.map(str::to_string),
        assignees: fields.assignees.to_vec(),
        labels: fields.labels.to_vec(),
        status: extract_status(&node.field_values),
        created_at: naive(fields.created_at.unwrap_or(node.created_at)),
        updated_at: naive(fields.updated_at.unwrap_or(node.updated_at)),
    }
}

/// Value of the last field entry named "status" (any case).
///
/// Source order is the only ordering available, so the last match wins.
/// An entry whose field matches but has no value resets the status to `None`.
pub fn extract_status(values: &[FieldValue]) -> Option<String> {
    let mut status = None;
    for value in values {
        let is_status = value
            .field_name()
            .map(|name| name.eq_ignore_ascii_case(STATUS_FIELD))
            .unwrap_or(false);
        if is_status {
            status = value.name.clone();
        }
    }
    status
}

fn naive(ts: DateTime<Utc>) -> NaiveDateTime {
    ts.naive_utc()
}
