//! Core data models used throughout Project Pulse.
//!
//! Two families live here: the raw wire shapes decoded from the project
//! item listing ([`RawPage`], [`RawItemNode`], [`ContentVariant`],
//! [`FieldValue`]) and the flat [`NormalizedRecord`] that every later stage
//! consumes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One page of the item listing plus its continuation token.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub items: Vec<RawItemNode>,
    pub has_more: bool,
    pub cursor: Option<String>,
}

/// A project item as returned by the API, before normalization.
///
/// The container timestamps describe the card itself; the content carries
/// its own timestamps which take precedence when present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItemNode {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub content: Option<ContentVariant>,
    #[serde(default, deserialize_with = "connection_nodes")]
    pub field_values: Vec<FieldValue>,
}

/// What a project item wraps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "__typename")]
pub enum ContentVariant {
    Issue(TrackedContent),
    PullRequest(TrackedContent),
    #[serde(rename = "DraftIssue")]
    DraftItem(DraftContent),
    /// Any other content type (e.g. redacted items). Normalized like null content.
    #[serde(other)]
    Unknown,
}

/// Fields shared by issues and pull requests.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "assignee_logins")]
    pub assignees: Vec<String>,
    #[serde(default, deserialize_with = "label_names")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A freeform draft card: no number, url, assignees, or labels.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A custom field value on an item. Only single-select values carry data;
/// other field kinds decode with both members empty.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FieldValue {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub field: Option<FieldRef>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FieldRef {
    #[serde(default)]
    pub name: Option<String>,
}

impl FieldValue {
    /// Name of the field this value belongs to, if the API reported one.
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_ref().and_then(|f| f.name.as_deref())
    }
}

/// The flat record produced by the normalizer and persisted to CSV.
///
/// Timestamps are UTC wall-clock values with the offset dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub title: String,
    pub number: Option<i64>,
    pub url: Option<String>,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    pub status: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ============ Connection decoding ============

/// `{ "nodes": [...] }` wrapper used by every list in the query.
#[derive(Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<T>>,
}

#[derive(Deserialize)]
struct Login {
    login: String,
}

#[derive(Deserialize)]
struct Label {
    name: String,
}

/// Decode a possibly-null connection into its non-null nodes.
fn connection_nodes<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let conn: Option<Connection<T>> = Option::deserialize(deserializer)?;
    Ok(conn
        .map(|c| c.nodes.into_iter().flatten().collect())
        .unwrap_or_default())
}

fn assignee_logins<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let nodes: Vec<Login> = connection_nodes(deserializer)?;
    Ok(nodes.into_iter().map(|l| l.login).collect())
}

fn label_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let nodes: Vec<Label> = connection_nodes(deserializer)?;
    Ok(nodes.into_iter().map(|l| l.name).collect())
}
