//! Paged query client for the project item listing.
//!
//! Talks to a GraphQL endpoint through the [`QueryTransport`] trait and walks
//! the `pageInfo { hasNextPage endCursor }` protocol one request at a time.
//! Each request depends on the previous response's cursor, so pages are
//! fetched strictly in sequence.
//!
//! # Retry
//!
//! The baseline behaviour is fail-fast: any transport error ends the run.
//! With `github.max_retries > 0`, transport failures are retried with
//! exponential backoff (1s, 2s, 4s, ... capped at 2^5). Protocol errors are
//! never retried.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::GithubConfig;
use crate::error::{PulseError, Result};
use crate::models::{RawItemNode, RawPage};

/// Looks up the project node id from the organization login and project number.
pub const PROJECT_ID_QUERY: &str = r#"
query($org: String!, $number: Int!) {
  organization(login: $org) {
    projectV2(number: $number) {
      id
    }
  }
}
"#;

/// Lists one page of project items with their content and field values.
pub const PROJECT_ITEMS_QUERY: &str = r#"
query($projectId: ID!, $cursor: String, $first: Int!) {
  node(id: $projectId) {
    ... on ProjectV2 {
      items(first: $first, after: $cursor) {
        pageInfo {
          hasNextPage
          endCursor
        }
        nodes {
          id
          createdAt
          updatedAt
          content {
            __typename
            ... on Issue {
              title
              number
              url
              assignees(first: 10) { nodes { login } }
              labels(first: 10) { nodes { name } }
              createdAt
              updatedAt
            }
            ... on PullRequest {
              title
              number
              url
              assignees(first: 10) { nodes { login } }
              labels(first: 10) { nodes { name } }
              createdAt
              updatedAt
            }
            ... on DraftIssue {
              title
              createdAt
              updatedAt
            }
          }
          fieldValues(first: 20) {
            nodes {
              ... on ProjectV2ItemFieldSingleSelectValue {
                name
                field {
                  ... on ProjectV2SingleSelectField {
                    name
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// A query endpoint accepting `{query, variables}` and returning the decoded
/// JSON body.
///
/// Implementations report HTTP/network failures as
/// [`PulseError::Transport`]. Interpreting the body (including GraphQL
/// `errors`) is left to the caller.
pub trait QueryTransport {
    fn execute(&self, query: &str, variables: Value) -> Result<Value>;
}

impl<T: QueryTransport + ?Sized> QueryTransport for &T {
    fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        (**self).execute(query, variables)
    }
}

// ============ HTTP transport ============

/// Blocking HTTP transport with bearer-token authentication.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    api_url: String,
    token: String,
}

impl HttpTransport {
    /// Build a transport for `api_url` with the given credential and timeout.
    pub fn new(api_url: &str, token: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("project-pulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PulseError::Transport {
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            token,
        })
    }
}

impl QueryTransport for HttpTransport {
    fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        let body = json!({ "query": query, "variables": variables });

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|e| PulseError::Transport {
                status: None,
                message: format!("request to {} failed: {}", self.api_url, e),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(PulseError::Transport {
                status: Some(status.as_u16()),
                message: text.chars().take(500).collect(),
            });
        }

        resp.json::<Value>()
            .map_err(|e| PulseError::Protocol(format!("response is not valid JSON: {}", e)))
    }
}

// ============ Retry ============

/// Bounded retry around a transport, applied to [`PulseError::Transport`] only.
pub struct RetryingTransport<T> {
    inner: T,
    max_retries: u32,
    base_delay: Duration,
}

impl<T: QueryTransport> RetryingTransport<T> {
    pub fn new(inner: T, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Override the first backoff step (the default is one second).
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

impl<T: QueryTransport> QueryTransport for RetryingTransport<T> {
    fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.inner.execute(query, variables.clone()) {
                Err(err) if err.is_transport() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.base_delay * (1u32 << (attempt - 1).min(5));
                    tracing::warn!(attempt, ?delay, error = %err, "retrying query");
                    std::thread::sleep(delay);
                }
                other => return other,
            }
        }
    }
}

// ============ Protocol ============

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct ProjectIdData {
    organization: Option<Organization>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organization {
    project_v2: Option<ProjectRef>,
}

#[derive(Deserialize)]
struct ProjectRef {
    id: String,
}

#[derive(Deserialize)]
struct ItemsData {
    node: Option<ProjectNode>,
}

#[derive(Deserialize)]
struct ProjectNode {
    items: Option<ItemConnection>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemConnection {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<RawItemNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// Decode a GraphQL body, surfacing `errors` and a missing `data` as
/// protocol errors.
fn decode_data<T: for<'de> Deserialize<'de>>(body: Value) -> Result<T> {
    let resp: GraphqlResponse<T> = serde_json::from_value(body)
        .map_err(|e| PulseError::Protocol(format!("unexpected response shape: {}", e)))?;

    if let Some(errors) = resp.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(PulseError::Protocol(messages.join("; ")));
    }

    resp.data
        .ok_or_else(|| PulseError::Protocol("response has no data".to_string()))
}

/// Resolve the project node id for `org` / `number`.
pub fn resolve_project_id<T: QueryTransport>(transport: &T, org: &str, number: u64) -> Result<String> {
    let body = transport.execute(PROJECT_ID_QUERY, json!({ "org": org, "number": number }))?;
    let data: ProjectIdData = decode_data(body)?;

    let org_node = data
        .organization
        .ok_or_else(|| PulseError::Protocol(format!("organization '{}' not found", org)))?;
    let project = org_node.project_v2.ok_or_else(|| {
        PulseError::Protocol(format!("project {} not found in organization '{}'", number, org))
    })?;

    tracing::info!(org, number, project_id = %project.id, "resolved project");
    Ok(project.id)
}

/// Turn one item-listing response body into a [`RawPage`].
fn parse_items_page(body: Value) -> Result<RawPage> {
    let data: ItemsData = decode_data(body)?;
    let node = data
        .node
        .ok_or_else(|| PulseError::Protocol("project node not found".to_string()))?;
    let items = node
        .items
        .ok_or_else(|| PulseError::Protocol("node is not a project (no items)".to_string()))?;

    Ok(RawPage {
        items: items.nodes.into_iter().flatten().collect(),
        has_more: items.page_info.has_next_page,
        cursor: items.page_info.end_cursor,
    })
}

// ============ Pagination ============

enum PagerState {
    /// Next request sends this cursor (`None` on the first page).
    Ready(Option<String>),
    Done,
}

/// Lazy, finite sequence of item pages for one project.
///
/// Every call to [`next`](Iterator::next) issues exactly one request. The
/// sequence ends after the page whose `hasNextPage` is false, or after the
/// first error (which is yielded once, wrapped with its page number and
/// cursor). [`restart`](ProjectPages::restart) rewinds to the first page.
pub struct ProjectPages<T> {
    transport: T,
    project_id: String,
    page_size: u32,
    state: PagerState,
    page: usize,
}

impl<T: QueryTransport> ProjectPages<T> {
    pub fn new(transport: T, project_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            transport,
            project_id: project_id.into(),
            page_size,
            state: PagerState::Ready(None),
            page: 0,
        }
    }

    /// Rewind to the first page.
    pub fn restart(&mut self) {
        self.state = PagerState::Ready(None);
        self.page = 0;
    }

    /// Number of pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.page
    }

    fn fetch(&self, cursor: Option<&str>) -> Result<RawPage> {
        let variables = json!({
            "projectId": self.project_id,
            "cursor": cursor,
            "first": self.page_size,
        });
        let body = self.transport.execute(PROJECT_ITEMS_QUERY, variables)?;
        parse_items_page(body)
    }
}

impl<T: QueryTransport> Iterator for ProjectPages<T> {
    type Item = Result<RawPage>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = match std::mem::replace(&mut self.state, PagerState::Done) {
            PagerState::Ready(cursor) => cursor,
            PagerState::Done => return None,
        };
        self.page += 1;

        match self.fetch(cursor.as_deref()) {
            Ok(page) => {
                tracing::debug!(
                    page = self.page,
                    cursor = cursor.as_deref().unwrap_or("<start>"),
                    items = page.items.len(),
                    has_more = page.has_more,
                    "fetched page"
                );
                if page.has_more {
                    match page.cursor.clone() {
                        Some(next) => self.state = PagerState::Ready(Some(next)),
                        None => {
                            return Some(Err(PulseError::Protocol(
                                "hasNextPage is true but endCursor is null".to_string(),
                            )
                            .at_page(self.page, cursor.as_deref())))
                        }
                    }
                }
                Some(Ok(page))
            }
            Err(err) => Some(Err(err.at_page(self.page, cursor.as_deref()))),
        }
    }
}

/// Build the transport stack described by `[github]`: HTTP, wrapped in
/// bounded retry when `max_retries > 0`.
pub fn transport_from_config(
    config: &GithubConfig,
    token: String,
) -> Result<RetryingTransport<HttpTransport>> {
    let http = HttpTransport::new(&config.api_url, token, config.timeout_secs)?;
    Ok(RetryingTransport::new(http, config.max_retries))
}
