//! Error taxonomy for the ingestion pipeline and the persistence boundary.
//!
//! The metrics engine never fails: empty or sparse snapshots produce zero or
//! empty results, so nothing in [`crate::metrics`] returns a [`PulseError`].

use thiserror::Error;

/// Errors raised while fetching, normalizing, or persisting a snapshot.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Network failure or a non-success HTTP status from the query endpoint.
    #[error("transport error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The response did not have the expected shape (missing project,
    /// missing node, GraphQL `errors` payload, undecodable JSON).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A record could not satisfy its invariants (e.g. a persisted row with
    /// an unparseable timestamp).
    #[error("validation error: {0}")]
    Validation(String),

    /// A transport or protocol failure while fetching a specific page.
    #[error("page {page} (cursor {}): {source}", .cursor.as_deref().unwrap_or("<start>"))]
    Page {
        page: usize,
        cursor: Option<String>,
        #[source]
        source: Box<PulseError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PulseError {
    /// Attach the page number and the cursor that was sent for it.
    pub fn at_page(self, page: usize, cursor: Option<&str>) -> Self {
        PulseError::Page {
            page,
            cursor: cursor.map(str::to_string),
            source: Box::new(self),
        }
    }

    /// True for transport failures, looking through a [`PulseError::Page`] wrapper.
    pub fn is_transport(&self) -> bool {
        match self {
            PulseError::Transport { .. } => true,
            PulseError::Page { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// True for protocol failures, looking through a [`PulseError::Page`] wrapper.
    pub fn is_protocol(&self) -> bool {
        match self {
            PulseError::Protocol(_) => true,
            PulseError::Page { source, .. } => source.is_protocol(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
