//! Snapshot assembly.
//!
//! Drains the page sequence, normalizes every item, and concatenates the
//! results in page order, then within-page order. Any page error aborts
//! assembly and no partial snapshot is returned.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{NormalizedRecord, RawPage};
use crate::normalize::normalize_item;
use crate::progress::{SyncProgressEvent, SyncProgressReporter};

/// The full normalized record set from one ingestion run.
///
/// Immutable once built; consumers only get shared access to the records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    records: Vec<NormalizedRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<NormalizedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedRecord> {
        self.records.iter()
    }

    /// Hex SHA-256 over the records' JSON lines. Two snapshots with the same
    /// records in the same order share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            // NormalizedRecord contains only strings, integers and timestamps
            let line = serde_json::to_vec(record).unwrap_or_default();
            hasher.update(&line);
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a NormalizedRecord;
    type IntoIter = std::slice::Iter<'a, NormalizedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Outcome of [`assemble`]: the snapshot plus how many pages it took.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub snapshot: Snapshot,
    pub pages: usize,
}

/// Consume a page sequence into a [`Snapshot`].
///
/// Items appearing more than once (by id) are kept; the repeat count is
/// logged so upstream pagination problems are visible.
pub fn assemble<I>(pages: I, progress: &dyn SyncProgressReporter) -> Result<Assembled>
where
    I: IntoIterator<Item = Result<RawPage>>,
{
    let mut records = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut page_count = 0;

    for page in pages {
        let page = page?;
        page_count += 1;

        for node in &page.items {
            *seen.entry(node.id.clone()).or_insert(0) += 1;
            records.push(normalize_item(node));
        }

        progress.report(SyncProgressEvent::Page {
            page: page_count,
            items: page.items.len(),
            total: records.len(),
        });
    }

    let repeated = seen.values().filter(|&&n| n > 1).count();
    if repeated > 0 {
        tracing::warn!(repeated, "item ids returned more than once; keeping every occurrence");
    }

    tracing::info!(pages = page_count, records = records.len(), "assembled snapshot");
    Ok(Assembled {
        snapshot: Snapshot::new(records),
        pages: page_count,
    })
}
