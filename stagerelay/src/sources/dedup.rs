//! Locator-keyed source deduplication.

use crate::core::SourceRecord;
use std::collections::HashSet;
use tracing::debug;

/// Accumulates sources for a run, keeping the first record seen per locator.
///
/// Existing entries are never reordered or replaced.
#[derive(Debug, Clone, Default)]
pub struct SourceDeduplicator {
    sources: Vec<SourceRecord>,
    seen: HashSet<String>,
}

impl SourceDeduplicator {
    /// Creates an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a batch and returns the records that were new, in batch order.
    ///
    /// Duplicates within the batch itself are dropped as well. Records with a
    /// blank locator cannot be keyed and are skipped.
    pub fn add_sources<I>(&mut self, batch: I) -> Vec<SourceRecord>
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        let mut added = Vec::new();
        for source in batch {
            let key = source.dedup_key();
            if key.is_empty() {
                debug!(title = %source.title, "Skipping source without locator");
                continue;
            }
            if self.seen.insert(key.to_string()) {
                self.sources.push(source.clone());
                added.push(source);
            }
        }
        added
    }

    /// Returns true if a locator has already been accumulated.
    #[must_use]
    pub fn contains(&self, locator: &str) -> bool {
        self.seen.contains(locator.trim())
    }

    /// Returns the accumulated sources in first-seen order.
    #[must_use]
    pub fn sources(&self) -> &[SourceRecord] {
        &self.sources
    }

    /// Returns the number of accumulated sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Drops every accumulated source.
    pub fn clear(&mut self) {
        self.sources.clear();
        self.seen.clear();
    }
}
