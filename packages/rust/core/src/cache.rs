//! Per-source snapshots and "new since last run" deltas.
//!
//! Diffing is URL-set based. A source seen for the first time reports all of
//! its current items once (bootstrap), then only unseen URLs.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use signalwatch_shared::{CacheEntry, CachedItem, CandidateSignal};
use signalwatch_storage::CacheMap;

/// Items a source gained since its previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDelta {
    pub new_items: Vec<CandidateSignal>,
    /// No previous snapshot existed for this source.
    pub bootstrap: bool,
}

impl SourceDelta {
    pub fn is_reportable(&self) -> bool {
        !self.new_items.is_empty()
    }
}

/// Snapshot store keyed by source (feed URL or page URL).
#[derive(Debug, Clone, Default)]
pub struct IncrementalCache {
    entries: CacheMap,
}

impl IncrementalCache {
    pub fn new(entries: CacheMap) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diff `current` against the stored snapshot for `key`, then replace the
    /// snapshot with `current`.
    pub fn apply(
        &mut self,
        key: &str,
        current: &[CandidateSignal],
        now: DateTime<Utc>,
    ) -> SourceDelta {
        let previous = self.entries.get(key);
        let bootstrap = previous.is_none();
        let seen: HashSet<&str> = previous
            .map(|entry| entry.items.iter().map(|i| i.url.as_str()).collect())
            .unwrap_or_default();

        let new_items: Vec<CandidateSignal> = current
            .iter()
            .filter(|signal| !seen.contains(signal.url.as_str()))
            .cloned()
            .collect();

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                items: current.iter().map(CachedItem::from).collect(),
                fetched_at: now,
            },
        );

        SourceDelta {
            new_items,
            bootstrap,
        }
    }

    pub fn into_entries(self) -> CacheMap {
        self.entries
    }
}
