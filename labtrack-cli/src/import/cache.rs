//! Per-run entity resolution cache
//!
//! One cache instance lives for exactly one import run and is discarded with
//! it; nothing here is global or shared across runs. The cache memoizes
//! natural-key lookups against the persistence layer (including definitive
//! "not found" results), so a workbook referencing the same key on many rows
//! triggers one query, and it tracks claims so repeated references can be
//! reported against the later row.

use std::collections::{HashMap, HashSet};

/// Memo of natural-key -> resolved record for one record type
#[derive(Debug)]
pub struct ResolutionCache<R> {
    entries: HashMap<String, Option<R>>,
    claimed: HashSet<String>,
}

impl<R> Default for ResolutionCache<R> {
    fn default() -> Self {
        ResolutionCache {
            entries: HashMap::new(),
            claimed: HashSet::new(),
        }
    }
}

impl<R> ResolutionCache<R> {
    pub fn new() -> Self {
        ResolutionCache::default()
    }

    /// Look up a memoized resolution. Outer `None` means the key has never
    /// been resolved this run; `Some(None)` means it resolved to "not found".
    pub fn cached(&self, key: &str) -> Option<&Option<R>> {
        self.entries.get(key)
    }

    /// Memoize a resolution result (found or definitively not found)
    pub fn store(&mut self, key: &str, record: Option<R>) {
        self.entries.insert(key.to_string(), record);
    }

    /// Claim a key for a context where repetition is disallowed. The first
    /// claim wins and returns `true`; later claims return `false` so the
    /// caller can report the duplicate against the later row.
    pub fn claim(&mut self, key: &str) -> bool {
        self.claimed.insert(key.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
