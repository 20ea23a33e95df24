//! Per-run dependency cache and analyzer statistics.

use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};

/// Path → direct-dependency set. Each path is written at most once per run.
#[derive(Debug, Default)]
pub struct DependencyCache {
    entries: DashMap<String, BTreeSet<String>>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the cached set, if present.
    pub fn get(&self, path: &str) -> Option<BTreeSet<String>> {
        self.entries.get(path).map(|e| e.value().clone())
    }

    /// Store `deps` unless the path already has an entry. Returns true if stored.
    pub fn set(&self, path: &str, deps: &BTreeSet<String>) -> bool {
        match self.entries.entry(path.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(deps.clone());
                true
            }
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Named counters shared by all worker tasks (`extractor.py`, `skipped.css`, `cache_hit`, ...).
#[derive(Debug, Default)]
pub struct RunStats {
    counters: DashMap<String, usize>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, key: impl Into<String>) {
        *self.counters.entry(key.into()).or_insert(0) += 1;
    }

    pub fn get(&self, key: &str) -> usize {
        self.counters.get(key).map(|v| *v).unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, usize> {
        self.counters.iter().map(|e| (e.key().clone(), *e.value())).collect()
    }

    pub fn clear(&self) {
        self.counters.clear();
    }
}
