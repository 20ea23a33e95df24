//! Transitive closure over the direct-dependency graph.
//!
//! The graph may contain cycles. Termination comes from a visited set that is
//! copied down each branch (a file can be reached again along an independent
//! path) plus a hard depth cap. A memo table lives for one target's traversal.

use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::analyze::DependencyAnalyzer;
use crate::types::{AnalysisStatus, DirectOutcome, ProjectFile};

pub struct ClosureEngine<'a> {
    files: &'a BTreeMap<String, ProjectFile>,
    analyzer: &'a DependencyAnalyzer,
    max_depth: usize,
    /// Direct outcomes computed lazily for files that were still pending.
    on_demand: DashMap<String, DirectOutcome>,
}

impl<'a> ClosureEngine<'a> {
    pub fn new(files: &'a BTreeMap<String, ProjectFile>, analyzer: &'a DependencyAnalyzer, max_depth: usize) -> Self {
        Self { files, analyzer, max_depth, on_demand: DashMap::new() }
    }

    /// Every file reachable from `target`, never including `target` itself.
    pub fn closure(&self, target: &str) -> BTreeSet<String> {
        let mut memo = HashMap::new();
        let mut reached = self.expand(target, &HashSet::new(), 0, &mut memo);
        reached.remove(target);
        reached
    }

    fn expand(
        &self,
        path: &str,
        visited: &HashSet<String>,
        depth: usize,
        memo: &mut HashMap<String, BTreeSet<String>>,
    ) -> BTreeSet<String> {
        if visited.contains(path) || depth > self.max_depth {
            return BTreeSet::new();
        }
        if let Some(done) = memo.get(path) {
            return done.clone();
        }
        let Some(direct) = self.direct_deps(path) else {
            memo.insert(path.to_string(), BTreeSet::new());
            return BTreeSet::new();
        };

        let mut branch = visited.clone();
        branch.insert(path.to_string());

        let mut reached = direct.clone();
        for dep in &direct {
            if self.files.contains_key(dep) {
                reached.extend(self.expand(dep, &branch, depth + 1, memo));
            }
        }
        memo.insert(path.to_string(), reached.clone());
        reached
    }

    /// Known direct edges of `path`, analysing it now if it is still pending.
    fn direct_deps(&self, path: &str) -> Option<BTreeSet<String>> {
        let file = self.files.get(path)?;
        if file.status != AnalysisStatus::Pending {
            return Some(file.direct_deps.clone());
        }
        if let Some(outcome) = self.on_demand.get(path) {
            return Some(outcome.deps.clone());
        }
        let mut outcome = self.analyzer.analyze_direct(file);
        outcome.deps.remove(path);
        let deps = outcome.deps.clone();
        self.on_demand.entry(path.to_string()).or_insert(outcome);
        Some(deps)
    }

    /// Outcomes computed on demand, for the caller to record on the file records.
    pub fn into_on_demand(self) -> Vec<(String, DirectOutcome)> {
        self.on_demand.into_iter().collect()
    }
}
