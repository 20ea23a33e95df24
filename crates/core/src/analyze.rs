//! Direct dependency orchestration: cache, extractor dispatch, status.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{DependencyCache, RunStats};
use crate::extract::{ExtractContext, ExtractorRegistry};
use crate::normalize::PathNormalizer;
use crate::progress::RunLog;
use crate::resolve::ImportResolver;
use crate::types::{ext_label, DirectOutcome, HtmlOptions, ProjectFile, ProjectFileSet};

/// Shared, read-mostly state for analysing the files of one run from many workers.
pub struct DependencyAnalyzer {
    resolver: ImportResolver,
    registry: ExtractorRegistry,
    cache: DependencyCache,
    stats: RunStats,
    files: ProjectFileSet,
    log: Arc<RunLog>,
    html: HtmlOptions,
}

impl DependencyAnalyzer {
    pub fn new(
        normalizer: PathNormalizer,
        registry: ExtractorRegistry,
        files: ProjectFileSet,
        log: Arc<RunLog>,
        html: HtmlOptions,
    ) -> Self {
        Self {
            resolver: ImportResolver::new(normalizer, Arc::clone(&log)),
            registry,
            cache: DependencyCache::new(),
            stats: RunStats::new(),
            files,
            log,
            html,
        }
    }

    pub fn analyze_direct(&self, file: &ProjectFile) -> DirectOutcome {
        self.analyze_source(&file.path, &file.ext, &file.raw_content)
    }

    /// Direct dependencies of one file. Never fails: problems become the outcome's status.
    pub fn analyze_source(&self, path: &str, ext: &str, content: &str) -> DirectOutcome {
        if let Some(deps) = self.cache.get(path) {
            self.stats.incr("cache_hit");
            return DirectOutcome::cached(deps);
        }

        let extractor = match self.registry.usable(ext) {
            Ok(e) => e,
            Err(e) => {
                debug!(path, error = %e, "Skipping file");
                self.stats.incr(format!("skipped.{}", ext_label(ext)));
                return DirectOutcome::skipped();
            }
        };

        self.stats.incr(format!("extractor.{ext}"));
        let ctx = ExtractContext {
            path,
            ext,
            content,
            resolver: &self.resolver,
            files: &self.files,
            html: self.html,
        };
        match extractor.extract(&ctx) {
            Ok(mut deps) => {
                deps.remove(path);
                deps.retain(|d| self.files.contains(d));
                self.cache.set(path, &deps);
                debug!(path, deps = deps.len(), extractor = extractor.name(), "Direct dependencies");
                DirectOutcome::success(deps)
            }
            Err(e) => {
                self.stats.incr(format!("error.{ext}"));
                self.log.warn(format!("ANALYZER: {e}"));
                DirectOutcome::error(e.to_string())
            }
        }
    }

    /// Forget cached results and counters; the next run starts cold.
    pub fn reset(&self) {
        self.cache.clear();
        self.stats.clear();
    }

    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn log(&self) -> &Arc<RunLog> {
        &self.log
    }
}

impl std::fmt::Debug for DependencyAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyAnalyzer")
            .field("files", &self.files.len())
            .field("cached", &self.cache.len())
            .field("registry", &self.registry)
            .finish()
    }
}
