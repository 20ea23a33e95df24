//! Parallel run coordinator.
//!
//! Phase 1 computes every file's direct dependencies on a bounded rayon pool.
//! Phase 2 starts only after phase 1 has fully drained and computes each
//! file's transitive closure. Per-file task failures (panics included) are
//! recorded on that file and never abort the pool.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::analyze::DependencyAnalyzer;
use crate::bundle::write_bundles;
use crate::closure::ClosureEngine;
use crate::error::{AnalysisError, Result};
use crate::extract::ExtractorRegistry;
use crate::normalize::PathNormalizer;
use crate::progress::{ProgressReporter, RunLog};
use crate::scan::scan_project;
use crate::types::{AnalysisConfig, AnalysisStatus, DirectOutcome, ProjectFile, ProjectFileSet, RunReport};

/// Extensions in scope: the configured set, or everything an extractor is registered for.
pub fn selected_extensions(config: &AnalysisConfig, registry: &ExtractorRegistry) -> BTreeSet<String> {
    if config.extensions.is_empty() {
        registry.extensions()
    } else {
        config.extensions.clone()
    }
}

/// Scan, analyse and (with `dest`) write context bundles for one project.
pub fn process_project(
    config: &AnalysisConfig,
    dest: Option<&Path>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunReport> {
    let start = Instant::now();
    let log = Arc::new(RunLog::new(reporter));
    log.info(format!("Processing project: {}", config.root.display()));

    let registry = ExtractorRegistry::with_defaults();
    let extensions = selected_extensions(config, &registry);

    log.info("Scanning project files...");
    let scan = scan_project(config, &extensions, &log)?;
    let mut report = RunReport {
        root: config.root.clone(),
        processed_by_ext: scan.processed_by_ext,
        skipped_by_ext: scan.skipped_by_ext,
        ..Default::default()
    };
    let mut files = scan.files;

    if files.is_empty() {
        log.warn("No files matching supported and selected extensions found for processing.");
        return Ok(finish(report, &log, start));
    }

    log.info(format!("{} files identified for processing. Analyzing dependencies...", files.len()));
    let file_set: ProjectFileSet = files.keys().cloned().collect();
    let analyzer = DependencyAnalyzer::new(
        PathNormalizer::new(&config.root),
        registry,
        file_set,
        Arc::clone(&log),
        config.html,
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_count())
        .thread_name(|i| format!("ctxbundle-worker-{i}"))
        .build()
        .map_err(|e| AnalysisError::WorkerPool { message: e.to_string() })?;

    pool.install(|| run_direct_phase(&analyzer, &mut files, &log));
    log.info("Direct dependency analysis complete. Calculating transitive dependencies...");
    pool.install(|| run_transitive_phase(&analyzer, &mut files, config.max_depth, &log));
    log.info("Full dependency analysis complete.");

    let stats = analyzer.stats().snapshot();
    for (key, count) in &stats {
        log.stats(format!("Analyzer {key} used {count} times."));
    }
    report.analyzer_stats = stats;

    if let Some(dest) = dest {
        report.bundles_written = write_bundles(&config.root, &files, dest, &log)?;
    }

    report.files = files;
    info!(
        files = report.files.len(),
        time_ms = start.elapsed().as_millis() as u64,
        "Analysis complete"
    );
    Ok(finish(report, &log, start))
}

/// Fill in status counts, log the summary block, attach the log.
fn finish(mut report: RunReport, log: &RunLog, start: Instant) -> RunReport {
    let mut status_counts = BTreeMap::new();
    for file in report.files.values() {
        *status_counts.entry(file.status.label().to_string()).or_insert(0) += 1;
    }
    report.status_counts = status_counts;

    log.info("--- FILE PROCESSING SUMMARY ---");
    if report.processed_by_ext.is_empty() {
        log.info("No files were processed based on selection and support.");
    } else {
        log.info("Files Processed (by extension):");
        for (ext, count) in &report.processed_by_ext {
            log.info(format!("  - {ext}: {count} file(s)"));
        }
    }
    if !report.skipped_by_ext.is_empty() {
        log.info("Files Skipped or Ignored (by extension/reason):");
        for (reason, count) in &report.skipped_by_ext {
            log.info(format!("  - {reason}: {count} file(s)"));
        }
    }
    if !report.status_counts.is_empty() {
        log.info("Dependency analysis status:");
        for (status, count) in &report.status_counts {
            log.info(format!("  - {status}: {count} file(s)"));
        }
    }
    log.info(format!(
        "Processing complete. Total {} TXT files generated.",
        report.bundles_written
    ));

    report.elapsed_ms = start.elapsed().as_millis() as u64;
    report.log = log.entries();
    report
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Logs every `max(total / 20, 1)` completions.
struct ProgressTicker<'a> {
    done: AtomicUsize,
    total: usize,
    step: usize,
    what: &'static str,
    log: &'a RunLog,
}

impl<'a> ProgressTicker<'a> {
    fn new(total: usize, what: &'static str, log: &'a RunLog) -> Self {
        Self { done: AtomicUsize::new(0), total, step: (total / 20).max(1), what, log }
    }

    fn tick(&self) {
        let n = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.step == 0 {
            self.log.info(format!("{} for {n}/{} files.", self.what, self.total));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Phase 1. Results are gathered first and applied on the calling thread.
pub fn run_direct_phase(analyzer: &DependencyAnalyzer, files: &mut BTreeMap<String, ProjectFile>, log: &RunLog) {
    let ticker = ProgressTicker::new(files.len(), "Direct dependencies analyzed", log);

    let outcomes: Vec<(String, DirectOutcome)> = files
        .par_iter()
        .map(|(path, file)| {
            let outcome = catch_unwind(AssertUnwindSafe(|| analyzer.analyze_direct(file))).unwrap_or_else(|payload| {
                let err = AnalysisError::TaskFailure {
                    path: path.clone(),
                    phase: "direct",
                    message: panic_message(payload.as_ref()),
                };
                log.error(format!("Task for direct deps of {path} failed: {err}"));
                DirectOutcome::fatal(err.to_string())
            });
            ticker.tick();
            (path.clone(), outcome)
        })
        .collect();

    for (path, outcome) in outcomes {
        if let Some(file) = files.get_mut(&path) {
            file.apply_direct(outcome);
        }
    }
}

/// Phase 2. Reads the file map immutably, then writes closures back.
pub fn run_transitive_phase(
    analyzer: &DependencyAnalyzer,
    files: &mut BTreeMap<String, ProjectFile>,
    max_depth: usize,
    log: &RunLog,
) {
    let ticker = ProgressTicker::new(files.len(), "Transitive dependencies calculated", log);

    let (closures, on_demand) = {
        let snapshot: &BTreeMap<String, ProjectFile> = files;
        let engine = ClosureEngine::new(snapshot, analyzer, max_depth);
        let closures: Vec<(String, std::result::Result<BTreeSet<String>, String>)> = snapshot
            .par_iter()
            .map(|(path, _)| {
                let result = catch_unwind(AssertUnwindSafe(|| engine.closure(path))).map_err(|payload| {
                    let err = AnalysisError::TaskFailure {
                        path: path.clone(),
                        phase: "transitive",
                        message: panic_message(payload.as_ref()),
                    };
                    log.error(format!("Task for transitive deps of {path} failed: {err}"));
                    err.to_string()
                });
                ticker.tick();
                (path.clone(), result)
            })
            .collect();
        (closures, engine.into_on_demand())
    };

    for (path, outcome) in on_demand {
        if let Some(file) = files.get_mut(&path) {
            if file.status == AnalysisStatus::Pending {
                file.apply_direct(outcome);
            }
        }
    }
    for (path, result) in closures {
        let Some(file) = files.get_mut(&path) else { continue };
        match result {
            Ok(deps) => file.apply_transitive(deps),
            Err(detail) => {
                file.apply_transitive(BTreeSet::new());
                file.status = AnalysisStatus::Fatal;
                file.error = Some(detail);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Single-file query
// ---------------------------------------------------------------------------

/// Direct and transitive dependencies of one file, computed without a full phase 1.
#[derive(Debug, Clone, Serialize)]
pub struct FileDependencies {
    pub path: String,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub direct: BTreeSet<String>,
    pub transitive: BTreeSet<String>,
    /// Files whose direct dependencies had to be analysed to answer the query.
    pub analyzed: usize,
}

/// Scan the project, then analyse only what `target`'s closure touches.
///
/// `target` is project-relative, or absolute inside the root.
pub fn analyze_file(
    config: &AnalysisConfig,
    target: &str,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<FileDependencies> {
    let log = Arc::new(RunLog::new(reporter));
    let registry = ExtractorRegistry::with_defaults();
    let extensions = selected_extensions(config, &registry);
    let scan = scan_project(config, &extensions, &log)?;

    let normalizer = PathNormalizer::new(&config.root);
    let path = normalizer
        .try_normalize(target, "")
        .ok()
        .filter(|p| scan.files.contains_key(p))
        .ok_or_else(|| {
            AnalysisError::io(
                config.root.join(target),
                std::io::Error::new(std::io::ErrorKind::NotFound, "not an in-scope project file"),
            )
        })?;

    let file_set: ProjectFileSet = scan.files.keys().cloned().collect();
    let analyzer = DependencyAnalyzer::new(normalizer, registry, file_set, Arc::clone(&log), config.html);
    let engine = ClosureEngine::new(&scan.files, &analyzer, config.max_depth);
    let transitive = engine.closure(&path);
    let mut on_demand: BTreeMap<String, DirectOutcome> = engine.into_on_demand().into_iter().collect();
    let analyzed = on_demand.len();

    let outcome = on_demand
        .remove(&path)
        .unwrap_or_else(|| analyzer.analyze_direct(&scan.files[&path]));
    let mut file = scan.files[&path].clone();
    file.apply_direct(outcome);
    file.apply_transitive(transitive);
    debug!(path = %file.path, analyzed, deps = file.transitive_deps.len(), "Single-file closure computed");

    Ok(FileDependencies {
        path: file.path,
        status: file.status,
        error: file.error,
        direct: file.direct_deps,
        transitive: file.transitive_deps,
        analyzed,
    })
}
