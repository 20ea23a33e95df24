use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;
use tracing::debug;

use crate::clean::clean_code;
use crate::error::{AnalysisError, Result};
use crate::progress::RunLog;
use crate::types::{ext_label, AnalysisConfig, ProjectFile};

/// The project files of one run plus the per-extension breakdown.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: BTreeMap<String, ProjectFile>,
    pub processed_by_ext: BTreeMap<String, usize>,
    pub skipped_by_ext: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// Ignore rules
// ---------------------------------------------------------------------------

/// Compile `ignore_patterns` into a gitignore matcher rooted at the project.
pub fn build_ignore_matcher(root: &Path, patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| AnalysisError::config(root, format!("bad ignore pattern '{pattern}': {e}")))?;
    }
    builder
        .build()
        .map_err(|e| AnalysisError::config(root, format!("could not build ignore rules: {e}")))
}

// ---------------------------------------------------------------------------
// Parallel file walking
// ---------------------------------------------------------------------------

/// Every regular file under `root`, as (absolute, project-relative) pairs, sorted by relative path.
fn walk_files_parallel(root: &Path, config: &AnalysisConfig, ignore: &Arc<Gitignore>) -> Vec<(PathBuf, String)> {
    let results: Mutex<Vec<(PathBuf, String)>> = Mutex::new(Vec::new());

    let skip = config.skip_dirs.clone();
    let dir_ignore = Arc::clone(ignore);
    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .threads(rayon::current_num_threads().min(12))
        .filter_entry(move |entry| {
            if entry.depth() > 0 && entry.file_type().is_some_and(|ft| ft.is_dir()) {
                let name = entry.file_name().to_string_lossy();
                return !skip.contains(name.as_ref()) && !dir_ignore.matched(entry.path(), true).is_ignore();
            }
            true
        })
        .build_parallel()
        .run(|| {
            Box::new(|entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        debug!(error = %e, "Walk error");
                        return ignore::WalkState::Continue;
                    }
                };
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    return ignore::WalkState::Continue;
                }

                let abs_path = entry.path().to_path_buf();
                let rel_path = abs_path
                    .strip_prefix(root)
                    .unwrap_or(&abs_path)
                    .to_string_lossy()
                    .replace('\\', "/");

                results.lock().unwrap_or_else(|e| e.into_inner()).push((abs_path, rel_path));
                ignore::WalkState::Continue
            })
        });

    let mut files = results.into_inner().unwrap_or_else(|e| e.into_inner());
    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}

/// Lower-cased extension of a file name, `""` when there is none.
fn file_ext(rel_path: &str) -> String {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default()
}

enum ReadOutcome {
    Loaded(Box<ProjectFile>),
    TooLarge,
    Failed,
}

fn read_project_file(abs_path: &Path, rel_path: &str, max_bytes: u64, log: &RunLog) -> ReadOutcome {
    let meta = match fs::metadata(abs_path) {
        Ok(m) => m,
        Err(e) => {
            log.error(format!("Failed to read/process file {rel_path}: {e}"));
            return ReadOutcome::Failed;
        }
    };
    if meta.len() > max_bytes {
        log.warn(format!("Skipping {rel_path}: {} bytes exceeds limit of {max_bytes}", meta.len()));
        return ReadOutcome::TooLarge;
    }
    let bytes = match fs::read(abs_path) {
        Ok(b) => b,
        Err(e) => {
            log.error(format!("Failed to read/process file {rel_path}: {e}"));
            return ReadOutcome::Failed;
        }
    };

    let raw = String::from_utf8_lossy(&bytes).into_owned();
    let mut file = ProjectFile::new(rel_path, raw);
    file.size = meta.len();
    file.modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    file.content = clean_code(&file.raw_content, &file.ext);
    ReadOutcome::Loaded(Box::new(file))
}

// ---------------------------------------------------------------------------
// Project scan
// ---------------------------------------------------------------------------

/// Walk the project, keep files whose extension is in `extensions`, and load them.
pub fn scan_project(config: &AnalysisConfig, extensions: &BTreeSet<String>, log: &RunLog) -> Result<ScanResult> {
    let root = config.root.as_path();
    let meta = fs::metadata(root).map_err(|e| AnalysisError::io(root, e))?;
    if !meta.is_dir() {
        return Err(AnalysisError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let ignore = Arc::new(build_ignore_matcher(root, &config.ignore_patterns)?);
    let walked = walk_files_parallel(root, config, &ignore);

    let mut result = ScanResult::default();
    let mut in_scope = Vec::new();
    for (abs_path, rel_path) in walked {
        if ignore.matched(&abs_path, false).is_ignore() {
            *result.skipped_by_ext.entry("ignored_item".to_string()).or_insert(0) += 1;
            continue;
        }
        let ext = file_ext(&rel_path);
        if extensions.contains(&ext) {
            in_scope.push((abs_path, rel_path));
        } else {
            *result.skipped_by_ext.entry(ext_label(&ext).to_string()).or_insert(0) += 1;
        }
    }

    let loaded: Vec<(String, ReadOutcome)> = in_scope
        .par_iter()
        .map(|(abs, rel)| (rel.clone(), read_project_file(abs, rel, config.max_file_bytes, log)))
        .collect();

    for (rel_path, outcome) in loaded {
        match outcome {
            ReadOutcome::Loaded(file) => {
                *result.processed_by_ext.entry(file.ext.clone()).or_insert(0) += 1;
                result.files.insert(rel_path, *file);
            }
            ReadOutcome::TooLarge => *result.skipped_by_ext.entry("too_large".to_string()).or_insert(0) += 1,
            ReadOutcome::Failed => *result.skipped_by_ext.entry("read_error".to_string()).or_insert(0) += 1,
        }
    }

    debug!(files = result.files.len(), "Project scan complete");
    Ok(result)
}
