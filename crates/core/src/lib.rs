//! ctxbundle: dependency-aware context bundles for source projects.
//!
//! Scans a project, extracts the imports of every in-scope file with tree-sitter,
//! resolves them to project files, computes each file's transitive closure and
//! writes one self-contained text bundle per file.
//!
//! # Modules
//!
//! - [`types`]: project files, statuses, run configuration and report
//! - [`error`]: the [`AnalysisError`] taxonomy
//! - [`normalize`]: lexical path normalization against the project root
//! - [`resolve`]: import specifier to project path resolution
//! - [`extract`]: per-language import extractors and their registry
//! - [`cache`]: per-run dependency cache and analyzer counters
//! - [`analyze`]: direct dependency analysis for one file
//! - [`closure`]: cycle-safe, depth-capped transitive closure
//! - [`run`]: the parallel two-phase run and [`process_project`]
//! - [`progress`]: run log and progress reporting
//! - [`scan`]: project walk, filtering and file loading
//! - [`clean`]: comment stripping for bundle output
//! - [`tree`]: text rendering of the project tree
//! - [`bundle`]: context bundle writer

pub mod analyze;
pub mod bundle;
pub mod cache;
pub mod clean;
pub mod closure;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod progress;
pub mod resolve;
pub mod run;
pub mod scan;
pub mod tree;
pub mod types;

pub use error::{AnalysisError, Result};
pub use progress::{LogEntry, LogLevel, ProgressReporter, RunLog};
pub use run::process_project;
pub use types::{AnalysisConfig, AnalysisStatus, ProjectFile, RunReport};

use std::path::Path;
use tracing::{debug, warn};

use crate::types::normalize_ext;

// ---------------------------------------------------------------------------
// .ctxbundle.toml config loading
// ---------------------------------------------------------------------------

pub const CONFIG_FILE_NAME: &str = ".ctxbundle.toml";

const KNOWN_CONFIG_KEYS: &[&str] = &[
    "extensions",
    "skip_dirs",
    "ignore_patterns",
    "max_depth",
    "threads",
    "max_file_bytes",
    "html_media",
    "html_anchors",
];

/// Levenshtein distance, used for "did you mean" hints on unknown keys.
fn edit_distance(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn warn_unknown_key(key: &str) {
    let closest = KNOWN_CONFIG_KEYS
        .iter()
        .map(|k| (edit_distance(key, k), *k))
        .min();
    match closest {
        Some((dist, suggestion)) if dist <= 3 => {
            warn!(key, suggestion, "Unknown key in {CONFIG_FILE_NAME}, did you mean '{suggestion}'?");
        }
        _ => {
            warn!(key, "Unknown key in {CONFIG_FILE_NAME} (known keys: {})", KNOWN_CONFIG_KEYS.join(", "));
        }
    }
}

fn string_array(path: &Path, table: &toml::Table, key: &str) -> Result<Option<Vec<String>>> {
    let Some(value) = table.get(key) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| AnalysisError::config(path, format!("'{key}' must be an array of strings")))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| AnalysisError::config(path, format!("'{key}' must contain only strings")))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn positive_int(path: &Path, table: &toml::Table, key: &str) -> Result<Option<u64>> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .filter(|&n| n >= 0)
            .map(|n| Some(n as u64))
            .ok_or_else(|| AnalysisError::config(path, format!("'{key}' must be a non-negative integer"))),
    }
}

fn boolean(path: &Path, table: &toml::Table, key: &str) -> Result<Option<bool>> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| AnalysisError::config(path, format!("'{key}' must be true or false"))),
    }
}

/// Apply the keys of an already-parsed config table on top of `config`.
///
/// List keys other than `extensions` are merged with the defaults.
pub fn apply_config_table(config: &mut AnalysisConfig, table: &toml::Table, source: &Path) -> Result<()> {
    for key in table.keys() {
        if !KNOWN_CONFIG_KEYS.contains(&key.as_str()) {
            warn_unknown_key(key);
        }
    }

    if let Some(exts) = string_array(source, table, "extensions")? {
        config.extensions = exts.iter().map(|e| normalize_ext(e)).filter(|e| !e.is_empty()).collect();
    }
    if let Some(dirs) = string_array(source, table, "skip_dirs")? {
        config.skip_dirs.extend(dirs);
    }
    if let Some(patterns) = string_array(source, table, "ignore_patterns")? {
        for pattern in patterns {
            if !config.ignore_patterns.contains(&pattern) {
                config.ignore_patterns.push(pattern);
            }
        }
    }
    if let Some(depth) = positive_int(source, table, "max_depth")? {
        config.max_depth = depth as usize;
    }
    if let Some(threads) = positive_int(source, table, "threads")? {
        config.threads = Some(threads as usize);
    }
    if let Some(bytes) = positive_int(source, table, "max_file_bytes")? {
        config.max_file_bytes = bytes;
    }
    if let Some(media) = boolean(source, table, "html_media")? {
        config.html.follow_media = media;
    }
    if let Some(anchors) = boolean(source, table, "html_anchors")? {
        config.html.follow_anchors = anchors;
    }
    Ok(())
}

/// Load run configuration from `.ctxbundle.toml` in the project root.
///
/// A missing file yields the defaults. Malformed TOML or a value of the wrong
/// type is a [`AnalysisError::Config`] naming the file.
pub fn load_ctxbundle_config(project_root: &Path) -> Result<AnalysisConfig> {
    let mut config = AnalysisConfig::new(project_root.to_path_buf());
    let config_path = project_root.join(CONFIG_FILE_NAME);
    if !config_path.is_file() {
        return Ok(config);
    }

    debug!(path = %config_path.display(), "Loading {CONFIG_FILE_NAME}");
    let content = std::fs::read_to_string(&config_path).map_err(|e| AnalysisError::io(&config_path, e))?;
    let table = content
        .parse::<toml::Table>()
        .map_err(|e| AnalysisError::config(&config_path, e.to_string()))?;
    apply_config_table(&mut config, &table, &config_path)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("max_depth", "max_depth"), 0);
        assert_eq!(edit_distance("max_dept", "max_depth"), 1);
        assert_eq!(edit_distance("extention", "extensions"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_ctxbundle_config(tmp.path()).unwrap();
        assert!(config.extensions.is_empty());
        assert_eq!(config.max_depth, types::DEFAULT_MAX_DEPTH);
        assert!(config.skip_dirs.contains("node_modules"));
        assert!(!config.html.follow_anchors);
    }

    #[test]
    fn test_overrides_and_merges() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
extensions = [".PY", "js", ""]
skip_dirs = ["vendor"]
ignore_patterns = ["*_pb2.py", "*.log"]
max_depth = 3
threads = 2
html_anchors = true
mystery = 1
"#,
        )
        .unwrap();
        let config = load_ctxbundle_config(tmp.path()).unwrap();
        let exts: Vec<&str> = config.extensions.iter().map(|s| s.as_str()).collect();
        assert_eq!(exts, vec!["js", "py"]);
        assert!(config.skip_dirs.contains("vendor"));
        assert!(config.skip_dirs.contains(".git"), "defaults are kept");
        assert_eq!(config.ignore_patterns.iter().filter(|p| *p == "*.log").count(), 1);
        assert!(config.ignore_patterns.contains(&"*_pb2.py".to_string()));
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.threads, Some(2));
        assert!(config.html.follow_anchors);
        assert!(!config.html.follow_media);
    }

    #[test]
    fn test_wrong_type_names_key() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "max_depth = \"deep\"\n").unwrap();
        let err = load_ctxbundle_config(tmp.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::Config { .. }));
        assert!(err.to_string().contains("max_depth"), "got: {err}");
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "extensions = [\n").unwrap();
        assert!(matches!(load_ctxbundle_config(tmp.path()), Err(AnalysisError::Config { .. })));
    }
}
