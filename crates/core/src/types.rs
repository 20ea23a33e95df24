use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use crate::progress::LogEntry;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default cap on dependency hops followed by the closure engine.
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Files larger than this are scanned but not analysed.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Smallest worker pool the run coordinator will build.
pub const MIN_WORKERS: usize = 4;

// ---------------------------------------------------------------------------
// Analysis configuration, loaded from .ctxbundle.toml or defaults
// ---------------------------------------------------------------------------

/// Which optional HTML references count as dependencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Follow `img`/`source`/`video`/`audio` `src` attributes.
    pub follow_media: bool,
    /// Follow `a[href]` links to local pages.
    pub follow_anchors: bool,
}

/// Runtime configuration for one run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub root: PathBuf,
    /// Lower-cased extensions without the leading dot. Empty = every registered extension.
    pub extensions: BTreeSet<String>,
    /// Directory names pruned during the walk.
    pub skip_dirs: HashSet<String>,
    /// Gitignore-style patterns for files that never enter the project set.
    pub ignore_patterns: Vec<String>,
    pub max_depth: usize,
    /// Worker count override. `None` = available parallelism, at least [`MIN_WORKERS`].
    pub threads: Option<usize>,
    pub max_file_bytes: u64,
    pub html: HtmlOptions,
}

impl AnalysisConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            extensions: BTreeSet::new(),
            skip_dirs: [
                ".git",
                "__pycache__",
                "node_modules",
                "venv",
                ".venv",
                "env",
                ".env",
                "target",
                "build",
                "dist",
                "out",
                ".vscode",
                ".idea",
                "bin",
                "obj",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ignore_patterns: [
                ".DS_Store",
                "*.pyc",
                "*.pyo",
                "*.log",
                "*.tmp",
                "*.bak",
                "*.swp",
                "*.dll",
                "*.exe",
                "*.so",
                "*.dylib",
                "*.o",
                "*.a",
                "*.lib",
                "package-lock.json",
                "yarn.lock",
                "composer.lock",
                "Pipfile.lock",
                "poetry.lock",
                "Gemfile.lock",
                "go.sum",
                "Cargo.lock",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_depth: DEFAULT_MAX_DEPTH,
            threads: None,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            html: HtmlOptions::default(),
        }
    }

    /// Worker pool size: the override, or hardware parallelism with a floor of [`MIN_WORKERS`].
    pub fn worker_count(&self) -> usize {
        self.threads.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(MIN_WORKERS)
                .max(MIN_WORKERS)
        })
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

/// Normalize a user-supplied extension: strip the dot, lower-case.
pub fn normalize_ext(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Key used for an extension in counters and summaries.
pub fn ext_label(ext: &str) -> &str {
    if ext.is_empty() {
        "(none)"
    } else {
        ext
    }
}

// ---------------------------------------------------------------------------
// Analysis status
// ---------------------------------------------------------------------------

/// Per-file outcome of dependency analysis. Never goes back to `Pending` once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AnalysisStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "success (cached)")]
    SuccessCached,
    #[serde(rename = "skipped (no parser)")]
    SkippedNoParser,
    #[serde(rename = "error")]
    Error,
    /// The worker task itself failed (panicked).
    #[serde(rename = "error (task fatal)")]
    Fatal,
}

impl AnalysisStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Success => "success",
            AnalysisStatus::SuccessCached => "success (cached)",
            AnalysisStatus::SkippedNoParser => "skipped (no parser)",
            AnalysisStatus::Error => "error",
            AnalysisStatus::Fatal => "error (task fatal)",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisStatus::Success | AnalysisStatus::SuccessCached)
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of analysing one file's direct dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectOutcome {
    pub deps: BTreeSet<String>,
    pub status: AnalysisStatus,
    pub error: Option<String>,
}

impl DirectOutcome {
    pub fn success(deps: BTreeSet<String>) -> Self {
        Self { deps, status: AnalysisStatus::Success, error: None }
    }

    pub fn cached(deps: BTreeSet<String>) -> Self {
        Self { deps, status: AnalysisStatus::SuccessCached, error: None }
    }

    pub fn skipped() -> Self {
        Self { deps: BTreeSet::new(), status: AnalysisStatus::SkippedNoParser, error: None }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self { deps: BTreeSet::new(), status: AnalysisStatus::Error, error: Some(detail.into()) }
    }

    pub fn fatal(detail: impl Into<String>) -> Self {
        Self { deps: BTreeSet::new(), status: AnalysisStatus::Fatal, error: Some(detail.into()) }
    }
}

// ---------------------------------------------------------------------------
// Project files
// ---------------------------------------------------------------------------

/// One in-scope source file. Identity is the forward-slash project-relative `path`.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectFile {
    pub path: String,
    pub file_name: String,
    /// Lower-cased extension without the dot (`"py"`, `"tsx"`).
    pub ext: String,
    pub size: u64,
    /// Seconds since the Unix epoch, 0 if unknown.
    pub modified: u64,
    #[serde(skip)]
    pub raw_content: String,
    /// Comment-stripped variant used for output bundles.
    #[serde(skip)]
    pub content: String,
    pub direct_deps: BTreeSet<String>,
    pub transitive_deps: BTreeSet<String>,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProjectFile {
    /// Build a pending record from raw text. `content` starts out equal to the raw text.
    pub fn new(path: &str, raw_content: String) -> Self {
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self {
            path: path.to_string(),
            file_name,
            ext,
            size: raw_content.len() as u64,
            modified: 0,
            content: raw_content.clone(),
            raw_content,
            direct_deps: BTreeSet::new(),
            transitive_deps: BTreeSet::new(),
            status: AnalysisStatus::Pending,
            error: None,
        }
    }

    /// Directory part of the path, `""` for files at the root.
    pub fn dir(&self) -> &str {
        parent_dir(&self.path)
    }

    /// Record a direct-dependency outcome. The file's own path is never kept.
    pub fn apply_direct(&mut self, outcome: DirectOutcome) {
        let mut deps = outcome.deps;
        deps.remove(&self.path);
        self.direct_deps = deps;
        self.status = outcome.status;
        self.error = outcome.error;
    }

    /// Record a computed closure. Always includes the direct set.
    pub fn apply_transitive(&mut self, mut deps: BTreeSet<String>) {
        deps.extend(self.direct_deps.iter().cloned());
        deps.remove(&self.path);
        self.transitive_deps = deps;
    }
}

/// Directory part of a project-relative path, `""` at the root.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}

/// The closed set of project-relative paths for one run; the resolver's membership oracle.
#[derive(Debug, Clone, Default)]
pub struct ProjectFileSet {
    paths: HashSet<String>,
}

impl ProjectFileSet {
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(|s| s.as_str())
    }
}

impl<S: Into<String>> FromIterator<S> for ProjectFileSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { paths: iter.into_iter().map(Into::into).collect() }
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Everything one run produced, in a form the CLI can print or serialize.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub files: BTreeMap<String, ProjectFile>,
    pub log: Vec<LogEntry>,
    /// In-scope files per extension.
    pub processed_by_ext: BTreeMap<String, usize>,
    /// Files seen but not analysed, by extension or reason (`ignored_item`, `too_large`, ...).
    pub skipped_by_ext: BTreeMap<String, usize>,
    pub status_counts: BTreeMap<String, usize>,
    pub analyzer_stats: BTreeMap<String, usize>,
    /// Context files written, overview included. 0 when no destination was given.
    pub bundles_written: usize,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn error_count(&self) -> usize {
        self.files
            .values()
            .filter(|f| matches!(f.status, AnalysisStatus::Error | AnalysisStatus::Fatal))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_file_fields() {
        let f = ProjectFile::new("src/App.TSX", "export {}".to_string());
        assert_eq!(f.file_name, "App.TSX");
        assert_eq!(f.ext, "tsx");
        assert_eq!(f.dir(), "src");
        assert_eq!(f.status, AnalysisStatus::Pending);

        let root = ProjectFile::new("Makefile", String::new());
        assert_eq!(root.ext, "");
        assert_eq!(root.dir(), "");
    }

    #[test]
    fn test_apply_drops_self_edges() {
        let mut f = ProjectFile::new("a.py", String::new());
        let deps: BTreeSet<String> = ["a.py", "b.py"].iter().map(|s| s.to_string()).collect();
        f.apply_direct(DirectOutcome::success(deps));
        assert_eq!(f.direct_deps.len(), 1);
        assert!(f.direct_deps.contains("b.py"));

        f.apply_transitive(["a.py", "c.py"].iter().map(|s| s.to_string()).collect());
        assert!(!f.transitive_deps.contains("a.py"));
        assert!(f.transitive_deps.contains("b.py"), "closure must include direct deps");
        assert!(f.transitive_deps.contains("c.py"));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(AnalysisStatus::SuccessCached.label(), "success (cached)");
        assert_eq!(AnalysisStatus::SkippedNoParser.to_string(), "skipped (no parser)");
        assert!(AnalysisStatus::SuccessCached.is_success());
        assert!(!AnalysisStatus::Fatal.is_success());
    }

    #[test]
    fn test_worker_count_floor() {
        let mut cfg = AnalysisConfig::default();
        assert!(cfg.worker_count() >= MIN_WORKERS);
        cfg.threads = Some(2);
        assert_eq!(cfg.worker_count(), 2);
        cfg.threads = Some(0);
        assert!(cfg.worker_count() >= MIN_WORKERS);
    }

    #[test]
    fn test_normalize_ext() {
        assert_eq!(normalize_ext(".PY"), "py");
        assert_eq!(normalize_ext(" tsx "), "tsx");
        assert_eq!(ext_label(""), "(none)");
    }

    #[test]
    fn test_report_json_omits_content() {
        let mut f = ProjectFile::new("a.py", "SECRET = 1".to_string());
        f.apply_direct(DirectOutcome::error("parse failure in a.py: syntax error near line 1"));
        let mut report = RunReport::default();
        report.files.insert(f.path.clone(), f);

        let json = serde_json::to_value(&report).unwrap();
        let file = &json["files"]["a.py"];
        assert_eq!(file["status"], "error");
        assert!(file.get("content").is_none());
        assert!(file.get("raw_content").is_none());
        assert!(!json.to_string().contains("SECRET"));
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_status_serializes_as_label() {
        let all = [
            AnalysisStatus::Pending,
            AnalysisStatus::Success,
            AnalysisStatus::SuccessCached,
            AnalysisStatus::SkippedNoParser,
            AnalysisStatus::Error,
            AnalysisStatus::Fatal,
        ];
        for status in all {
            assert_eq!(serde_json::to_value(status).unwrap(), status.label(), "{status:?}");
        }
        assert_eq!(serde_json::to_string(&AnalysisStatus::SkippedNoParser).unwrap(), "\"skipped (no parser)\"");
    }
}
