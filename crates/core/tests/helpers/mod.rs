//! Test harness for end-to-end runs over fixture projects.
//!
//! Copies a fixture tree into a temp dir, loads its `.ctxbundle.toml` and
//! calls the library entry points directly.

#![allow(dead_code)]

pub mod fixtures;

use ctxbundle_core::progress::ProgressReporter;
use ctxbundle_core::{load_ctxbundle_config, process_project, AnalysisConfig, ProjectFile, RunReport};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub struct TestProject {
    pub config: AnalysisConfig,
    /// Every line the progress reporter received, in order.
    pub progress: Arc<Mutex<Vec<String>>>,
    temp_dir: TempDir,
}

impl TestProject {
    /// Create a project from a named fixture directory under `tests/fixtures`.
    pub fn from_fixture(name: &str) -> Self {
        let fixture_src = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
        assert!(fixture_src.exists(), "Fixture '{name}' not found at {}", fixture_src.display());

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join(name);
        fixtures::copy_dir_recursive(&fixture_src, &root);

        let config = load_ctxbundle_config(&root).expect("fixture config should load");
        TestProject { config, progress: Arc::new(Mutex::new(Vec::new())), temp_dir }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// A fresh directory for bundle output, outside the project root.
    pub fn dest(&self) -> PathBuf {
        self.temp_dir.path().join("bundles")
    }

    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        let sink = Arc::clone(&self.progress);
        Arc::new(move |line: &str| -> Option<String> {
            sink.lock().unwrap().push(line.to_string());
            None
        })
    }

    /// Full run without bundle output.
    pub fn run(&self) -> RunReport {
        process_project(&self.config, None, self.reporter()).expect("run should succeed")
    }
}

/// Sorted list view of a dependency set, for readable assertions.
pub fn sorted(set: &BTreeSet<String>) -> Vec<&str> {
    set.iter().map(|s| s.as_str()).collect()
}

pub fn file<'a>(report: &'a RunReport, path: &str) -> &'a ProjectFile {
    report
        .files
        .get(path)
        .unwrap_or_else(|| panic!("{path} missing from report; have {:?}", report.files.keys().collect::<Vec<_>>()))
}
