//! Context bundle writer: one overview file plus one text file per source file.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::progress::{timestamp_now, RunLog};
use crate::tree::render_project_tree;
use crate::types::ProjectFile;

pub const OVERVIEW_FILE_NAME: &str = "_PROJECT_OVERVIEW_CONTEXT.txt";

fn rule() -> String {
    "=".repeat(80)
}

/// Overview listing the tree and every processed file.
pub fn render_overview(root: &Path, tree: &str, files: &BTreeMap<String, ProjectFile>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "AI CONTEXT - PROJECT OVERVIEW");
    let _ = writeln!(out, "Project Root: {}", root.display());
    let _ = writeln!(out, "Generated at: {}", timestamp_now());
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{tree}\n");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "ALL PROCESSED SOURCE FILES IN PROJECT:");
    let _ = writeln!(out, "{}", rule());
    for path in files.keys() {
        let _ = writeln!(out, "- {path}");
    }
    out.push('\n');
    out
}

/// Bundle for one file: the focused file's cleaned content, then each transitive dependency.
pub fn render_file_bundle(
    root: &Path,
    tree: &str,
    file: &ProjectFile,
    files: &BTreeMap<String, ProjectFile>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "AI CONTEXT - Source File Focus: {}", file.path);
    let _ = writeln!(out, "Project Root: {}", root.display());
    let _ = writeln!(out, "Generated at: {}", timestamp_now());
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{tree}\n");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "FOCUSED FILE CONTENT: {}", file.path);
    let _ = writeln!(out, "(Dependency Analysis Status: {})", file.status);
    if let Some(err) = &file.error {
        let _ = writeln!(out, "(Analysis Error: {err})");
    }
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{}\n", file.content);

    let deps: Vec<&ProjectFile> = file.transitive_deps.iter().filter_map(|d| files.get(d)).collect();
    let _ = writeln!(out, "{}", rule());
    if deps.is_empty() {
        let _ = writeln!(out, "No intra-project file dependencies identified or analysis skipped/error.");
        let _ = writeln!(out, "{}\n", rule());
    } else {
        let _ = writeln!(out, "DEPENDENT FILES' CONTENT (intra-project):");
        let _ = writeln!(out, "{}\n", rule());
        for dep in deps {
            let _ = writeln!(out, "--- FILE (Dependency): {} ---", dep.path);
            let _ = writeln!(out, "{}\n", dep.content);
        }
    }
    out
}

/// Write every bundle under `dest`, mirroring the project layout. Returns files written.
///
/// Individual write failures are logged and skipped; only an unusable `dest` is an error.
pub fn write_bundles(
    root: &Path,
    files: &BTreeMap<String, ProjectFile>,
    dest: &Path,
    log: &RunLog,
) -> Result<usize> {
    fs::create_dir_all(dest).map_err(|e| AnalysisError::io(dest, e))?;
    log.info("Generating context output files...");

    let tree = render_project_tree(files.keys().map(|s| s.as_str()));
    let mut written = 0;

    let overview = dest.join(OVERVIEW_FILE_NAME);
    match fs::write(&overview, render_overview(root, &tree, files)) {
        Ok(()) => {
            log.success(format!("Main project overview file generated: {OVERVIEW_FILE_NAME}"));
            written += 1;
        }
        Err(e) => {
            log.error(format!("Failed to generate main overview file {}: {e}", overview.display()));
        }
    }

    let total = files.len();
    let step = (total / 10).max(1);
    for (i, file) in files.values().enumerate() {
        let out_dir = dest.join(file.dir());
        let out_path = out_dir.join(format!("{}.txt", file.file_name));
        let result = fs::create_dir_all(&out_dir)
            .and_then(|_| fs::write(&out_path, render_file_bundle(root, &tree, file, files)));
        match result {
            Ok(()) => written += 1,
            Err(e) => {
                log.error(format!("Failed to generate context file {}: {e}", out_path.display()));
            }
        }
        if (i + 1) % step == 0 {
            log.success(format!("Generated {}/{total} individual context files.", i + 1));
        }
    }

    Ok(written)
}
