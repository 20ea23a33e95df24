//! Import resolution: raw specifier + mode + current directory → project paths.
//!
//! Every candidate goes through the [`PathNormalizer`] and is kept only if it is
//! a member of the [`ProjectFileSet`], so the resolver can never produce a
//! dangling dependency.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{AnalysisError, Result};
use crate::normalize::PathNormalizer;
use crate::progress::RunLog;
use crate::types::ProjectFileSet;

/// Specifiers longer than this are rejected outright.
pub const MAX_SPECIFIER_LEN: usize = 4096;

const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".json"];
const JS_INDEX_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx"];
const TS_SOURCE_SUFFIXES: &[(&str, &str)] = &[(".js", ".ts"), (".jsx", ".tsx"), (".mjs", ".mts")];
const HTML_EXTENSIONS: &[&str] = &[".js", ".css", ".html", ".png", ".jpg", ".svg"];

/// Which candidate-generation rules apply to a specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionMode {
    PythonModule,
    RelativeJs,
    RelativeTs,
    RelativeC,
    RelativeHtml,
}

impl ResolutionMode {
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionMode::PythonModule => "python-module",
            ResolutionMode::RelativeJs => "relative-js",
            ResolutionMode::RelativeTs => "relative-ts",
            ResolutionMode::RelativeC => "relative-c",
            ResolutionMode::RelativeHtml => "relative-html",
        }
    }
}

impl std::fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ImportResolver {
    normalizer: PathNormalizer,
    log: Arc<RunLog>,
}

impl ImportResolver {
    pub fn new(normalizer: PathNormalizer, log: Arc<RunLog>) -> Self {
        Self { normalizer, log }
    }

    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    /// Resolve one specifier. Never fails: errors are logged and yield no candidates.
    pub fn resolve(
        &self,
        specifier: &str,
        mode: ResolutionMode,
        current_dir: &str,
        files: &ProjectFileSet,
    ) -> BTreeSet<String> {
        match self.try_resolve(specifier, mode, current_dir, files) {
            Ok(found) => found,
            Err(e) => {
                self.log.warn(format!(
                    "ANALYZER: Error resolving import '{}' type '{}': {e}",
                    truncate(specifier, 80),
                    mode
                ));
                BTreeSet::new()
            }
        }
    }

    pub fn try_resolve(
        &self,
        specifier: &str,
        mode: ResolutionMode,
        current_dir: &str,
        files: &ProjectFileSet,
    ) -> Result<BTreeSet<String>> {
        validate_specifier(specifier)?;
        match mode {
            ResolutionMode::PythonModule => Ok(self.resolve_python(specifier, current_dir, files)),
            ResolutionMode::RelativeJs => Ok(self.resolve_js(specifier, current_dir, files, false)),
            ResolutionMode::RelativeTs => Ok(self.resolve_js(specifier, current_dir, files, true)),
            ResolutionMode::RelativeC => Ok(self.resolve_c(specifier, current_dir, files)),
            ResolutionMode::RelativeHtml => Ok(self.resolve_html(specifier, current_dir, files)),
        }
    }

    fn existing(&self, raw: &str, base_dir: &str, files: &ProjectFileSet) -> Option<String> {
        self.normalizer.normalize(raw, base_dir).filter(|p| files.contains(p))
    }

    /// Insert every candidate that exists. Returns true if anything matched.
    fn probe<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a String>,
        base_dir: &str,
        files: &ProjectFileSet,
        out: &mut BTreeSet<String>,
    ) -> bool {
        let mut hit = false;
        for candidate in candidates {
            if let Some(p) = self.existing(candidate, base_dir, files) {
                out.insert(p);
                hit = true;
            }
        }
        hit
    }

    // -----------------------------------------------------------------------
    // python-module
    // -----------------------------------------------------------------------

    fn resolve_python(&self, specifier: &str, current_dir: &str, files: &ProjectFileSet) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let level = specifier.chars().take_while(|&c| c == '.').count();
        let rest = &specifier[level..];

        let mut parts: Vec<&str> = Vec::new();
        if level > 0 {
            let current: Vec<&str> = current_dir
                .split('/')
                .filter(|s| !s.is_empty() && *s != ".")
                .collect();
            // `.` is the current package; each extra dot climbs one directory
            if level - 1 > current.len() {
                return out;
            }
            parts.extend_from_slice(&current[..current.len() - (level - 1)]);
        }
        parts.extend(rest.split('.').filter(|s| !s.is_empty()));

        let base = parts.join("/");
        let candidates = if base.is_empty() {
            vec!["__init__.py".to_string()]
        } else {
            vec![format!("{base}.py"), format!("{base}/__init__.py")]
        };
        self.probe(&candidates, "", files, &mut out);
        out
    }

    // -----------------------------------------------------------------------
    // relative-js / relative-ts
    // -----------------------------------------------------------------------

    fn resolve_js(
        &self,
        specifier: &str,
        current_dir: &str,
        files: &ProjectFileSet,
        typescript: bool,
    ) -> BTreeSet<String> {
        let mut out = BTreeSet::new();

        if specifier.starts_with('/') {
            if !self.probe_js(specifier, "", files, typescript, &mut out) {
                self.probe_js(specifier.trim_start_matches('/'), "", files, typescript, &mut out);
            }
            return out;
        }

        let relative = specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier == "."
            || specifier == "..";
        let mut base_dir = current_dir;
        if !relative {
            if specifier.contains('/') {
                base_dir = "";
            } else {
                let root_files: Vec<String> =
                    JS_EXTENSIONS.iter().map(|ext| format!("{specifier}{ext}")).collect();
                // No local file of that name: an installed package
                if !self.probe(&root_files, "", files, &mut out) {
                    return out;
                }
            }
        }

        self.probe_js(specifier, base_dir, files, typescript, &mut out);
        out
    }

    fn probe_js(
        &self,
        specifier: &str,
        base_dir: &str,
        files: &ProjectFileSet,
        typescript: bool,
        out: &mut BTreeSet<String>,
    ) -> bool {
        let mut candidates = vec![specifier.to_string()];
        if !JS_EXTENSIONS.iter().any(|ext| specifier.ends_with(ext)) {
            candidates.extend(JS_EXTENSIONS.iter().map(|ext| format!("{specifier}{ext}")));
        }
        candidates.extend(JS_INDEX_EXTENSIONS.iter().map(|ext| format!("{specifier}/index{ext}")));

        let literal_exists = self.existing(specifier, base_dir, files).is_some();
        let mut hit = self.probe(&candidates, base_dir, files, out);

        // ESM sources written as `./x.js` that are really `./x.ts`
        if typescript && !literal_exists {
            let mapped: Vec<String> = TS_SOURCE_SUFFIXES
                .iter()
                .filter_map(|(from, to)| specifier.strip_suffix(from).map(|stem| format!("{stem}{to}")))
                .collect();
            hit |= self.probe(&mapped, base_dir, files, out);
        }
        hit
    }

    // -----------------------------------------------------------------------
    // relative-c
    // -----------------------------------------------------------------------

    fn resolve_c(&self, specifier: &str, current_dir: &str, files: &ProjectFileSet) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if let Some(p) = self.existing(specifier, current_dir, files) {
            out.insert(p);
        }
        if let Some(p) = self.existing(specifier, "", files) {
            out.insert(p);
        }
        out
    }

    // -----------------------------------------------------------------------
    // relative-html
    // -----------------------------------------------------------------------

    fn resolve_html(&self, specifier: &str, current_dir: &str, files: &ProjectFileSet) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if is_external_reference(specifier) {
            return out;
        }
        let value = strip_query_and_fragment(specifier);
        if value.is_empty() {
            return out;
        }

        let attempts: Vec<(&str, &str)> = if value.starts_with('/') {
            vec![(value, ""), (value.trim_start_matches('/'), "")]
        } else {
            vec![(value, current_dir)]
        };

        for (raw, base) in &attempts {
            if let Some(p) = self.existing(raw, base, files) {
                out.insert(p);
                return out;
            }
        }

        let file_name = value.rsplit('/').next().unwrap_or(value);
        if file_name.contains('.') {
            return out;
        }
        for (raw, base) in &attempts {
            for ext in HTML_EXTENSIONS {
                if let Some(p) = self.existing(&format!("{raw}{ext}"), base, files) {
                    out.insert(p);
                    return out;
                }
            }
        }
        out
    }
}

fn validate_specifier(specifier: &str) -> Result<()> {
    if specifier.is_empty() {
        return Err(AnalysisError::resolution(specifier, "empty specifier"));
    }
    if specifier.contains('\0') {
        return Err(AnalysisError::resolution(specifier, "specifier contains NUL"));
    }
    if specifier.len() > MAX_SPECIFIER_LEN {
        return Err(AnalysisError::resolution(
            &specifier[..floor_char_boundary(specifier, 64)],
            format!("specifier longer than {MAX_SPECIFIER_LEN} bytes"),
        ));
    }
    Ok(())
}

/// True for absolute URLs (`https:`, `mailto:`, `data:` ...) and protocol-relative `//host` values.
pub fn is_external_reference(value: &str) -> bool {
    let value = value.trim();
    if value.starts_with("//") {
        return true;
    }
    match value.split_once(':') {
        // Single letters are Windows drives, not schemes
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Drop `?query` and `#fragment` from a resource reference.
pub fn strip_query_and_fragment(value: &str) -> &str {
    let end = value.find(['?', '#']).unwrap_or(value.len());
    value[..end].trim()
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut i = max.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn truncate(s: &str, max: usize) -> &str {
    &s[..floor_char_boundary(s, max)]
}
