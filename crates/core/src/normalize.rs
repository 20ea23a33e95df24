//! Lexical path normalization against the project root.
//!
//! Turns a raw path-like string (an import target, an include, an HTML `src`)
//! plus a project-relative base directory into a canonical project-relative
//! path. Never touches the filesystem, so results depend only on the inputs.

use std::path::{Component, Path, PathBuf};

use crate::error::AnalysisError;

/// Normalizes candidate paths and rejects anything outside the project root.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    root: PathBuf,
    prefix: String,
    root_parts: Vec<String>,
}

impl PathNormalizer {
    /// Relative roots are anchored at the current directory once, here.
    pub fn new(root: &Path) -> Self {
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir().map(|cwd| cwd.join(root)).unwrap_or_else(|_| root.to_path_buf())
        };
        let (prefix, root_parts) = split_components(&absolute);
        Self { root: absolute, prefix, root_parts }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `raw` against `root/base_dir`. `None` when the result leaves the
    /// root, is the root itself, or the input is not a usable path.
    pub fn normalize(&self, raw: &str, base_dir: &str) -> Option<String> {
        if raw.is_empty() || raw.contains('\0') || base_dir.contains('\0') {
            return None;
        }
        let raw = raw.replace('\\', "/");

        let mut stack: Vec<String>;
        let raw_path = Path::new(&raw);
        if raw.starts_with('/') || raw_path.is_absolute() {
            let (prefix, parts) = split_components(raw_path);
            // `/x` on Windows has no drive prefix; treat it as the root's drive
            if !prefix.is_empty() && !prefix.eq_ignore_ascii_case(&self.prefix) {
                return None;
            }
            stack = Vec::new();
            push_parts(&mut stack, parts);
        } else {
            stack = self.root_parts.clone();
            let base = base_dir.replace('\\', "/");
            push_parts(&mut stack, base.split('/').map(|s| s.to_string()));
            push_parts(&mut stack, raw.split('/').map(|s| s.to_string()));
        }

        if stack.len() <= self.root_parts.len() || stack[..self.root_parts.len()] != self.root_parts[..] {
            return None;
        }
        Some(stack[self.root_parts.len()..].join("/"))
    }

    /// Like [`normalize`](Self::normalize) but says why a path was rejected.
    pub fn try_normalize(&self, raw: &str, base_dir: &str) -> Result<String, AnalysisError> {
        self.normalize(raw, base_dir).ok_or_else(|| AnalysisError::PathEscape {
            path: if base_dir.is_empty() { raw.to_string() } else { format!("{base_dir}/{raw}") },
        })
    }
}

/// Split a path into a (prefix, normal components) pair, resolving `.` and `..` lexically.
fn split_components(path: &Path) -> (String, Vec<String>) {
    let mut prefix = String::new();
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => prefix = p.as_os_str().to_string_lossy().to_string(),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(s) => parts.push(s.to_string_lossy().to_string()),
        }
    }
    (prefix, parts)
}

/// Apply path segments to a component stack. `..` at the filesystem root stays at the root.
fn push_parts(stack: &mut Vec<String>, parts: impl IntoIterator<Item = String>) {
    for part in parts {
        match part.as_str() {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(part),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> PathNormalizer {
        PathNormalizer::new(Path::new("/work/project"))
    }

    #[test]
    fn test_relative_to_base_dir() {
        let n = normalizer();
        assert_eq!(n.normalize("b.js", "src").as_deref(), Some("src/b.js"));
        assert_eq!(n.normalize("./b.js", "src").as_deref(), Some("src/b.js"));
        assert_eq!(n.normalize("../lib/c.h", "src/app").as_deref(), Some("src/lib/c.h"));
        assert_eq!(n.normalize("pkg/mod.py", "").as_deref(), Some("pkg/mod.py"));
    }

    #[test]
    fn test_rejects_escape_above_root() {
        let n = normalizer();
        assert_eq!(n.normalize("../../outside", ""), None);
        assert_eq!(n.normalize("../x.py", ""), None);
        assert_eq!(n.normalize("../../../etc/passwd", "src"), None);
        assert!(matches!(
            n.try_normalize("../../outside", ""),
            Err(AnalysisError::PathEscape { .. })
        ));
    }

    #[test]
    fn test_reentering_root_is_allowed() {
        let n = normalizer();
        assert_eq!(n.normalize("../project/a.c", "").as_deref(), Some("a.c"));
    }

    #[test]
    fn test_absolute_paths() {
        let n = normalizer();
        assert_eq!(n.normalize("/usr/include/stdio.h", "src"), None);
        assert_eq!(n.normalize("/work/project/inc/util.h", "src").as_deref(), Some("inc/util.h"));
        // Component-wise prefix check, not string prefix
        assert_eq!(n.normalize("/work/project2/a.h", ""), None);
    }

    #[test]
    fn test_root_itself_and_garbage_are_invalid() {
        let n = normalizer();
        assert_eq!(n.normalize(".", ""), None);
        assert_eq!(n.normalize("src/..", ""), None);
        assert_eq!(n.normalize("", "src"), None);
        assert_eq!(n.normalize("a\0b", ""), None);
    }

    #[test]
    fn test_backslashes_are_separators() {
        let n = normalizer();
        assert_eq!(n.normalize("..\\inc\\defs.h", "src").as_deref(), Some("inc/defs.h"));
    }

    #[test]
    fn test_deterministic() {
        let n = normalizer();
        let a = n.normalize("./x/../y/z.ts", "src");
        let b = n.normalize("./x/../y/z.ts", "src");
        assert_eq!(a, b);
        assert_eq!(a.as_deref(), Some("src/y/z.ts"));
    }
}
