//! Per-language import extractors.
//!
//! Each extractor parses a file with tree-sitter, collects raw import/include
//! specifiers, and hands them to the [`ImportResolver`]. Dispatch is a fixed
//! extension → extractor table ([`ExtractorRegistry`]).

mod c_family;
mod html;
mod javascript;
mod python;

pub use c_family::CFamilyExtractor;
pub use html::HtmlExtractor;
pub use javascript::JavaScriptExtractor;
pub use python::PythonExtractor;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{AnalysisError, Result};
use crate::resolve::ImportResolver;
use crate::types::{HtmlOptions, ProjectFileSet};

// ---------------------------------------------------------------------------
// Parser back-ends
// ---------------------------------------------------------------------------

/// A tree-sitter grammar an extractor depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    C,
    Cpp,
    Html,
}

impl Backend {
    pub const ALL: [Backend; 7] = [
        Backend::Python,
        Backend::JavaScript,
        Backend::TypeScript,
        Backend::Tsx,
        Backend::C,
        Backend::Cpp,
        Backend::Html,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Python => "python",
            Backend::JavaScript => "javascript",
            Backend::TypeScript => "typescript",
            Backend::Tsx => "tsx",
            Backend::C => "c",
            Backend::Cpp => "cpp",
            Backend::Html => "html",
        }
    }

    /// The grammar, if it was compiled into this build.
    #[allow(unreachable_patterns)]
    fn language(&self) -> Option<Language> {
        match self {
            Backend::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "javascript")]
            Backend::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "javascript")]
            Backend::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "javascript")]
            Backend::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "c-family")]
            Backend::C => Some(tree_sitter_c::LANGUAGE.into()),
            #[cfg(feature = "c-family")]
            Backend::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            #[cfg(feature = "html")]
            Backend::Html => Some(tree_sitter_html::LANGUAGE.into()),
            _ => None,
        }
    }

    /// Compiled in and loadable by the linked tree-sitter runtime. Probed once per process.
    pub fn available(&self) -> bool {
        static CAPABILITIES: OnceLock<HashMap<Backend, bool>> = OnceLock::new();
        let caps = CAPABILITIES.get_or_init(|| {
            Backend::ALL
                .iter()
                .map(|b| {
                    let ok = b
                        .language()
                        .map(|lang| Parser::new().set_language(&lang).is_ok())
                        .unwrap_or(false);
                    (*b, ok)
                })
                .collect()
        });
        caps.get(self).copied().unwrap_or(false)
    }

    /// Parse `content`. `None` when the back-end is missing or the parser gave up.
    pub fn parse(&self, content: &str) -> Option<Tree> {
        if !self.available() {
            return None;
        }
        let lang = self.language()?;
        let mut parser = Parser::new();
        parser.set_language(&lang).ok()?;
        parser.parse(content, None)
    }
}

// ---------------------------------------------------------------------------
// Extractor trait and registry
// ---------------------------------------------------------------------------

/// Everything an extractor sees about one file.
pub struct ExtractContext<'a> {
    /// Project-relative path of the file being analysed.
    pub path: &'a str,
    pub ext: &'a str,
    pub content: &'a str,
    pub resolver: &'a ImportResolver,
    pub files: &'a ProjectFileSet,
    pub html: HtmlOptions,
}

impl ExtractContext<'_> {
    /// Project-relative directory of the file, `""` at the root.
    pub fn dir(&self) -> &str {
        crate::types::parent_dir(self.path)
    }
}

/// Parses one language and returns the resolved in-project dependencies.
pub trait ImportExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    /// False when the parser back-end is missing; the file is then skipped.
    fn available(&self) -> bool;
    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<BTreeSet<String>>;
}

/// Extension → extractor table.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_ext: HashMap<String, Arc<dyn ImportExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Python, JS/TS, C/C++ and HTML extractors on their usual extensions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(&["py", "pyw"], Arc::new(PythonExtractor));
        registry.register(&["js", "jsx", "mjs", "cjs"], Arc::new(JavaScriptExtractor::javascript()));
        registry.register(&["ts", "mts", "cts"], Arc::new(JavaScriptExtractor::typescript()));
        registry.register(&["tsx"], Arc::new(JavaScriptExtractor::tsx()));
        registry.register(&["c", "h"], Arc::new(CFamilyExtractor::c()));
        registry.register(&["cpp", "cc", "cxx", "hpp", "hh", "hxx"], Arc::new(CFamilyExtractor::cpp()));
        registry.register(&["html", "htm"], Arc::new(HtmlExtractor));
        registry
    }

    pub fn register(&mut self, exts: &[&str], extractor: Arc<dyn ImportExtractor>) {
        for ext in exts {
            self.by_ext.insert(crate::types::normalize_ext(ext), Arc::clone(&extractor));
        }
    }

    pub fn get(&self, ext: &str) -> Option<&Arc<dyn ImportExtractor>> {
        self.by_ext.get(ext)
    }

    /// The extractor for `ext`, if one is registered and its back-end loaded.
    pub fn usable(&self, ext: &str) -> Result<&Arc<dyn ImportExtractor>> {
        self.get(ext)
            .filter(|e| e.available())
            .ok_or_else(|| AnalysisError::UnsupportedLanguage { ext: ext.to_string() })
    }

    pub fn extensions(&self) -> BTreeSet<String> {
        self.by_ext.keys().cloned().collect()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut exts: Vec<_> = self.by_ext.iter().map(|(e, x)| format!("{e}={}", x.name())).collect();
        exts.sort();
        f.debug_struct("ExtractorRegistry").field("by_ext", &exts).finish()
    }
}

// ---------------------------------------------------------------------------
// Shared tree helpers
// ---------------------------------------------------------------------------

fn node_text<'s>(node: &Node, source: &'s [u8]) -> Option<&'s str> {
    node.utf8_text(source).ok()
}

/// Strip one layer of matching quotes or angle brackets.
fn unquote(text: &str) -> &str {
    let t = text.trim();
    if t.len() >= 2 {
        let (first, last) = (t.as_bytes()[0], t.as_bytes()[t.len() - 1]);
        if (first == last && matches!(first, b'"' | b'\'' | b'`')) || (first == b'<' && last == b'>') {
            return &t[1..t.len() - 1];
        }
    }
    t
}

/// 1-based line of the first ERROR or MISSING node, if the tree has one.
fn first_error_line(node: &Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(&child) {
            return Some(line);
        }
    }
    Some(node.start_position().row + 1)
}

fn parse_failure(path: &str, message: impl Into<String>) -> AnalysisError {
    AnalysisError::ParseFailure { path: path.to_string(), message: message.into() }
}
