use std::collections::BTreeSet;
use tree_sitter::Node;

use super::{first_error_line, node_text, parse_failure, Backend, ExtractContext, ImportExtractor};
use crate::error::Result;
use crate::resolve::ResolutionMode;

/// `import`, `from ... import`, `__import__("x")` and `importlib.import_module("x")`.
pub struct PythonExtractor;

#[derive(Debug, PartialEq, Eq)]
enum PyImport {
    /// `import a.b` or a literal dynamic import.
    Module(String),
    /// `from <module> import <names>`, module text keeps its leading dots.
    From { module: String, names: Vec<String> },
}

impl ImportExtractor for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
    }

    fn available(&self) -> bool {
        Backend::Python.available()
    }

    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<BTreeSet<String>> {
        let tree = Backend::Python
            .parse(ctx.content)
            .ok_or_else(|| parse_failure(ctx.path, "parser returned no tree"))?;
        let root = tree.root_node();
        if let Some(line) = first_error_line(&root) {
            return Err(parse_failure(ctx.path, format!("syntax error near line {line}")));
        }

        let mut imports = Vec::new();
        walk_node(&root, ctx.content.as_bytes(), &mut imports);

        let dir = ctx.dir();
        let resolve = |spec: &str| ctx.resolver.resolve(spec, ResolutionMode::PythonModule, dir, ctx.files);
        let mut deps = BTreeSet::new();
        for import in imports {
            match import {
                PyImport::Module(spec) => deps.extend(resolve(&spec)),
                PyImport::From { module, names } => {
                    if module.chars().all(|c| c == '.') {
                        // `from . import a, b`: the names are the submodules
                        let mut found = BTreeSet::new();
                        for name in &names {
                            found.extend(resolve(&format!("{module}{name}")));
                        }
                        if found.is_empty() {
                            found = resolve(&module);
                        }
                        deps.extend(found);
                    } else {
                        deps.extend(resolve(&module));
                        for name in &names {
                            deps.extend(resolve(&format!("{module}.{name}")));
                        }
                    }
                }
            }
        }
        deps.remove(ctx.path);
        Ok(deps)
    }
}

fn walk_node(node: &Node, source: &[u8], out: &mut Vec<PyImport>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                if let Some(module) = imported_name(&name, source) {
                    out.push(PyImport::Module(module));
                }
            }
            return;
        }
        "import_from_statement" => {
            if let Some(module) = node
                .child_by_field_name("module_name")
                .and_then(|m| node_text(&m, source))
                .map(compact)
            {
                let mut cursor = node.walk();
                let names = node
                    .children_by_field_name("name", &mut cursor)
                    .filter_map(|n| imported_name(&n, source))
                    .collect();
                out.push(PyImport::From { module, names });
            }
            return;
        }
        "call" => {
            if let Some(spec) = dynamic_import(node, source) {
                out.push(PyImport::Module(spec));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_node(&child, source, out);
    }
}

/// `a.b` or the module part of `a.b as c`.
fn imported_name(node: &Node, source: &[u8]) -> Option<String> {
    let target = if node.kind() == "aliased_import" { node.child_by_field_name("name")? } else { *node };
    let text = compact(node_text(&target, source)?);
    (!text.is_empty()).then_some(text)
}

fn dynamic_import(node: &Node, source: &[u8]) -> Option<String> {
    let callee = compact(node_text(&node.child_by_field_name("function")?, source)?);
    if callee != "__import__" && callee != "importlib.import_module" {
        return None;
    }
    let args = node.child_by_field_name("arguments")?;
    let first = args.named_child(0)?;
    string_literal(&first, source)
}

/// Value of a plain string literal. f-strings and concatenations are not literals.
fn string_literal(node: &Node, source: &[u8]) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut value = String::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "string_start" => {
                let prefix = node_text(&child, source)?;
                if prefix.contains(['f', 'F']) {
                    return None;
                }
            }
            "string_content" => value.push_str(node_text(&child, source)?),
            "interpolation" => return None,
            _ => {}
        }
    }
    (!value.is_empty()).then_some(value)
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{run, set};
    use super::*;
    use crate::error::AnalysisError;
    use crate::types::HtmlOptions;

    const PKG: &[&str] = &["pkg/__init__.py", "pkg/mod.py", "pkg/helper.py", "pkg/sub/__init__.py", "app.py"];

    fn extract(path: &str, src: &str, files: &[&str]) -> BTreeSet<String> {
        run(&PythonExtractor, path, src, files, HtmlOptions::default()).unwrap()
    }

    #[test]
    fn test_from_dot_import_sibling() {
        let got = extract("pkg/mod.py", "from . import helper\n", PKG);
        assert_eq!(got, set(&["pkg/helper.py"]));
    }

    #[test]
    fn test_from_dot_import_non_module_falls_back_to_package() {
        let got = extract("pkg/mod.py", "from . import CONSTANT\n", PKG);
        assert_eq!(got, set(&["pkg/__init__.py"]));
    }

    #[test]
    fn test_absolute_and_aliased_imports() {
        let src = "import os, pkg.helper as h\nimport pkg.sub\n";
        let got = extract("app.py", src, PKG);
        assert_eq!(got, set(&["pkg/helper.py", "pkg/sub/__init__.py"]));
    }

    #[test]
    fn test_from_module_import_names_probes_submodules() {
        let src = "from pkg import helper, something_else\nfrom pkg.helper import thing\n";
        let got = extract("app.py", src, PKG);
        assert_eq!(got, set(&["pkg/__init__.py", "pkg/helper.py"]));
    }

    #[test]
    fn test_wildcard_import_resolves_module_only() {
        let got = extract("pkg/sub/__init__.py", "from ..helper import *\n", PKG);
        assert_eq!(got, set(&["pkg/helper.py"]));
    }

    #[test]
    fn test_dynamic_imports_literal_only() {
        let src = r#"
import importlib
a = importlib.import_module("pkg.helper")
b = __import__("app")
name = "pkg.mod"
c = importlib.import_module(name)
d = __import__(f"pkg.{name}")
"#;
        let got = extract("pkg/mod.py", src, PKG);
        assert_eq!(got, set(&["pkg/helper.py", "app.py"]));
    }

    #[test]
    fn test_imports_inside_functions_are_found() {
        let src = "def load():\n    from .helper import run\n    return run\n";
        let got = extract("pkg/mod.py", src, PKG);
        assert_eq!(got, set(&["pkg/helper.py"]));
    }

    #[test]
    fn test_never_includes_self() {
        let got = extract("pkg/mod.py", "from . import mod\nimport pkg.mod\n", PKG);
        assert!(!got.contains("pkg/mod.py"));
    }

    #[test]
    fn test_syntax_error_is_parse_failure() {
        let err = run(&PythonExtractor, "pkg/mod.py", "def broken(:\n    pass\n", PKG, HtmlOptions::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ParseFailure { .. }), "got {err:?}");
    }
}
