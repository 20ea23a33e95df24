use std::collections::BTreeSet;
use tracing::debug;
use tree_sitter::Node;

use super::{node_text, parse_failure, unquote, Backend, ExtractContext, ImportExtractor};
use crate::error::Result;
use crate::resolve::ResolutionMode;

/// ES module imports/re-exports, `require("x")` and `import("x")`.
pub struct JavaScriptExtractor {
    backend: Backend,
    mode: ResolutionMode,
}

impl JavaScriptExtractor {
    pub fn javascript() -> Self {
        Self { backend: Backend::JavaScript, mode: ResolutionMode::RelativeJs }
    }

    pub fn typescript() -> Self {
        Self { backend: Backend::TypeScript, mode: ResolutionMode::RelativeTs }
    }

    pub fn tsx() -> Self {
        Self { backend: Backend::Tsx, mode: ResolutionMode::RelativeTs }
    }
}

impl ImportExtractor for JavaScriptExtractor {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn available(&self) -> bool {
        self.backend.available()
    }

    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<BTreeSet<String>> {
        let tree = self
            .backend
            .parse(ctx.content)
            .ok_or_else(|| parse_failure(ctx.path, "parser returned no tree"))?;
        let root = tree.root_node();
        if root.has_error() {
            debug!(path = ctx.path, "Syntax errors in JS/TS source, extracting what parsed");
        }

        let mut specifiers = Vec::new();
        walk_node(&root, ctx.content.as_bytes(), &mut specifiers);

        let dir = ctx.dir();
        let mut deps = BTreeSet::new();
        for spec in specifiers {
            deps.extend(ctx.resolver.resolve(&spec, self.mode, dir, ctx.files));
        }
        deps.remove(ctx.path);
        Ok(deps)
    }
}

fn walk_node(node: &Node, source: &[u8], out: &mut Vec<String>) {
    match node.kind() {
        // TS `import x = require("y")` keeps the string in `import_require_clause`
        "import_statement" | "export_statement" | "import_require_clause" => {
            if let Some(spec) = node.child_by_field_name("source").and_then(|s| string_literal(&s, source)) {
                out.push(spec);
            }
        }
        "call_expression" => {
            if let Some(spec) = require_or_import(node, source) {
                out.push(spec);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_node(&child, source, out);
    }
}

fn require_or_import(node: &Node, source: &[u8]) -> Option<String> {
    let callee = node.child_by_field_name("function")?;
    let is_loader = match callee.kind() {
        "import" => true,
        "identifier" => node_text(&callee, source)? == "require",
        _ => false,
    };
    if !is_loader {
        return None;
    }
    let args = node.child_by_field_name("arguments")?;
    string_literal(&args.named_child(0)?, source)
}

fn string_literal(node: &Node, source: &[u8]) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let value = unquote(node_text(node, source)?);
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(all(test, feature = "javascript"))]
mod tests {
    use super::super::test_support::{run, set};
    use super::*;
    use crate::types::HtmlOptions;

    fn extract(ex: &JavaScriptExtractor, path: &str, src: &str, files: &[&str]) -> BTreeSet<String> {
        run(ex, path, src, files, HtmlOptions::default()).unwrap()
    }

    #[test]
    fn test_side_effect_import_with_inference() {
        let js = JavaScriptExtractor::javascript();
        assert_eq!(extract(&js, "src/a.js", "import './b';\n", &["src/a.js", "src/b.js"]), set(&["src/b.js"]));
        assert_eq!(extract(&js, "src/a.js", "import './b';\n", &["src/a.js", "src/b.ts"]), set(&["src/b.ts"]));
    }

    #[test]
    fn test_all_import_forms() {
        let src = r#"
import def from "./one";
import { x } from './two.js';
export * from "./three";
export { y } from "./four";
const five = require("./five");
async function load() { return import("./six"); }
const pkg = require("react");
const dynamic = require(name);
"#;
        let files = &[
            "src/main.js",
            "src/one.js",
            "src/two.js",
            "src/three.jsx",
            "src/four/index.js",
            "src/five.json",
            "src/six.js",
        ];
        let got = extract(&JavaScriptExtractor::javascript(), "src/main.js", src, files);
        assert_eq!(
            got,
            set(&["src/one.js", "src/two.js", "src/three.jsx", "src/four/index.js", "src/five.json", "src/six.js"])
        );
    }

    #[test]
    fn test_typescript_sources() {
        let src = "import type { T } from './types';\nimport { h } from './helper.js';\nimport fs = require('./legacy');\n";
        let files = &["src/app.ts", "src/types.ts", "src/helper.ts", "src/legacy.ts"];
        let got = extract(&JavaScriptExtractor::typescript(), "src/app.ts", src, files);
        assert_eq!(got, set(&["src/types.ts", "src/helper.ts", "src/legacy.ts"]));
    }

    #[test]
    fn test_tsx_component() {
        let src = "import Button from './Button';\nexport const App = () => <Button label=\"x\" />;\n";
        let files = &["src/App.tsx", "src/Button.tsx"];
        let got = extract(&JavaScriptExtractor::tsx(), "src/App.tsx", src, files);
        assert_eq!(got, set(&["src/Button.tsx"]));
    }

    #[test]
    fn test_tolerates_syntax_errors() {
        let src = "import './b';\nconst = ;\n";
        let got = extract(&JavaScriptExtractor::javascript(), "src/a.js", src, &["src/a.js", "src/b.js"]);
        assert_eq!(got, set(&["src/b.js"]));
    }
}
