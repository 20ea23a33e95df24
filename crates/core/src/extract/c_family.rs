use std::collections::BTreeSet;
use tree_sitter::Node;

use super::{node_text, parse_failure, unquote, Backend, ExtractContext, ImportExtractor};
use crate::error::Result;
use crate::resolve::ResolutionMode;

/// `#include "x.h"` and `#include <x.h>` outside function bodies.
pub struct CFamilyExtractor {
    backend: Backend,
}

impl CFamilyExtractor {
    pub fn c() -> Self {
        Self { backend: Backend::C }
    }

    pub fn cpp() -> Self {
        Self { backend: Backend::Cpp }
    }
}

impl ImportExtractor for CFamilyExtractor {
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

        let mut includes = Vec::new();
        walk_node(&tree.root_node(), ctx.content.as_bytes(), &mut includes);

        let dir = ctx.dir();
        let mut deps = BTreeSet::new();
        for include in includes {
            match search_include_path(ctx, &include, dir) {
                Some(hit) => {
                    deps.insert(hit);
                }
                None => deps.extend(ctx.resolver.resolve(&include, ResolutionMode::RelativeC, dir, ctx.files)),
            }
        }
        deps.remove(ctx.path);
        Ok(deps)
    }
}

/// Compiler-style lookup over `-I<file dir> -I<project root>`; first in-project hit wins.
fn search_include_path(ctx: &ExtractContext<'_>, include: &str, dir: &str) -> Option<String> {
    let normalizer = ctx.resolver.normalizer();
    [dir, ""]
        .iter()
        .filter_map(|base| normalizer.normalize(include, base))
        .find(|p| ctx.files.contains(p))
}

fn walk_node(node: &Node, source: &[u8], out: &mut Vec<String>) {
    match node.kind() {
        "preproc_include" => {
            if let Some(path) = node.child_by_field_name("path") {
                if matches!(path.kind(), "string_literal" | "system_lib_string") {
                    if let Some(text) = node_text(&path, source) {
                        let include = unquote(text);
                        if !include.is_empty() {
                            out.push(include.to_string());
                        }
                    }
                }
            }
            return;
        }
        "function_definition" => return,
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_node(&child, source, out);
    }
}

#[cfg(all(test, feature = "c-family"))]
mod tests {
    use super::super::test_support::{run, set};
    use super::*;
    use crate::types::HtmlOptions;

    fn extract(ex: &CFamilyExtractor, path: &str, src: &str, files: &[&str]) -> BTreeSet<String> {
        run(ex, path, src, files, HtmlOptions::default()).unwrap()
    }

    #[test]
    fn test_local_and_root_includes() {
        let src = "#include <stdio.h>\n#include \"util.h\"\n#include \"include/defs.h\"\n\nint main(void) { return 0; }\n";
        let files = &["src/main.c", "src/util.h", "include/defs.h"];
        let got = extract(&CFamilyExtractor::c(), "src/main.c", src, files);
        assert_eq!(got, set(&["src/util.h", "include/defs.h"]));
    }

    #[test]
    fn test_file_dir_wins_over_root() {
        let src = "#include \"config.h\"\n";
        let files = &["src/main.c", "src/config.h", "config.h"];
        let got = extract(&CFamilyExtractor::c(), "src/main.c", src, files);
        assert_eq!(got, set(&["src/config.h"]));
    }

    #[test]
    fn test_system_and_escaping_includes_dropped() {
        let src = "#include \"/usr/include/stdio.h\"\n#include \"../../outside.h\"\n";
        let got = extract(&CFamilyExtractor::c(), "main.c", src, &["main.c"]);
        assert!(got.is_empty());
    }

    #[test]
    fn test_conditional_includes_cpp() {
        let src = "#ifdef USE_FAST\n#include \"fast.hpp\"\n#else\n#include \"slow.hpp\"\n#endif\nclass A {};\n";
        let files = &["lib/a.cpp", "lib/fast.hpp", "lib/slow.hpp"];
        let got = extract(&CFamilyExtractor::cpp(), "lib/a.cpp", src, files);
        assert_eq!(got, set(&["lib/fast.hpp", "lib/slow.hpp"]));
    }

    #[test]
    fn test_includes_in_function_bodies_ignored() {
        let src = "#include \"a.h\"\nvoid f(void) {\n#include \"table.inc\"\n}\n";
        let files = &["x.c", "a.h", "table.inc"];
        let got = extract(&CFamilyExtractor::c(), "x.c", src, files);
        assert_eq!(got, set(&["a.h"]));
    }
}
