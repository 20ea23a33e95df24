use std::collections::{BTreeSet, HashMap};
use tree_sitter::Node;

use super::{node_text, parse_failure, unquote, Backend, ExtractContext, ImportExtractor};
use crate::error::Result;
use crate::resolve::{is_external_reference, ResolutionMode};
use crate::types::HtmlOptions;

/// Scripts, stylesheets and (optionally) media and local page links.
pub struct HtmlExtractor;

impl ImportExtractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn available(&self) -> bool {
        Backend::Html.available()
    }

    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<BTreeSet<String>> {
        let tree = Backend::Html
            .parse(ctx.content)
            .ok_or_else(|| parse_failure(ctx.path, "parser returned no tree"))?;

        let mut refs = Vec::new();
        walk_node(&tree.root_node(), ctx.content.as_bytes(), ctx.html, &mut refs);

        let dir = ctx.dir();
        let mut deps = BTreeSet::new();
        for value in refs {
            deps.extend(ctx.resolver.resolve(&value, ResolutionMode::RelativeHtml, dir, ctx.files));
        }
        deps.remove(ctx.path);
        Ok(deps)
    }
}

fn walk_node(node: &Node, source: &[u8], options: HtmlOptions, out: &mut Vec<String>) {
    if matches!(node.kind(), "start_tag" | "self_closing_tag") {
        if let Some(value) = resource_reference(node, source, options) {
            out.push(value);
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_node(&child, source, options, out);
    }
}

/// The attribute value this tag pulls in, if the tag is one we follow.
fn resource_reference(tag: &Node, source: &[u8], options: HtmlOptions) -> Option<String> {
    let mut name = None;
    let mut attrs: HashMap<String, String> = HashMap::new();
    let mut cursor = tag.walk();
    for child in tag.named_children(&mut cursor) {
        match child.kind() {
            "tag_name" => name = node_text(&child, source).map(|t| t.to_ascii_lowercase()),
            "attribute" => {
                if let Some((key, value)) = attribute(&child, source) {
                    attrs.entry(key).or_insert(value);
                }
            }
            _ => {}
        }
    }

    let value = match name?.as_str() {
        "script" => attrs.get("src")?,
        "link" => {
            let rel = attrs.get("rel")?;
            if !rel.split_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")) {
                return None;
            }
            attrs.get("href")?
        }
        "img" | "source" | "video" | "audio" if options.follow_media => attrs.get("src")?,
        "a" if options.follow_anchors => {
            let href = attrs.get("href")?;
            if href.starts_with('#') {
                return None;
            }
            href
        }
        _ => return None,
    };

    let value = value.trim();
    if value.is_empty() || is_external_reference(value) {
        return None;
    }
    Some(value.to_string())
}

fn attribute(node: &Node, source: &[u8]) -> Option<(String, String)> {
    let mut key = None;
    let mut value = String::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "attribute_name" => key = node_text(&child, source).map(|t| t.to_ascii_lowercase()),
            "attribute_value" => value = node_text(&child, source)?.to_string(),
            "quoted_attribute_value" => value = unquote(node_text(&child, source)?).to_string(),
            _ => {}
        }
    }
    Some((key?, value))
}

#[cfg(all(test, feature = "html"))]
mod tests {
    use super::super::test_support::{run, set};
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <link rel="stylesheet" href="css/site.css?v=2">
  <link rel="icon" href="favicon.png">
  <script src="js/app.js"></script>
  <script src="https://cdn.example.com/lib.js"></script>
  <script src="//cdn.example.com/other.js"></script>
</head>
<body>
  <img src="img/logo.png" />
  <img src="data:image/png;base64,AAAA">
  <a href="about.html">About</a>
  <a href="#top">Top</a>
  <a href="https://example.com/">Out</a>
</body>
</html>
"##;

    const FILES: &[&str] = &["index.html", "css/site.css", "favicon.png", "js/app.js", "img/logo.png", "about.html"];

    #[test]
    fn test_default_follows_scripts_and_stylesheets() {
        let got = run(&HtmlExtractor, "index.html", PAGE, FILES, HtmlOptions::default()).unwrap();
        assert_eq!(got, set(&["css/site.css", "js/app.js"]));
    }

    #[test]
    fn test_media_and_anchors_opt_in() {
        let options = HtmlOptions { follow_media: true, follow_anchors: true };
        let got = run(&HtmlExtractor, "index.html", PAGE, FILES, options).unwrap();
        assert_eq!(got, set(&["css/site.css", "js/app.js", "img/logo.png", "about.html"]));
    }

    #[test]
    fn test_unquoted_and_nested_directory() {
        let src = "<script src=main></script><link href='../shared/base.css' rel='Stylesheet'>";
        let files = &["web/page.html", "web/main.js", "shared/base.css"];
        let got = run(&HtmlExtractor, "web/page.html", src, files, HtmlOptions::default()).unwrap();
        assert_eq!(got, set(&["web/main.js", "shared/base.css"]));
    }
}
