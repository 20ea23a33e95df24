//! Comment stripping for bundle output. Dependency analysis never sees this text.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const HASH_LINE: &str = r"#.*";
const TRIPLE_DOUBLE: &str = r#"(?s)""".*?""""#;
const TRIPLE_SINGLE: &str = r"(?s)'''.*?'''";
const SLASH_LINE: &str = r"//.*";
const BLOCK: &str = r"(?s)/\*.*?\*/";
const JSX_BLOCK: &str = r"(?s)\{/\*.*?\*/\}";
const HTML_BLOCK: &str = r"(?s)<!--.*?-->";
const SQL_LINE: &str = r"--.*";

/// Extension → comment patterns, applied in order.
fn comment_patterns() -> &'static HashMap<&'static str, Vec<Regex>> {
    static PATTERNS: OnceLock<HashMap<&'static str, Vec<Regex>>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table: &[(&[&str], &[&str])] = &[
            (&["py", "pyw"], &[HASH_LINE, TRIPLE_DOUBLE, TRIPLE_SINGLE]),
            (&["js", "ts", "mjs", "cjs", "mts", "cts"], &[SLASH_LINE, BLOCK]),
            // JSX comments first, or the inner /* */ leaves empty braces behind
            (&["jsx", "tsx"], &[JSX_BLOCK, SLASH_LINE, BLOCK]),
            (&["c", "h", "cpp", "cc", "cxx", "hpp", "hh", "hxx"], &[SLASH_LINE, BLOCK]),
            (&["html", "htm"], &[HTML_BLOCK]),
            (&["css"], &[BLOCK]),
            (&["sql"], &[SQL_LINE, BLOCK]),
        ];
        let mut map = HashMap::new();
        for (exts, patterns) in table {
            let compiled: Vec<Regex> = patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();
            for ext in exts.iter() {
                map.insert(*ext, compiled.clone());
            }
        }
        map
    })
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n\s*\n").expect("static regex"))
}

fn trailing_space() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+\n").expect("static regex"))
}

/// Strip comments for `ext` (lower-case, no dot), squeeze blank lines, trim.
///
/// Regex-based, so comment markers inside string literals are stripped too.
pub fn clean_code(content: &str, ext: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }
    let mut cleaned = content.to_string();
    if let Some(patterns) = comment_patterns().get(ext) {
        for re in patterns {
            cleaned = re.replace_all(&cleaned, "").into_owned();
        }
    }
    let cleaned = blank_runs().replace_all(&cleaned, "\n\n");
    let cleaned = trailing_space().replace_all(&cleaned, "\n");
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_comments_and_docstrings() {
        let src = "\"\"\"Module doc.\n\nMore.\"\"\"\nimport os  # os\n\n\n\ndef f():\n    '''doc'''\n    return 1\n";
        let out = clean_code(src, "py");
        assert_eq!(out, "import os\n\ndef f():\n\n    return 1");
    }

    #[test]
    fn test_c_family_comments() {
        let src = "/* header\n * block */\n#include \"a.h\" // local\nint x; \n";
        assert_eq!(clean_code(src, "c"), "#include \"a.h\"\nint x;");
    }

    #[test]
    fn test_jsx_comment_braces_removed() {
        let src = "const A = () => (\n  <div>{/* note */}hi</div>\n);\n";
        assert_eq!(clean_code(src, "tsx"), "const A = () => (\n  <div>hi</div>\n);");
    }

    #[test]
    fn test_html_and_unknown_extension() {
        assert_eq!(clean_code("<!-- c -->\n<p>x</p>", "html"), "<p>x</p>");
        assert_eq!(clean_code("  keep // this  \n", "txt"), "keep // this");
    }

    #[test]
    fn test_blank_only_input() {
        assert_eq!(clean_code(" \n\t\n", "py"), "");
    }
}
