//! Box-drawing rendering of the project's file tree.

use std::collections::BTreeMap;

#[derive(Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
}

/// `Project Structure:` followed by one line per entry, directories before files.
pub fn render_project_tree<'a>(paths: impl IntoIterator<Item = &'a str>) -> String {
    let mut root = TreeNode::default();
    let mut any = false;
    for path in paths {
        let mut node = &mut root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            node = node.children.entry(part.to_string()).or_default();
            any = true;
        }
    }
    if !any {
        return "No relevant files found in the project.".to_string();
    }

    let mut lines = vec!["Project Structure:".to_string(), String::new()];
    render_children(&root, "", &mut lines);
    lines.join("\n")
}

fn render_children(node: &TreeNode, prefix: &str, lines: &mut Vec<String>) {
    let mut entries: Vec<(&String, &TreeNode)> = node.children.iter().collect();
    // Directories first, then by name
    entries.sort_by(|a, b| {
        a.1.children
            .is_empty()
            .cmp(&b.1.children.is_empty())
            .then_with(|| a.0.cmp(b.0))
    });

    let count = entries.len();
    for (i, (name, child)) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        lines.push(format!("{prefix}{}{name}", if last { "└── " } else { "├── " }));
        if !child.children.is_empty() {
            let extension = if last { "    " } else { "│   " };
            render_children(child, &format!("{prefix}{extension}"), lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(render_project_tree(std::iter::empty()), "No relevant files found in the project.");
    }

    #[test]
    fn test_dirs_first_and_connectors() {
        let paths = ["main.py", "pkg/mod.py", "pkg/__init__.py", "app.js", "pkg/sub/x.py"];
        let out = render_project_tree(paths.iter().copied());
        let expected = "\
Project Structure:

├── pkg
│   ├── sub
│   │   └── x.py
│   ├── __init__.py
│   └── mod.py
├── app.js
└── main.py";
        assert_eq!(out, expected);
    }
}
