//! Shared test utilities for the pagetree test suite.
//!
//! Provides fixture writers, output readers, and tree lookups that panic with
//! a clear message on miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_tree(tmp.path(), &[
//!     ("site/index.md", "# Hi"),
//!     ("site/docs/page.setup.md", "# Setup"),
//! ]);
//!
//! Project::new(tmp.path(), ProjectConfig::default()).generate().unwrap();
//! let files = read_tree(&tmp.path().join("_build"));
//! assert_eq!(files["index.html"].trim(), "<h1>Hi</h1>");
//! ```

use crate::template::Props;
use crate::tree::Node;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `(relative path, contents)` pairs under `root`, creating parents.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
}

/// Every file under `root` keyed by `/`-separated relative path.
///
/// Returns an empty map if `root` does not exist.
pub fn read_tree(root: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    if root.is_dir() {
        collect_files(root, root, &mut files);
    }
    files
}

fn collect_files(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(root, &path, files);
        } else {
            let rel = path.strip_prefix(root).unwrap();
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, fs::read_to_string(&path).unwrap());
        }
    }
}

// =========================================================================
// Tree lookups
// =========================================================================

/// Paths of a node's direct children, in tree order.
pub fn child_paths(node: &Node) -> Vec<&str> {
    node.children().iter().map(Node::path).collect()
}

/// Find a node by path. Panics if not found.
pub fn find_node<'a>(root: &'a Node, path: &str) -> &'a Node {
    root.find(path).unwrap_or_else(|| {
        let paths: Vec<&str> = root.walk().map(Node::path).collect();
        panic!("node '{path}' not found. Available: {paths:?}")
    })
}

// =========================================================================
// Props
// =========================================================================

/// Build template props from a JSON object literal. Panics on non-objects.
pub fn props(value: Value) -> Props {
    match value {
        Value::Object(map) => map,
        other => panic!("props must be a JSON object, got {other}"),
    }
}
