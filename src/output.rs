//! CLI output formatting for the `check` and `build` commands.
//!
//! # Output Format
//!
//! ## Check
//!
//! The parsed content tree, one node per line, indented by depth. Each line
//! shows the entry name, its kind, and the page title when one is set:
//!
//! ```text
//! about.md [page] "About"
//! blog/ [blog]
//!     post.1700000000000.hello.md [blog.post] "Hello"
//! docs/ [dir]
//!     page.setup.md [page]
//!
//! 4 pages, 2 directories
//! ```
//!
//! ## Build
//!
//! ```text
//! Wrote
//!     about.html
//!     blog/2023/11/14/hello.html
//!     docs/setup.html
//! Skipped
//!     drafts
//!
//! Built 3 pages into _build (3 files)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::project::BuildReport;
use crate::tree::Node;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `/`-joined display form of a relative path.
fn display_rel(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn node_line(node: &Node, depth: usize) -> String {
    let slash = if node.is_dir() { "/" } else { "" };
    let mut line = format!("{}{}{} [{}]", indent(depth), node.name(), slash, node.kind());
    let title_in = |namespace: &str| {
        node.get_attrs(namespace)
            .and_then(|attrs| attrs.get("title").and_then(|t| t.as_str()).map(String::from))
            .filter(|t| !t.is_empty())
    };
    let title = title_in("page").or_else(|| title_in("post"));
    if let Some(title) = title {
        line.push_str(&format!(" \"{title}\""));
    }
    line
}

fn walk_lines(node: &Node, depth: usize, lines: &mut Vec<String>) {
    for child in node.children() {
        lines.push(node_line(child, depth));
        walk_lines(child, depth + 1, lines);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the content tree produced by the parse pass.
pub fn format_tree(root: &Node) -> Vec<String> {
    let mut lines = Vec::new();
    walk_lines(root, 0, &mut lines);

    let (dirs, pages) = root
        .walk()
        .filter(|n| !n.is_root())
        .fold((0, 0), |(d, p), n| if n.is_dir() { (d + 1, p) } else { (d, p + 1) });
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{} {}, {} {}",
        pages,
        plural(pages, "page", "pages"),
        dirs,
        plural(dirs, "directory", "directories")
    ));
    lines
}

pub fn print_tree(root: &Node) {
    for line in format_tree(root) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Every file under `dir`, relative to it, sorted. Empty if `dir` is missing.
pub fn list_build_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect()
}

/// Format a build report. `files` is the full listing of the build directory.
pub fn format_build_output(report: &BuildReport, files: &[PathBuf]) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.written.is_empty() {
        lines.push("Wrote".to_string());
        let mut written: Vec<String> = report.written.iter().map(|p| display_rel(p)).collect();
        written.sort();
        for path in written {
            lines.push(format!("{}{}", indent(1), path));
        }
    }
    if !report.skipped.is_empty() {
        lines.push("Skipped".to_string());
        for path in &report.skipped {
            lines.push(format!("{}{}", indent(1), path));
        }
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }

    let dir = report
        .build_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| report.build_dir.display().to_string());
    lines.push(format!(
        "Built {} {} into {} ({} {})",
        report.written.len(),
        plural(report.written.len(), "page", "pages"),
        dir,
        files.len(),
        plural(files.len(), "file", "files")
    ));
    lines
}

pub fn print_build_output(report: &BuildReport) {
    let files = list_build_files(&report.build_dir);
    for line in format_build_output(report, &files) {
        println!("{}", line);
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 { one } else { many }
}
