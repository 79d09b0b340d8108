//! The parse pass: filesystem → content tree.
//!
//! The [`TreeBuilder`] walks the site root depth-first and asks an ordered
//! list of [`EntryParser`]s which of them claims each entry:
//!
//! ```text
//! for entry in read_dir(dir) (sorted by name):
//!     parser = first p in parsers where p.test(path, entry)
//!     node   = parser.parse(path, entry, ctx)
//!     parent.append(node)
//!     dir  → recurse into it with node as parent
//!     leaf → attach generic page front matter under "page"
//! ```
//!
//! ## First match, not best match
//!
//! Registration order is a priority order. Extension parsers are registered
//! before the catch-all [`DefaultParser`]; whichever claims an entry first
//! owns it, and no other parser sees it.
//!
//! ## Failure policy
//!
//! - No parser claims an entry → logged and skipped.
//! - A parser returns `Ok(None)` → the entry (and its subtree) is dropped.
//! - Any `test` or `parse` error, or an unreadable file → the whole pass fails.

use crate::attributes::AttributeError;
use crate::frontmatter::{self, FrontMatterError, PageFrontMatter};
use crate::naming::parse_entry_name;
use crate::source::SourceCache;
use crate::tree::{Node, NodeKind};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("front matter error in {path}: {source}")]
    FrontMatter {
        path: String,
        #[source]
        source: FrontMatterError,
    },
    #[error("attribute error on {path}: {source}")]
    Attribute {
        path: String,
        #[source]
        source: AttributeError,
    },
    #[error("invalid timestamp '{value}' in {path}")]
    InvalidTimestamp { path: String, value: String },
    #[error("parser '{parser}' failed on {path}: {message}")]
    Parser {
        parser: String,
        path: String,
        message: String,
    },
}

/// What a parser is told about a filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// File name of the entry (last path segment).
    pub name: String,
    pub is_dir: bool,
}

impl EntryInfo {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// A predicate + constructor pair that claims entries during the parse pass.
pub trait EntryParser {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Does this parser claim the entry at `path`?
    fn test(&self, path: &str, entry: &EntryInfo) -> Result<bool, ParseError>;

    /// Build the node for a claimed entry. `Ok(None)` drops the entry.
    fn parse(
        &self,
        path: &str,
        entry: &EntryInfo,
        ctx: &mut ParseContext,
    ) -> Result<Option<Node>, ParseError>;
}

/// State shared by all parsers during one parse pass.
pub struct ParseContext {
    sources: SourceCache,
}

impl ParseContext {
    pub fn new(site_root: impl Into<PathBuf>) -> Self {
        Self {
            sources: SourceCache::new(site_root),
        }
    }

    pub fn site_root(&self) -> &Path {
        self.sources.root()
    }

    /// Memoized bytes of a site file.
    pub fn source(&mut self, path: &str) -> Result<Arc<[u8]>, ParseError> {
        self.sources.read(path).map_err(|source| ParseError::Io {
            path: self.sources.root().join(path),
            source,
        })
    }

    /// Decode the front matter of a site file into `T`.
    pub fn front_matter<T>(&mut self, path: &str) -> Result<T, ParseError>
    where
        T: DeserializeOwned + Default,
    {
        let source = self.source(path)?;
        let (value, _) =
            frontmatter::decode(&source).map_err(|source| ParseError::FrontMatter {
                path: path.to_string(),
                source,
            })?;
        Ok(value)
    }

    /// Hand the source cache over to the render pass.
    pub fn into_sources(self) -> SourceCache {
        self.sources
    }
}

/// Walks a site root and builds the content tree.
pub struct TreeBuilder<'a> {
    parsers: &'a [Arc<dyn EntryParser>],
    ctx: ParseContext,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(site_root: impl Into<PathBuf>, parsers: &'a [Arc<dyn EntryParser>]) -> Self {
        Self {
            parsers,
            ctx: ParseContext::new(site_root),
        }
    }

    /// Run the parse pass. Returns the tree and the populated source cache.
    pub fn build(mut self) -> Result<(Node, SourceCache), ParseError> {
        let mut site = Node::site();
        self.parse_dir("", &mut site)?;
        Ok((site, self.ctx.into_sources()))
    }

    fn parse_dir(&mut self, dir: &str, parent: &mut Node) -> Result<(), ParseError> {
        for entry in list_entries(&self.ctx.site_root().join(dir))? {
            let path = join_path(dir, &entry.name);

            let Some(parser) = self.dispatch(&path, &entry)? else {
                warn!("no parser for '{}', skipping", path);
                continue;
            };

            let Some(mut node) = parser.parse(&path, &entry, &mut self.ctx)? else {
                debug!("parser '{}' dropped '{}'", parser.name(), path);
                continue;
            };
            debug!("parsed '{}' as {} via '{}'", path, node.kind(), parser.name());

            if entry.is_dir {
                self.parse_dir(&path, &mut node)?;
            } else {
                let page: PageFrontMatter = self.ctx.front_matter(&path)?;
                node.add_attrs("page", &page)
                    .map_err(|source| ParseError::Attribute {
                        path: path.clone(),
                        source,
                    })?;
            }
            parent.append_child(node);
        }
        Ok(())
    }

    fn dispatch(
        &self,
        path: &str,
        entry: &EntryInfo,
    ) -> Result<Option<Arc<dyn EntryParser>>, ParseError> {
        for parser in self.parsers {
            if parser.test(path, entry)? {
                return Ok(Some(Arc::clone(parser)));
            }
        }
        Ok(None)
    }
}

/// Entries of `dir`, sorted by file name. Hidden (dot-prefixed) entries are left out.
fn list_entries(dir: &Path) -> Result<Vec<EntryInfo>, ParseError> {
    let io_err = |source| ParseError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            debug!("skipping hidden '{}'", dir.join(&name).display());
            continue;
        }
        let is_dir = entry.file_type().map_err(io_err)?.is_dir();
        entries.push(EntryInfo { name, is_dir });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Join a `/`-separated relative directory and an entry name.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Catch-all parser: every directory, and every file with a decodable name.
///
/// Must be registered last; it claims anything convention-shaped.
#[derive(Debug, Default)]
pub struct DefaultParser;

impl EntryParser for DefaultParser {
    fn name(&self) -> &str {
        "default"
    }

    fn test(&self, _path: &str, entry: &EntryInfo) -> Result<bool, ParseError> {
        Ok(entry.is_dir || parse_entry_name(&entry.name).is_some())
    }

    fn parse(
        &self,
        path: &str,
        entry: &EntryInfo,
        _ctx: &mut ParseContext,
    ) -> Result<Option<Node>, ParseError> {
        if entry.is_dir {
            return Ok(Some(Node::dir(path, NodeKind::DIR)));
        }
        let parts = parse_entry_name(&entry.name).ok_or_else(|| ParseError::Parser {
            parser: self.name().to_string(),
            path: path.to_string(),
            message: "name does not follow the kind.slug.ext convention".into(),
        })?;
        Ok(Some(Node::leaf(path, NodeKind::PAGE, Some(parts))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{child_paths, write_tree};
    use tempfile::TempDir;

    fn default_parsers() -> Vec<Arc<dyn EntryParser>> {
        vec![Arc::new(DefaultParser)]
    }

    /// Claims everything and tags it with a fixed kind.
    struct Claimer {
        name: &'static str,
        kind: NodeKind,
    }

    impl EntryParser for Claimer {
        fn name(&self) -> &str {
            self.name
        }

        fn test(&self, _path: &str, _entry: &EntryInfo) -> Result<bool, ParseError> {
            Ok(true)
        }

        fn parse(
            &self,
            path: &str,
            entry: &EntryInfo,
            _ctx: &mut ParseContext,
        ) -> Result<Option<Node>, ParseError> {
            Ok(Some(if entry.is_dir {
                Node::dir(path, self.kind)
            } else {
                Node::leaf(path, self.kind, parse_entry_name(&entry.name))
            }))
        }
    }

    struct FailingTest;

    impl EntryParser for FailingTest {
        fn name(&self) -> &str {
            "failing"
        }

        fn test(&self, path: &str, _entry: &EntryInfo) -> Result<bool, ParseError> {
            Err(ParseError::Parser {
                parser: "failing".into(),
                path: path.into(),
                message: "misconfigured".into(),
            })
        }

        fn parse(
            &self,
            _path: &str,
            _entry: &EntryInfo,
            _ctx: &mut ParseContext,
        ) -> Result<Option<Node>, ParseError> {
            unreachable!("test always fails")
        }
    }

    /// Claims `.draft.md` files and drops them.
    struct DraftDropper;

    impl EntryParser for DraftDropper {
        fn name(&self) -> &str {
            "drafts"
        }

        fn test(&self, _path: &str, entry: &EntryInfo) -> Result<bool, ParseError> {
            Ok(entry.name.ends_with(".draft.md"))
        }

        fn parse(
            &self,
            _path: &str,
            _entry: &EntryInfo,
            _ctx: &mut ParseContext,
        ) -> Result<Option<Node>, ParseError> {
            Ok(None)
        }
    }

    #[test]
    fn builds_tree_in_listing_order() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                ("index.md", "# Home"),
                ("b.md", "b"),
                ("docs/page.setup.md", "setup"),
                ("docs/a.md", "a"),
            ],
        );

        let parsers = default_parsers();
        let (site, _) = TreeBuilder::new(tmp.path(), &parsers).build().unwrap();

        assert_eq!(site.kind(), NodeKind::SITE);
        assert_eq!(child_paths(&site), vec!["b.md", "docs", "index.md"]);
        let docs = site.find("docs").unwrap();
        assert!(docs.is_dir());
        assert_eq!(docs.kind(), NodeKind::DIR);
        assert_eq!(child_paths(docs), vec!["docs/a.md", "docs/page.setup.md"]);
        assert_eq!(
            site.find("docs/page.setup.md").unwrap().parts().unwrap().slug,
            "setup"
        );
    }

    #[test]
    fn undecodable_names_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("README", "readme"), ("index.md", "# Hi")]);

        let parsers = default_parsers();
        let (site, _) = TreeBuilder::new(tmp.path(), &parsers).build().unwrap();
        assert_eq!(child_paths(&site), vec!["index.md"]);
    }

    #[test]
    fn hidden_entries_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                (".gitkeep", ""),
                (".git/HEAD", "ref: refs/heads/main"),
                ("docs/.hidden.md", "# Secret"),
                ("index.md", "# Hi"),
            ],
        );
        fs::write(tmp.path().join(".DS_Store"), [0u8, 159, 146, 150]).unwrap();

        let parsers = default_parsers();
        let (site, sources) = TreeBuilder::new(tmp.path(), &parsers).build().unwrap();
        assert_eq!(child_paths(&site), vec!["docs", "index.md"]);
        assert!(site.find("docs").unwrap().children().is_empty());
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn first_registered_parser_wins() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("index.md", "# Hi")]);

        const FIRST: NodeKind = NodeKind::new("first");
        const SECOND: NodeKind = NodeKind::new("second");
        let parsers: Vec<Arc<dyn EntryParser>> = vec![
            Arc::new(Claimer {
                name: "first",
                kind: FIRST,
            }),
            Arc::new(Claimer {
                name: "second",
                kind: SECOND,
            }),
        ];
        let (site, _) = TreeBuilder::new(tmp.path(), &parsers).build().unwrap();
        assert_eq!(site.find("index.md").unwrap().kind(), FIRST);
    }

    #[test]
    fn leaf_gets_page_attributes() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[("about.md", "---\ntitle: About\ntemplate: base.html\n---\nbody")],
        );

        let parsers = default_parsers();
        let (site, _) = TreeBuilder::new(tmp.path(), &parsers).build().unwrap();
        let page = site.find("about.md").unwrap().get_attrs("page").unwrap();
        assert_eq!(page["title"], "About");
        assert_eq!(page["template"], "base.html");
    }

    #[test]
    fn page_attributes_follow_parser_attributes() {
        struct Tagger;
        impl EntryParser for Tagger {
            fn name(&self) -> &str {
                "tagger"
            }
            fn test(&self, _path: &str, entry: &EntryInfo) -> Result<bool, ParseError> {
                Ok(!entry.is_dir)
            }
            fn parse(
                &self,
                path: &str,
                entry: &EntryInfo,
                _ctx: &mut ParseContext,
            ) -> Result<Option<Node>, ParseError> {
                let mut node = Node::leaf(path, NodeKind::PAGE, parse_entry_name(&entry.name));
                node.add_attrs("page", &serde_json::json!({"title": "from parser", "x": 1}))
                    .unwrap();
                Ok(Some(node))
            }
        }

        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a.md", "---\ntitle: from file\n---\n")]);
        let parsers: Vec<Arc<dyn EntryParser>> = vec![Arc::new(Tagger)];
        let (site, _) = TreeBuilder::new(tmp.path(), &parsers).build().unwrap();

        let node = site.find("a.md").unwrap();
        assert_eq!(node.attributes().get_all("page").unwrap().len(), 2);
        let page = node.get_attrs("page").unwrap();
        assert_eq!(page["title"], "from file");
        assert_eq!(page["x"], 1);
    }

    #[test]
    fn dropped_entries_are_not_in_tree() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a.draft.md", "wip"), ("b.md", "b")]);

        let parsers: Vec<Arc<dyn EntryParser>> =
            vec![Arc::new(DraftDropper), Arc::new(DefaultParser)];
        let (site, _) = TreeBuilder::new(tmp.path(), &parsers).build().unwrap();
        assert_eq!(child_paths(&site), vec!["b.md"]);
    }

    #[test]
    fn test_error_aborts_pass() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("index.md", "# Hi")]);

        let parsers: Vec<Arc<dyn EntryParser>> =
            vec![Arc::new(FailingTest), Arc::new(DefaultParser)];
        let result = TreeBuilder::new(tmp.path(), &parsers).build();
        assert!(matches!(result, Err(ParseError::Parser { .. })));
    }

    #[test]
    fn bad_front_matter_aborts_pass() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a.md", "---\ntitle: [oops\n---\n")]);

        let parsers = default_parsers();
        let result = TreeBuilder::new(tmp.path(), &parsers).build();
        assert!(matches!(result, Err(ParseError::FrontMatter { path, .. }) if path == "a.md"));
    }

    #[test]
    fn missing_root_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let parsers = default_parsers();
        let result = TreeBuilder::new(tmp.path().join("nope"), &parsers).build();
        assert!(matches!(result, Err(ParseError::Io { .. })));
    }

    #[test]
    fn sources_are_cached_for_render() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a.md", "a"), ("b.md", "b")]);

        let parsers = default_parsers();
        let (_, sources) = TreeBuilder::new(tmp.path(), &parsers).build().unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn join_path_at_root_and_nested() {
        assert_eq!(join_path("", "a.md"), "a.md");
        assert_eq!(join_path("docs", "a.md"), "docs/a.md");
    }
}
