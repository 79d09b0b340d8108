//! # pagetree
//!
//! A static site generator built around a pluggable content tree. Your
//! filesystem is the data source: directories become tree branches, files
//! become pages, and file names carry their own classification
//! (`kind[.extra...].slug.ext`).
//!
//! # Architecture: Two Passes Over One Tree
//!
//! ```text
//! 1. Parse   site/   →  Node tree     (ordered EntryParsers, first match wins)
//! 2. Render  tree    →  _build/       (ordered EntryRenderers, open/close per node)
//! ```
//!
//! Both passes dispatch to ordered lists of small capability objects instead
//! of hard-coding content types. The core ships a catch-all parser and
//! renderer for plain directories and pages; everything else (the blog
//! extension included) registers ahead of them and claims the entries it
//! understands. Parsers describe nodes with namespaced [`attributes`];
//! renderers turn those attributes into template properties.
//!
//! Every leaf that a renderer opens a file for goes through the content
//! [`pipeline`]: front matter, Tera templates, Markdown, then an optional
//! chain of theme templates.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | `kind.extra.slug.ext` file name convention parser |
//! | [`attributes`] | Namespaced, multi-payload node attributes merged on read |
//! | [`tree`] | The content tree: `Node`, open `NodeKind` tags |
//! | [`frontmatter`] | YAML / TOML front matter splitting and decoding |
//! | [`source`] | Per-run cache of site file contents |
//! | [`parser`] | Parse pass: `EntryParser`, `TreeBuilder`, `DefaultParser` |
//! | [`context`] | Render cursor: directory stack, open file stack |
//! | [`render`] | Render pass: `EntryRenderer`, `TreeRenderer`, `DefaultRenderer` |
//! | [`template`] | `Evaluator` trait and the Tera-backed implementation |
//! | [`markdown`] | Markdown → HTML |
//! | [`pipeline`] | Per-page content pipeline and theme chain |
//! | [`extensions`] | Extension protocol and the built-in blog extension |
//! | [`config`] | Project file discovery, parsing and validation |
//! | [`project`] | Registry assembly and the transactional build swap |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Open Node Kinds
//!
//! A node is one concrete struct tagged with a [`tree::NodeKind`]. Extensions
//! declare new kinds as constants and keep their data in attributes, so the
//! core never has to know about them and renderers dispatch on a plain tag
//! rather than on type inspection.
//!
//! ## Stack-Based Output Paths
//!
//! Renderers never compute absolute output paths. Directory renderers push a
//! name, leaf renderers create a file relative to the joined stack. The tree
//! renderer verifies that every `open` is balanced by its `close`, so one
//! misbehaving renderer fails the build instead of silently misplacing every
//! page after it.
//!
//! ## Whole-Directory Builds
//!
//! The build directory is replaced as a unit. The previous build is moved
//! aside first and restored if anything fails; the failed output is kept next
//! to it for inspection. See [`project`].

pub mod attributes;
pub mod config;
pub mod context;
pub mod extensions;
pub mod frontmatter;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod project;
pub mod render;
pub mod source;
pub mod template;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::ProjectConfig;
pub use project::{BuildError, BuildReport, Project, Registry};
