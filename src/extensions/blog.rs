//! The blog extension: dated posts under a content subdirectory.
//!
//! ```text
//! site/blog/                               → blog            (output root)
//! site/blog/2024/                          → blog.collection (no output dir)
//! site/blog/2024/post.1700000000000.hi.md  → blog.post
//!                                           → _build/blog/2023/11/14/hi.html
//! ```
//!
//! The first `extra` segment of a post's file name is its creation time in
//! Unix milliseconds. Posts without one are dated at the epoch. The output
//! path is derived from that date (UTC), never from the build time, so
//! rebuilding a site does not move its posts.
//!
//! Collections group sources only; every post lands under the date tree of
//! the blog output root regardless of which collection holds it.

use crate::context::RenderContext;
use crate::extensions::{Extension, ExtensionError, ExtensionSettings, decode_settings};
use crate::naming::{PageNameParts, parse_entry_name};
use crate::parser::{EntryInfo, EntryParser, ParseContext, ParseError};
use crate::project::Registry;
use crate::render::{EntryRenderer, RenderError, page_slug, url_in_work_dir};
use crate::template::Props;
use crate::tree::{Node, NodeKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const BLOG_ROOT: NodeKind = NodeKind::new("blog");
pub const BLOG_COLLECTION: NodeKind = NodeKind::new("blog.collection");
pub const BLOG_POST: NodeKind = NodeKind::new("blog.post");

/// Attribute namespace holding post metadata.
pub const POST_NAMESPACE: &str = "post";

/// `uses` settings for the blog extension.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlogConfig {
    /// Content subdirectory holding the blog, relative to the site root.
    pub path: String,
    /// Output subdirectory, relative to the build root. Defaults to `path`.
    pub output: Option<String>,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            path: "blog".to_string(),
            output: None,
        }
    }
}

impl BlogConfig {
    pub fn output_dir(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.path)
    }

    pub fn validate(&self) -> Result<(), ExtensionError> {
        for (key, value) in [("path", self.path.as_str()), ("output", self.output_dir())] {
            if value.is_empty()
                || value.starts_with('/')
                || value.ends_with('/')
                || value.split('/').any(|s| s.is_empty() || s == "." || s == "..")
            {
                return Err(ExtensionError::Invalid {
                    extension: BlogExtension::NAME.to_string(),
                    message: format!("{key} must be a plain relative path, got '{value}'"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BlogExtension;

impl BlogExtension {
    pub const NAME: &'static str = "blog";
}

impl Extension for BlogExtension {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn register(
        &self,
        registry: &mut Registry,
        settings: &ExtensionSettings,
    ) -> Result<(), ExtensionError> {
        let config: BlogConfig = decode_settings(Self::NAME, settings)?;
        config.validate()?;
        registry.add_parser(Arc::new(BlogEntryParser::new(&config.path)));
        registry.add_renderer(Arc::new(BlogRenderer::new(config.output_dir())));
        Ok(())
    }
}

/// `post:` block of a post's front matter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PostFrontMatter {
    post: PostMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PostMeta {
    title: Option<String>,
    tags: Vec<String>,
}

/// Payload stored under [`POST_NAMESPACE`].
#[derive(Debug, Clone, Serialize)]
struct PostAttributes {
    title: Option<String>,
    tags: Vec<String>,
    created_at: String,
    slug: String,
}

/// Is `path` equal to `root` or somewhere below it?
fn is_within(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn created_at(path: &str, parts: &PageNameParts) -> Result<DateTime<Utc>, ParseError> {
    let invalid = |value: &str| ParseError::InvalidTimestamp {
        path: path.to_string(),
        value: value.to_string(),
    };
    let millis = match parts.extra.first() {
        Some(raw) => raw.parse::<i64>().map_err(|_| invalid(raw))?,
        None => 0,
    };
    DateTime::from_timestamp_millis(millis).ok_or_else(|| invalid(&millis.to_string()))
}

pub struct BlogEntryParser {
    root: String,
}

impl BlogEntryParser {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl EntryParser for BlogEntryParser {
    fn name(&self) -> &str {
        "blog"
    }

    fn test(&self, path: &str, entry: &EntryInfo) -> Result<bool, ParseError> {
        if !is_within(path, &self.root) {
            return Ok(false);
        }
        if entry.is_dir {
            return Ok(true);
        }
        Ok(parse_entry_name(&entry.name).is_some_and(|parts| parts.kind == "post"))
    }

    fn parse(
        &self,
        path: &str,
        entry: &EntryInfo,
        ctx: &mut ParseContext,
    ) -> Result<Option<Node>, ParseError> {
        if entry.is_dir {
            let kind = if path == self.root {
                BLOG_ROOT
            } else {
                BLOG_COLLECTION
            };
            return Ok(Some(Node::dir(path, kind)));
        }

        let parts = parse_entry_name(&entry.name).ok_or_else(|| ParseError::Parser {
            parser: self.name().to_string(),
            path: path.to_string(),
            message: "post name does not follow post.<millis>.slug.ext".into(),
        })?;
        let created = created_at(path, &parts)?;
        let front: PostFrontMatter = ctx.front_matter(path)?;

        let attrs = PostAttributes {
            title: front.post.title,
            tags: front.post.tags,
            created_at: created.to_rfc3339(),
            slug: parts.slug.clone(),
        };
        let mut node = Node::leaf(path, BLOG_POST, Some(parts));
        node.add_attrs(POST_NAMESPACE, &attrs)
            .map_err(|source| ParseError::Attribute {
                path: path.to_string(),
                source,
            })?;
        Ok(Some(node))
    }
}

pub struct BlogRenderer {
    output: String,
}

impl BlogRenderer {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }

    fn created_at(&self, node: &Node) -> Result<DateTime<Utc>, RenderError> {
        let missing = |message: String| RenderError::Renderer {
            renderer: self.name().to_string(),
            path: node.path().to_string(),
            message,
        };
        let post = node
            .get_attrs(POST_NAMESPACE)
            .ok_or_else(|| missing("post has no post attributes".into()))?;
        let raw = post
            .get("created_at")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing("post attributes lack created_at".into()))?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| missing(format!("bad created_at '{raw}': {e}")))
    }

    /// `YYYY/MM/DD/slug.html`, relative to the blog output root.
    fn post_file(&self, node: &Node) -> Result<(String, String), RenderError> {
        let date_dir = self.created_at(node)?.format("%Y/%m/%d").to_string();
        let file = format!("{date_dir}/{}.html", page_slug(node));
        Ok((date_dir, file))
    }
}

impl EntryRenderer for BlogRenderer {
    fn name(&self) -> &str {
        "blog"
    }

    fn test(&self, node: &Node) -> Result<bool, RenderError> {
        Ok([BLOG_ROOT, BLOG_COLLECTION, BLOG_POST].contains(&node.kind()))
    }

    fn props(&self, node: &Node, ctx: &RenderContext) -> Result<Props, RenderError> {
        if node.kind() != BLOG_POST {
            return Ok(Props::new());
        }
        let date = self.created_at(node)?.format("%Y-%m-%d").to_string();
        let (_, file) = self.post_file(node)?;
        let url = url_in_work_dir(ctx, &file);
        match json!({ "post": { "date": date, "url": url } }) {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(Props::new()),
        }
    }

    fn open(&self, node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
        match node.kind() {
            BLOG_ROOT => ctx.push_root_dir(&self.output)?,
            BLOG_POST => {
                let (date_dir, file) = self.post_file(node)?;
                ctx.mkdir_all(&date_dir)?;
                ctx.create_file(&file)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&self, node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
        match node.kind() {
            BLOG_ROOT => {
                ctx.pop_dir()?;
            }
            BLOG_POST => {
                ctx.close_file()?;
            }
            _ => {}
        }
        Ok(())
    }
}
