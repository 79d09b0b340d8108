//! The render pass: content tree → build directory.
//!
//! The [`TreeRenderer`] walks the tree depth-first. For every node it picks the
//! first [`EntryRenderer`] whose `test` accepts the node, then drives it through
//! an open/close pair around the node's children:
//!
//! ```text
//! render(node):
//!     r = first renderer where r.test(node)     (none → skip node and subtree)
//!     r.open(node, ctx)                         push ≤ 1 dir or file
//!     for child in children: render(child)
//!     if leaf and open pushed a file:
//!         props = node attributes ⊕ r.props(node, ctx)
//!         write pipeline(source, props) to the open file
//!     r.close(node, ctx)                        pop what open pushed
//! ```
//!
//! ## Stack discipline
//!
//! Renderers only ever see relative paths. The context's directory and file
//! stacks are the single source of truth for where output goes, so an
//! unbalanced renderer would silently misplace every later node. The tree
//! renderer compares [`StackDepth`] snapshots around each hook and fails the
//! pass with [`RenderError::StackDiscipline`] on any violation.
//!
//! ## Props
//!
//! Template properties start from the node's merged attributes (one key per
//! namespace). The renderer's own props are deep-merged on top, so a renderer
//! can add computed values (URLs, formatted dates) next to parsed metadata and
//! wins on conflicting keys.

use crate::attributes::{AttributeError, merge_into};
use crate::context::{RenderContext, StackDepth};
use crate::pipeline::{Pipeline, PipelineError};
use crate::template::Props;
use crate::tree::{Node, NodeKind};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} stack underflow")]
    StackUnderflow(&'static str),
    #[error("renderer '{renderer}' broke stack discipline on '{path}': {message}")]
    StackDiscipline {
        renderer: String,
        path: String,
        message: String,
    },
    #[error("pipeline failed for {path}: {source}")]
    Pipeline {
        path: String,
        #[source]
        source: PipelineError,
    },
    #[error("renderer '{renderer}' failed on '{path}': {message}")]
    Renderer {
        renderer: String,
        path: String,
        message: String,
    },
    #[error("two nodes write the same output file {}", .0.display())]
    OutputCollision(PathBuf),
    #[error("attribute error on {path}: {source}")]
    Attribute {
        path: String,
        #[source]
        source: AttributeError,
    },
}

/// Emits output for the nodes it claims during the render pass.
pub trait EntryRenderer {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Does this renderer handle `node`? An error aborts the pass.
    fn test(&self, node: &Node) -> Result<bool, RenderError>;

    /// Renderer-specific template properties, merged over the node's attributes.
    ///
    /// Called after `open`, so the context's work dir is the node's output dir.
    fn props(&self, node: &Node, ctx: &RenderContext) -> Result<Props, RenderError>;

    fn open(&self, node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError>;

    fn close(&self, node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError>;
}

/// What one render pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Build-relative paths of every file written, in close order.
    pub written: Vec<PathBuf>,
    /// Paths of nodes no renderer claimed.
    pub skipped: Vec<String>,
}

pub struct TreeRenderer<'a> {
    renderers: &'a [Arc<dyn EntryRenderer>],
    pipeline: &'a Pipeline,
}

impl<'a> TreeRenderer<'a> {
    pub fn new(renderers: &'a [Arc<dyn EntryRenderer>], pipeline: &'a Pipeline) -> Self {
        Self {
            renderers,
            pipeline,
        }
    }

    pub fn render(&self, root: &Node, ctx: &mut RenderContext) -> Result<RenderReport, RenderError> {
        let mut skipped = Vec::new();
        self.render_node(root, ctx, &mut skipped)?;
        Ok(RenderReport {
            written: ctx.written().to_vec(),
            skipped,
        })
    }

    fn render_node(
        &self,
        node: &Node,
        ctx: &mut RenderContext,
        skipped: &mut Vec<String>,
    ) -> Result<(), RenderError> {
        let Some(renderer) = self.dispatch(node)? else {
            trace!("no renderer for {} '{}', skipping", node.kind(), node.path());
            skipped.push(node.path().to_string());
            return Ok(());
        };
        let discipline = |message: String| RenderError::StackDiscipline {
            renderer: renderer.name().to_string(),
            path: node.path().to_string(),
            message,
        };

        let before = ctx.depth();
        debug!("open {} '{}' via '{}'", node.kind(), node.path(), renderer.name());
        renderer.open(node, ctx)?;
        let opened = ctx.depth();
        check_open(before, opened).map_err(discipline)?;

        for child in node.children() {
            self.render_node(child, ctx, skipped)?;
        }
        if ctx.depth() != opened {
            return Err(discipline(format!(
                "children left stacks at {:?}, expected {:?}",
                ctx.depth(),
                opened
            )));
        }

        if !node.is_dir() && opened.files > before.files {
            self.write_content(node, renderer.as_ref(), ctx)?;
        }

        renderer.close(node, ctx)?;
        if ctx.depth() != before {
            return Err(discipline(format!(
                "close left stacks at {:?}, expected {:?}",
                ctx.depth(),
                before
            )));
        }
        Ok(())
    }

    fn dispatch(&self, node: &Node) -> Result<Option<&Arc<dyn EntryRenderer>>, RenderError> {
        for renderer in self.renderers {
            if renderer.test(node)? {
                return Ok(Some(renderer));
            }
        }
        Ok(None)
    }

    fn write_content(
        &self,
        node: &Node,
        renderer: &dyn EntryRenderer,
        ctx: &mut RenderContext,
    ) -> Result<(), RenderError> {
        let source = ctx.source(node)?;
        let mut props = node.attributes().to_props();
        merge_into(&mut props, renderer.props(node, ctx)?);

        let html = self
            .pipeline
            .render(&source, node.path(), &props)
            .map_err(|source| RenderError::Pipeline {
                path: node.path().to_string(),
                source,
            })?;

        let build = ctx.roots().build.clone();
        let file = ctx
            .current_file()
            .ok_or(RenderError::StackUnderflow("file"))?;
        file.write_all(&html).map_err(|source| RenderError::Io {
            path: build.join(file.path()),
            source,
        })
    }
}

/// `open` may push one directory or one file, never more, never pop.
fn check_open(before: StackDepth, after: StackDepth) -> Result<(), String> {
    if after.dirs < before.dirs || after.files < before.files {
        return Err(format!("open popped stacks from {before:?} to {after:?}"));
    }
    let pushed = (after.dirs - before.dirs) + (after.files - before.files);
    if pushed > 1 {
        return Err(format!("open pushed {pushed} entries, at most 1 allowed"));
    }
    Ok(())
}

/// Output slug of a page node: the parsed slug, or the name minus extension.
pub fn page_slug(node: &Node) -> String {
    match node.parts() {
        Some(parts) => parts.slug.clone(),
        None => node
            .name()
            .rsplit_once('.')
            .map_or(node.name(), |(stem, _)| stem)
            .to_string(),
    }
}

/// Site-absolute URL of `file` in the context's current work dir.
pub fn url_in_work_dir(ctx: &RenderContext, file: &str) -> String {
    let dir = ctx.work_dir_url();
    if dir.is_empty() {
        format!("/{file}")
    } else {
        format!("/{dir}/{file}")
    }
}

/// Renders the built-in kinds: the site root, plain directories and pages.
///
/// Must be registered last; extension renderers take precedence.
#[derive(Debug, Default)]
pub struct DefaultRenderer;

impl EntryRenderer for DefaultRenderer {
    fn name(&self) -> &str {
        "default"
    }

    fn test(&self, node: &Node) -> Result<bool, RenderError> {
        Ok([NodeKind::SITE, NodeKind::DIR, NodeKind::PAGE].contains(&node.kind()))
    }

    fn props(&self, node: &Node, ctx: &RenderContext) -> Result<Props, RenderError> {
        if node.kind() != NodeKind::PAGE {
            return Ok(Props::new());
        }
        let slug = page_slug(node);
        let url = url_in_work_dir(ctx, &format!("{slug}.html"));
        match json!({ "page": { "slug": slug, "url": url } }) {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(Props::new()),
        }
    }

    fn open(&self, node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
        match node.kind() {
            NodeKind::DIR => {
                ctx.mkdir_all(node.name())?;
                ctx.push_dir(node.name());
            }
            NodeKind::PAGE => {
                ctx.create_file(format!("{}.html", page_slug(node)))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&self, node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
        match node.kind() {
            NodeKind::DIR => {
                ctx.pop_dir()?;
            }
            NodeKind::PAGE => {
                ctx.close_file()?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Roots;
    use crate::naming::parse_entry_name;
    use crate::source::SourceCache;
    use crate::test_helpers::write_tree;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn setup(tmp: &TempDir) -> (Roots, Pipeline) {
        let roots = Roots {
            site: tmp.path().join("site"),
            theme: tmp.path().join("theme"),
            build: tmp.path().join("build"),
        };
        fs::create_dir_all(&roots.site).unwrap();
        fs::create_dir_all(&roots.build).unwrap();
        let pipeline = Pipeline::for_roots(&roots);
        (roots, pipeline)
    }

    fn context(roots: &Roots) -> RenderContext {
        RenderContext::new(roots.clone(), SourceCache::new(&roots.site))
    }

    fn page(path: &str) -> Node {
        let name = path.rsplit('/').next().unwrap();
        Node::leaf(path, NodeKind::PAGE, parse_entry_name(name))
    }

    fn default_renderers() -> Vec<Arc<dyn EntryRenderer>> {
        vec![Arc::new(DefaultRenderer)]
    }

    /// Records every node it opens; claims nodes of one kind.
    struct Recorder {
        name: &'static str,
        kind: NodeKind,
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(name: &'static str, kind: NodeKind) -> Self {
            Self {
                name,
                kind,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl EntryRenderer for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn test(&self, node: &Node) -> Result<bool, RenderError> {
            Ok(node.kind() == self.kind)
        }
        fn props(&self, _node: &Node, _ctx: &RenderContext) -> Result<Props, RenderError> {
            Ok(Props::new())
        }
        fn open(&self, node: &Node, _ctx: &mut RenderContext) -> Result<(), RenderError> {
            self.seen.lock().unwrap().push(node.path().to_string());
            Ok(())
        }
        fn close(&self, _node: &Node, _ctx: &mut RenderContext) -> Result<(), RenderError> {
            Ok(())
        }
    }

    /// Pushes a directory on open and never pops it.
    struct Leaky;

    impl EntryRenderer for Leaky {
        fn name(&self) -> &str {
            "leaky"
        }
        fn test(&self, node: &Node) -> Result<bool, RenderError> {
            Ok(node.kind() == NodeKind::DIR)
        }
        fn props(&self, _node: &Node, _ctx: &RenderContext) -> Result<Props, RenderError> {
            Ok(Props::new())
        }
        fn open(&self, node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
            ctx.push_dir(node.name());
            Ok(())
        }
        fn close(&self, _node: &Node, _ctx: &mut RenderContext) -> Result<(), RenderError> {
            Ok(())
        }
    }

    /// Pushes two directories on open.
    struct Greedy;

    impl EntryRenderer for Greedy {
        fn name(&self) -> &str {
            "greedy"
        }
        fn test(&self, node: &Node) -> Result<bool, RenderError> {
            Ok(node.kind() == NodeKind::DIR)
        }
        fn props(&self, _node: &Node, _ctx: &RenderContext) -> Result<Props, RenderError> {
            Ok(Props::new())
        }
        fn open(&self, _node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
            ctx.push_dir("a");
            ctx.push_dir("b");
            Ok(())
        }
        fn close(&self, _node: &Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
            ctx.pop_dir()?;
            ctx.pop_dir()?;
            Ok(())
        }
    }

    /// Fails every `test` call.
    struct Broken;

    impl EntryRenderer for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn test(&self, node: &Node) -> Result<bool, RenderError> {
            Err(RenderError::Renderer {
                renderer: "broken".to_string(),
                path: node.path().to_string(),
                message: "cannot decide".to_string(),
            })
        }
        fn props(&self, _node: &Node, _ctx: &RenderContext) -> Result<Props, RenderError> {
            Ok(Props::new())
        }
        fn open(&self, _node: &Node, _ctx: &mut RenderContext) -> Result<(), RenderError> {
            Ok(())
        }
        fn close(&self, _node: &Node, _ctx: &mut RenderContext) -> Result<(), RenderError> {
            Ok(())
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[test]
    fn first_matching_renderer_wins() {
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        let mut site = Node::site();
        site.append_child(Node::dir("docs", NodeKind::DIR));

        let first = Arc::new(Recorder::new("first", NodeKind::DIR));
        let second = Arc::new(Recorder::new("second", NodeKind::DIR));
        let renderers: Vec<Arc<dyn EntryRenderer>> = vec![
            first.clone(),
            second.clone(),
            Arc::new(DefaultRenderer),
        ];

        TreeRenderer::new(&renderers, &pipeline)
            .render(&site, &mut context(&roots))
            .unwrap();
        assert_eq!(*first.seen.lock().unwrap(), vec!["docs"]);
        assert!(second.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_test_aborts_pass() {
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        let renderers: Vec<Arc<dyn EntryRenderer>> =
            vec![Arc::new(Broken), Arc::new(DefaultRenderer)];
        let result =
            TreeRenderer::new(&renderers, &pipeline).render(&Node::site(), &mut context(&roots));
        assert!(matches!(
            result,
            Err(RenderError::Renderer { renderer, .. }) if renderer == "broken"
        ));
    }

    #[test]
    fn unclaimed_node_and_subtree_are_skipped() {
        const ODD: NodeKind = NodeKind::new("odd");
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        let mut odd = Node::dir("odd", ODD);
        odd.append_child(page("odd/inner.md"));
        let mut site = Node::site();
        site.append_child(odd);

        let renderers = default_renderers();
        let report = TreeRenderer::new(&renderers, &pipeline)
            .render(&site, &mut context(&roots))
            .unwrap();
        assert_eq!(report.skipped, vec!["odd"]);
        assert!(report.written.is_empty());
        assert!(!roots.build.join("odd").exists());
    }

    // =========================================================================
    // Default renderer output
    // =========================================================================

    #[test]
    fn nested_pages_land_in_nested_dirs() {
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        write_tree(
            &roots.site,
            &[("index.md", "# Home"), ("docs/page.setup.md", "# Setup")],
        );
        let mut docs = Node::dir("docs", NodeKind::DIR);
        docs.append_child(page("docs/page.setup.md"));
        let mut site = Node::site();
        site.append_child(page("index.md"));
        site.append_child(docs);

        let renderers = default_renderers();
        let mut ctx = context(&roots);
        let report = TreeRenderer::new(&renderers, &pipeline)
            .render(&site, &mut ctx)
            .unwrap();

        assert_eq!(
            report.written,
            vec![PathBuf::from("index.html"), PathBuf::from("docs/setup.html")]
        );
        assert_eq!(
            fs::read_to_string(roots.build.join("docs/setup.html"))
                .unwrap()
                .trim(),
            "<h1>Setup</h1>"
        );
        assert_eq!(ctx.depth(), StackDepth { dirs: 0, files: 0 });
    }

    #[test]
    fn page_props_include_slug_and_url() {
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        write_tree(&roots.site, &[("docs/page.setup.md", "{{ page.url }}|{{ page.slug }}")]);
        let mut docs = Node::dir("docs", NodeKind::DIR);
        docs.append_child(page("docs/page.setup.md"));
        let mut site = Node::site();
        site.append_child(docs);

        let renderers = default_renderers();
        TreeRenderer::new(&renderers, &pipeline)
            .render(&site, &mut context(&roots))
            .unwrap();
        let html = fs::read_to_string(roots.build.join("docs/setup.html")).unwrap();
        assert_eq!(html.trim(), "<p>/docs/setup.html|setup</p>");
    }

    #[test]
    fn renderer_props_override_attributes() {
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        write_tree(&roots.site, &[("a.md", "{{ page.slug }} {{ page.title }}")]);
        let mut node = page("a.md");
        node.add_attrs("page", &json!({"slug": "parsed", "title": "T"}))
            .unwrap();
        let mut site = Node::site();
        site.append_child(node);

        let renderers = default_renderers();
        TreeRenderer::new(&renderers, &pipeline)
            .render(&site, &mut context(&roots))
            .unwrap();
        let html = fs::read_to_string(roots.build.join("a.html")).unwrap();
        assert_eq!(html.trim(), "<p>a T</p>");
    }

    #[test]
    fn pipeline_failure_fails_pass() {
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        write_tree(&roots.site, &[("b.md", "{{ unclosed")]);
        let mut site = Node::site();
        site.append_child(page("b.md"));

        let renderers = default_renderers();
        let result = TreeRenderer::new(&renderers, &pipeline).render(&site, &mut context(&roots));
        assert!(matches!(result, Err(RenderError::Pipeline { path, .. }) if path == "b.md"));
    }

    #[test]
    fn page_slug_falls_back_to_stem() {
        let node = Node::leaf("notes/today.md", NodeKind::PAGE, None);
        assert_eq!(page_slug(&node), "today");
        assert_eq!(page_slug(&page("page.about.md")), "about");
    }

    // =========================================================================
    // Stack discipline
    // =========================================================================

    #[test]
    fn unbalanced_close_fails_pass() {
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        let mut site = Node::site();
        site.append_child(Node::dir("docs", NodeKind::DIR));

        let renderers: Vec<Arc<dyn EntryRenderer>> = vec![Arc::new(Leaky), Arc::new(DefaultRenderer)];
        let result = TreeRenderer::new(&renderers, &pipeline).render(&site, &mut context(&roots));
        assert!(matches!(
            result,
            Err(RenderError::StackDiscipline { renderer, .. }) if renderer == "leaky"
        ));
    }

    #[test]
    fn open_pushing_twice_fails_pass() {
        let tmp = TempDir::new().unwrap();
        let (roots, pipeline) = setup(&tmp);
        let mut site = Node::site();
        site.append_child(Node::dir("docs", NodeKind::DIR));

        let renderers: Vec<Arc<dyn EntryRenderer>> =
            vec![Arc::new(Greedy), Arc::new(DefaultRenderer)];
        let result = TreeRenderer::new(&renderers, &pipeline).render(&site, &mut context(&roots));
        assert!(matches!(
            result,
            Err(RenderError::StackDiscipline { renderer, .. }) if renderer == "greedy"
        ));
    }

    #[test]
    fn check_open_rules() {
        let d = |dirs, files| StackDepth { dirs, files };
        assert!(check_open(d(0, 0), d(0, 0)).is_ok());
        assert!(check_open(d(0, 0), d(1, 0)).is_ok());
        assert!(check_open(d(1, 0), d(1, 1)).is_ok());
        assert!(check_open(d(0, 0), d(1, 1)).is_err());
        assert!(check_open(d(2, 0), d(1, 0)).is_err());
    }
}
