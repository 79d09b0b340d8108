//! The in-memory content tree produced by the parse pass.
//!
//! Every filesystem entry a parser claims becomes a [`Node`]. Nodes are one
//! concrete type tagged with an open [`NodeKind`], so extensions add new
//! variants by declaring a constant rather than a new type:
//!
//! ```text
//! site ""                         (synthetic root, always present)
//! ├── page "index.md"
//! ├── dir  "docs"
//! │   └── page "docs/page.setup.md"
//! └── blog "blog"                 (kind declared by the blog extension)
//!     └── blog.post "blog/post.1700000000000.hello.md"
//! ```
//!
//! Renderer dispatch keys on the kind; parser dispatch never sees it.

use crate::attributes::{AttributeError, AttributeMap, NodeAttributes};
use crate::naming::PageNameParts;
use serde::Serialize;
use std::fmt;

/// Extensible tag identifying which variant a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKind(&'static str);

impl NodeKind {
    /// The synthetic tree root.
    pub const SITE: NodeKind = NodeKind::new("site");
    /// A plain content directory.
    pub const DIR: NodeKind = NodeKind::new("dir");
    /// A plain content page.
    pub const PAGE: NodeKind = NodeKind::new("page");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One entry of the content tree.
#[derive(Debug, Clone)]
pub struct Node {
    path: String,
    is_dir: bool,
    kind: NodeKind,
    parts: Option<PageNameParts>,
    children: Vec<Node>,
    attributes: NodeAttributes,
}

impl Node {
    /// The synthetic root: an empty-path directory of kind [`NodeKind::SITE`].
    pub fn site() -> Self {
        Self::dir("", NodeKind::SITE)
    }

    pub fn dir(path: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            kind,
            parts: None,
            children: Vec::new(),
            attributes: NodeAttributes::new(),
        }
    }

    pub fn leaf(path: impl Into<String>, kind: NodeKind, parts: Option<PageNameParts>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            kind,
            parts,
            children: Vec::new(),
            attributes: NodeAttributes::new(),
        }
    }

    /// Path relative to the content root, `/`-separated.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn parts(&self) -> Option<&PageNameParts> {
        self.parts.as_ref()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn append_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn attributes(&self) -> &NodeAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut NodeAttributes {
        &mut self.attributes
    }

    /// Shorthand for `attributes_mut().add(namespace, value)`.
    pub fn add_attrs<T: Serialize + ?Sized>(
        &mut self,
        namespace: &str,
        value: &T,
    ) -> Result<(), AttributeError> {
        self.attributes.add(namespace, value)
    }

    /// Shorthand for `attributes().get(namespace)`.
    pub fn get_attrs(&self, namespace: &str) -> Option<AttributeMap> {
        self.attributes.get(namespace)
    }

    /// Find a descendant (or self) by path.
    pub fn find(&self, path: &str) -> Option<&Node> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// Depth-first pre-order iteration over this node and its descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`Node::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
