//! Mutable cursor state for one render pass.
//!
//! Renderers never compute absolute output paths. A directory renderer pushes
//! a name onto the directory stack, a leaf renderer creates a file relative to
//! the joined stack, and nested directories compose naturally:
//!
//! ```text
//! open  site             dirstack = []
//! open  dir "docs"       dirstack = [docs]            mkdir _build/docs
//! open  page "setup"     open_files = [docs/setup.html]
//! close page "setup"     open_files = []
//! close dir "docs"       dirstack = []
//! ```
//!
//! Each stack entry holds the resolved work dir, so a renderer can also anchor
//! a directory at the build root with [`RenderContext::push_root_dir`] (the
//! blog output root does this) and still pop it with a single
//! [`RenderContext::pop_dir`].
//!
//! ## Stack discipline
//!
//! A renderer's `open` may push at most one directory or create at most one
//! file, and its `close` must pop exactly that. The tree renderer checks this
//! around every node with [`StackDepth`]; popping an empty stack is an
//! immediate [`RenderError::StackUnderflow`](crate::render::RenderError).

use crate::render::RenderError;
use crate::source::SourceCache;
use crate::tree::Node;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Filesystem roots of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub site: PathBuf,
    pub theme: PathBuf,
    pub build: PathBuf,
}

/// An output file created by a renderer and not yet closed.
#[derive(Debug)]
pub struct OpenFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl OpenFile {
    /// Path relative to the build root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

/// Snapshot of both stack heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackDepth {
    pub dirs: usize,
    pub files: usize,
}

pub struct RenderContext {
    roots: Roots,
    sources: SourceCache,
    /// Resolved work dir per pushed directory, `/`-separated.
    dirstack: Vec<String>,
    open_files: Vec<OpenFile>,
    written: Vec<PathBuf>,
    claimed: HashSet<PathBuf>,
}

impl RenderContext {
    /// Create a context; `sources` is usually the cache left by the parse pass.
    pub fn new(roots: Roots, sources: SourceCache) -> Self {
        Self {
            roots,
            sources,
            dirstack: Vec::new(),
            open_files: Vec::new(),
            written: Vec::new(),
            claimed: HashSet::new(),
        }
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// Bytes of a node's source file.
    pub fn source(&mut self, node: &Node) -> Result<Arc<[u8]>, RenderError> {
        self.sources
            .read(node.path())
            .map_err(|source| RenderError::Io {
                path: self.roots.site.join(node.path()),
                source,
            })
    }

    /// Current output directory, relative to the build root.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir_url().split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Current output directory as a `/`-separated URL path (no leading slash).
    pub fn work_dir_url(&self) -> String {
        self.dirstack.last().cloned().unwrap_or_default()
    }

    /// Create `path` (relative to the work dir) and all its parents.
    pub fn mkdir_all(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let full = self.roots.build.join(self.work_dir()).join(path);
        fs::create_dir_all(&full).map_err(|source| RenderError::Io { path: full, source })
    }

    /// Enter `name` below the current work dir.
    pub fn push_dir(&mut self, name: impl Into<String>) {
        let name = name.into();
        let dir = match self.dirstack.last() {
            Some(current) if !current.is_empty() => format!("{current}/{name}"),
            _ => name,
        };
        self.dirstack.push(dir);
    }

    /// Create `path` relative to the build root and make it the work dir.
    pub fn push_root_dir(&mut self, path: &str) -> Result<(), RenderError> {
        let path = path.trim_matches('/');
        let full = self.roots.build.join(path);
        fs::create_dir_all(&full).map_err(|source| RenderError::Io { path: full, source })?;
        self.dirstack.push(path.to_string());
        Ok(())
    }

    /// Leave the current work dir. Returns it.
    pub fn pop_dir(&mut self) -> Result<String, RenderError> {
        self.dirstack.pop().ok_or(RenderError::StackUnderflow("directory"))
    }

    /// Create an output file relative to the work dir and push it.
    ///
    /// Each output path may be created once per pass; a second node mapping
    /// to the same file is a [`RenderError::OutputCollision`].
    pub fn create_file(&mut self, path: impl AsRef<Path>) -> Result<&Path, RenderError> {
        let rel = self.work_dir().join(path);
        if self.claimed.contains(&rel) {
            return Err(RenderError::OutputCollision(rel));
        }
        let full = self.roots.build.join(&rel);
        let file = File::create(&full).map_err(|source| RenderError::Io { path: full, source })?;
        trace!("created {}", rel.display());
        self.claimed.insert(rel.clone());
        self.open_files.push(OpenFile {
            path: rel,
            writer: BufWriter::new(file),
        });
        Ok(self.open_files.last().map(OpenFile::path).unwrap_or(Path::new("")))
    }

    /// The file on top of the open-file stack.
    pub fn current_file(&mut self) -> Option<&mut OpenFile> {
        self.open_files.last_mut()
    }

    /// Pop the top file, flush and close it. Returns its build-relative path.
    pub fn close_file(&mut self) -> Result<PathBuf, RenderError> {
        let file = self
            .open_files
            .pop()
            .ok_or(RenderError::StackUnderflow("file"))?;
        let full = self.roots.build.join(file.path());
        let path = file
            .finish()
            .map_err(|source| RenderError::Io { path: full, source })?;
        self.written.push(path.clone());
        Ok(path)
    }

    pub fn depth(&self) -> StackDepth {
        StackDepth {
            dirs: self.dirstack.len(),
            files: self.open_files.len(),
        }
    }

    /// Build-relative paths of every file closed so far, in close order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}
