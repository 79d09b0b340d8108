//! Read-once cache of content source files.
//!
//! The parse pass reads every leaf to decode its front matter, and the render
//! pass needs the same bytes again for the content pipeline. The cache is
//! created by the parse pass and handed to the render pass, so each file is
//! read from disk exactly once per generation run.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `path → bytes` cache rooted at a content directory.
#[derive(Debug)]
pub struct SourceCache {
    root: PathBuf,
    sources: HashMap<String, Arc<[u8]>>,
}

impl SourceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sources: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bytes of the file at `path` (relative to the root).
    ///
    /// The first call reads from disk; later calls for the same path return
    /// the cached bytes even if the file has since changed.
    pub fn read(&mut self, path: &str) -> io::Result<Arc<[u8]>> {
        if let Some(bytes) = self.sources.get(path) {
            return Ok(Arc::clone(bytes));
        }
        let bytes: Arc<[u8]> = std::fs::read(self.root.join(path))?.into();
        self.sources.insert(path.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_relative_to_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("docs")).unwrap();
        fs::write(tmp.path().join("docs/a.md"), "hello").unwrap();

        let mut cache = SourceCache::new(tmp.path());
        assert_eq!(&*cache.read("docs/a.md").unwrap(), b"hello");
    }

    #[test]
    fn second_read_is_served_from_cache() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "first").unwrap();

        let mut cache = SourceCache::new(tmp.path());
        cache.read("a.md").unwrap();
        fs::write(tmp.path().join("a.md"), "second").unwrap();

        assert_eq!(&*cache.read("a.md").unwrap(), b"first");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mut cache = SourceCache::new(tmp.path());
        let err = cache.read("missing.md").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(cache.is_empty());
    }
}
