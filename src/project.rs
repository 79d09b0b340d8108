//! Build orchestration: registry assembly and the transactional build swap.
//!
//! A [`Project`] ties a work directory and its [`ProjectConfig`] to the parse
//! and render passes. Each run assembles a fresh [`Registry`]:
//!
//! ```text
//! caller parsers/renderers     (with_entry_parser / with_entry_renderer)
//! extension parsers/renderers  (config `uses`, in order)
//! DefaultParser / DefaultRenderer
//! ```
//!
//! ## Build swap
//!
//! The build directory is never modified in place. A run moves the previous
//! build aside, builds from scratch, then commits or rolls back:
//!
//! ```text
//! start      _build.bk exists? → interrupted run: restore it as _build
//! backup     _build      → _build.bk
//! build      mkdir _build, parse, render
//! success    _build.bk   → _build.old      (commit)
//!            rm -r _build.old
//! failure    rm -r _build.failed
//!            _build      → _build.failed   (kept for inspection)
//!            _build.bk   → _build          (previous build restored)
//! ```
//!
//! The commit is a single rename, so a `_build.bk` found at start always
//! means a run died before committing. A `_build.old` that could not be
//! removed is only garbage and never restored. A failed commit rename rolls
//! back like any other failure.
//!
//! Between runs `_build` is therefore either absent or a complete successful
//! build. Rollback problems are logged and never replace the build error.

use crate::config::{ConfigError, ProjectConfig, load_config};
use crate::context::{RenderContext, Roots};
use crate::extensions::{self, Extension, ExtensionError};
use crate::parser::{DefaultParser, EntryParser, ParseError, TreeBuilder};
use crate::pipeline::Pipeline;
use crate::render::{DefaultRenderer, EntryRenderer, RenderError, TreeRenderer};
use crate::tree::Node;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown extension '{0}'")]
    UnknownExtension(String),
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error("could not back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not commit build, {path} was not retired: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not restore interrupted build {path}: {source}")]
    Recover {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Suffix of the previous build while a run is in progress.
pub const BACKUP_SUFFIX: &str = ".bk";
/// Suffix of the partial output of the last failed run.
pub const FAILED_SUFFIX: &str = ".failed";
/// Suffix of a committed-away backup awaiting deletion.
pub const RETIRED_SUFFIX: &str = ".old";

/// Ordered parser and renderer lists for one run.
#[derive(Clone, Default)]
pub struct Registry {
    parsers: Vec<Arc<dyn EntryParser>>,
    renderers: Vec<Arc<dyn EntryRenderer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parser(&mut self, parser: Arc<dyn EntryParser>) {
        self.parsers.push(parser);
    }

    pub fn add_renderer(&mut self, renderer: Arc<dyn EntryRenderer>) {
        self.renderers.push(renderer);
    }

    pub fn parsers(&self) -> &[Arc<dyn EntryParser>] {
        &self.parsers
    }

    pub fn renderers(&self) -> &[Arc<dyn EntryRenderer>] {
        &self.renderers
    }
}

/// Outcome of a successful [`Project::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub build_dir: PathBuf,
    /// Build-relative paths of every file written.
    pub written: Vec<PathBuf>,
    /// Paths of nodes no renderer claimed.
    pub skipped: Vec<String>,
}

pub struct Project {
    work_dir: PathBuf,
    config: ProjectConfig,
    extensions: Vec<Arc<dyn Extension>>,
    registry: Registry,
}

impl Project {
    /// A project with the built-in extensions available.
    pub fn new(work_dir: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Self {
            work_dir: work_dir.into(),
            config,
            extensions: extensions::builtin(),
            registry: Registry::new(),
        }
    }

    /// Load the project file from `work_dir`.
    pub fn load(work_dir: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let work_dir = work_dir.into();
        let config = load_config(&work_dir)?;
        Ok(Self::new(work_dir, config))
    }

    /// Make an extension available to `uses`. Shadows a built-in of the same name.
    pub fn with_extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Register a parser ahead of every extension and default parser.
    pub fn with_entry_parser(mut self, parser: Arc<dyn EntryParser>) -> Self {
        self.registry.add_parser(parser);
        self
    }

    /// Register a renderer ahead of every extension and default renderer.
    pub fn with_entry_renderer(mut self, renderer: Arc<dyn EntryRenderer>) -> Self {
        self.registry.add_renderer(renderer);
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn roots(&self) -> Roots {
        self.config.roots(&self.work_dir)
    }

    /// Assemble this run's registry. Touches no files.
    pub fn registry(&self) -> Result<Registry, BuildError> {
        let mut registry = self.registry.clone();
        for entry in &self.config.uses {
            let extension = self
                .extensions
                .iter()
                .rev()
                .find(|e| e.name() == entry.extension)
                .ok_or_else(|| BuildError::UnknownExtension(entry.extension.clone()))?;
            debug!("registering extension '{}'", entry.extension);
            extension.register(&mut registry, &entry.settings)?;
        }
        registry.add_parser(Arc::new(DefaultParser));
        registry.add_renderer(Arc::new(DefaultRenderer));
        Ok(registry)
    }

    /// Run the parse pass only and return the content tree.
    pub fn check(&self) -> Result<Node, BuildError> {
        let registry = self.registry()?;
        let roots = self.roots();
        let (tree, _) = TreeBuilder::new(&roots.site, registry.parsers()).build()?;
        Ok(tree)
    }

    /// Build the site into the build directory, replacing it only on success.
    pub fn generate(&self) -> Result<BuildReport, BuildError> {
        let roots = self.roots();
        let registry = self.registry()?;
        let backup = with_suffix(&roots.build, BACKUP_SUFFIX);
        let failed = with_suffix(&roots.build, FAILED_SUFFIX);
        let retired = with_suffix(&roots.build, RETIRED_SUFFIX);

        info!(
            "building {} → {}",
            roots.site.display(),
            roots.build.display()
        );
        recover_interrupted(&roots.build, &backup)?;

        let has_backup = match fs::rename(&roots.build, &backup) {
            Ok(()) => {
                debug!("moved previous build to {}", backup.display());
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(source) => {
                return Err(BuildError::Backup {
                    path: roots.build.clone(),
                    source,
                });
            }
        };

        let result = build_into(&roots, &registry).and_then(|report| {
            if has_backup {
                commit(&backup, &retired)?;
            }
            Ok(report)
        });
        match result {
            Ok(report) => {
                info!("wrote {} files", report.written.len());
                Ok(report)
            }
            Err(err) => {
                warn!("build failed: {}", err);
                roll_back(&roots.build, &backup, &failed, has_backup);
                Err(err)
            }
        }
    }
}

/// Create the build directory and run both passes into it.
fn build_into(roots: &Roots, registry: &Registry) -> Result<BuildReport, BuildError> {
    fs::create_dir_all(&roots.build).map_err(|source| BuildError::Io {
        path: roots.build.clone(),
        source,
    })?;

    let (tree, sources) = TreeBuilder::new(&roots.site, registry.parsers()).build()?;
    let pipeline = Pipeline::for_roots(roots);
    let mut ctx = RenderContext::new(roots.clone(), sources);
    let report = TreeRenderer::new(registry.renderers(), &pipeline).render(&tree, &mut ctx)?;

    Ok(BuildReport {
        build_dir: roots.build.clone(),
        written: report.written,
        skipped: report.skipped,
    })
}

/// Retire the backup with one rename, then delete it best-effort.
fn commit(backup: &Path, retired: &Path) -> Result<(), BuildError> {
    discard(retired);
    fs::rename(backup, retired).map_err(|source| BuildError::Commit {
        path: backup.to_path_buf(),
        source,
    })?;
    discard(retired);
    Ok(())
}

fn discard(dir: &Path) {
    if dir.exists()
        && let Err(e) = fs::remove_dir_all(dir)
    {
        warn!("could not remove {}: {}", dir.display(), e);
    }
}

/// A leftover backup means the last run died before committing. Put it back.
fn recover_interrupted(build: &Path, backup: &Path) -> Result<(), BuildError> {
    if !backup.exists() {
        return Ok(());
    }
    warn!(
        "found {} from an interrupted build, restoring it",
        backup.display()
    );
    let recover_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| BuildError::Recover { path, source }
    };
    if build.exists() {
        fs::remove_dir_all(build).map_err(recover_err(build))?;
    }
    fs::rename(backup, build).map_err(recover_err(backup))
}

/// Keep the failed output as `failed` and restore the backup. Best-effort.
fn roll_back(build: &Path, backup: &Path, failed: &Path, has_backup: bool) {
    if failed.exists()
        && let Err(e) = fs::remove_dir_all(failed)
    {
        warn!("could not remove stale {}: {}", failed.display(), e);
    }
    if build.exists() {
        match fs::rename(build, failed) {
            Ok(()) => info!("failed output kept at {}", failed.display()),
            Err(e) => warn!("could not move {} aside: {}", build.display(), e),
        }
    }
    if has_backup && let Err(e) = fs::rename(backup, build) {
        warn!("could not restore {}: {}", backup.display(), e);
    }
}

/// `path` with `suffix` appended to its last component.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
