//! The per-page content pipeline.
//!
//! Every leaf node whose renderer opened an output file goes through the same
//! sequence, each step consuming the previous step's output:
//!
//! ```text
//! source bytes
//!   │ 1. split front matter      (PageFrontMatter + body)
//!   │ 2. expand templates        (site evaluator, node path, props)
//!   │ 3. compile markdown        (GFM, raw HTML kept)
//!   │ 4. wrap in theme chain     (only if front matter names a template)
//!   ▼
//! bytes for the open output file
//! ```
//!
//! ## Theme chain
//!
//! A theme file is a template with its own optional front matter. Its body is
//! rendered with the page props plus `outlet` (the inner HTML); if its front
//! matter names a `template`, the result is wrapped again:
//!
//! ```text
//! page (template: post.html)
//!   post.html (template: base.html)   outlet = compiled page
//!     base.html                        outlet = rendered post.html
//! ```
//!
//! A theme can name at most one parent, so this is a chain, never a tree.
//! Revisiting a theme already in the chain is rejected as a cycle, and chains
//! longer than [`MAX_THEME_DEPTH`] are rejected outright. Theme names resolve
//! against the theme root and may not climb out of it.

use crate::context::Roots;
use crate::frontmatter::{self, FrontMatterError, PageFrontMatter};
use crate::markdown::compile_markdown;
use crate::template::{Evaluator, Props, TemplateError, TeraEvaluator, resolve_reference};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("front matter error: {0}")]
    FrontMatter(#[from] FrontMatterError),
    #[error("{0} is not valid UTF-8")]
    NotUtf8(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("IO error reading theme {path}: {source}")]
    ThemeIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("theme chain cycles: {}", .0.join(" -> "))]
    ThemeCycle(Vec<String>),
    #[error("theme chain is deeper than {0} templates")]
    ThemeTooDeep(usize),
    #[error("theme '{0}' is outside the theme directory")]
    ThemeOutsideRoot(String),
}

/// Longest theme chain the pipeline will follow.
pub const MAX_THEME_DEPTH: usize = 32;

/// Template property holding the inner content while rendering a theme.
pub const OUTLET: &str = "outlet";

/// The only front matter a theme file is read for.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThemeFrontMatter {
    template: Option<String>,
}

pub struct Pipeline {
    site: Box<dyn Evaluator>,
    theme: Box<dyn Evaluator>,
    theme_root: PathBuf,
}

impl Pipeline {
    pub fn new(
        site: Box<dyn Evaluator>,
        theme: Box<dyn Evaluator>,
        theme_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            site,
            theme,
            theme_root: theme_root.into(),
        }
    }

    /// Tera evaluators rooted at the site and theme directories.
    pub fn for_roots(roots: &Roots) -> Self {
        Self::new(
            Box::new(TeraEvaluator::new(&roots.site)),
            Box::new(TeraEvaluator::new(&roots.theme)),
            &roots.theme,
        )
    }

    pub fn theme_root(&self) -> &Path {
        &self.theme_root
    }

    /// Run the full pipeline over a page source.
    pub fn render(&self, source: &[u8], path: &str, props: &Props) -> Result<Vec<u8>, PipelineError> {
        let (page, body): (PageFrontMatter, _) = frontmatter::decode(source)?;
        let body = std::str::from_utf8(body).map_err(|_| PipelineError::NotUtf8(path.to_string()))?;

        let expanded = self.site.render(body, path, props)?;
        let compiled = compile_markdown(&expanded);

        match page.template.filter(|t| !t.is_empty()) {
            Some(template) => Ok(self.wrap_theme(&template, compiled, props)?.into_bytes()),
            None => Ok(compiled.into_bytes()),
        }
    }

    /// Wrap `content` in the theme chain starting at `template`.
    pub fn wrap_theme(
        &self,
        template: &str,
        content: String,
        props: &Props,
    ) -> Result<String, PipelineError> {
        let mut chain: Vec<String> = Vec::new();
        let mut next = Some(template.to_string());
        let mut content = content;

        while let Some(requested) = next {
            let name = resolve_reference("", &requested)
                .ok_or(PipelineError::ThemeOutsideRoot(requested))?;
            if chain.contains(&name) {
                chain.push(name);
                return Err(PipelineError::ThemeCycle(chain));
            }
            if chain.len() == MAX_THEME_DEPTH {
                return Err(PipelineError::ThemeTooDeep(MAX_THEME_DEPTH));
            }
            debug!("wrapping in theme '{}'", name);

            let path = self.theme_root.join(&name);
            let source =
                std::fs::read(&path).map_err(|source| PipelineError::ThemeIo { path, source })?;
            let (theme, body): (ThemeFrontMatter, _) = frontmatter::decode(&source)?;
            let body =
                std::str::from_utf8(body).map_err(|_| PipelineError::NotUtf8(name.clone()))?;

            let mut theme_props = props.clone();
            theme_props.insert(OUTLET.to_string(), Value::String(content));
            content = self.theme.render(body, &name, &theme_props)?;

            chain.push(name);
            next = theme.template.filter(|t| !t.is_empty());
        }
        Ok(content)
    }
}
