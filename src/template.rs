//! Template expansion for page bodies and theme shells.
//!
//! The pipeline only depends on the [`Evaluator`] trait: render a template
//! source for a given file with a property mapping. [`TeraEvaluator`] is the
//! production implementation, backed by [Tera](https://keats.github.io/tera/).
//!
//! ## Relative references
//!
//! Tera resolves `{% include %}`, `{% import %}` and `{% extends %}` by
//! template *name*. Content authors write those names relative to the file
//! they are editing, so before rendering the evaluator discovers every
//! reference (recursively), resolves it against the referencing file's
//! directory and registers the file under the name as written:
//!
//! ```text
//! docs/guide.md:          {% include "partials/nav.html" %}
//!                         → registers docs/partials/nav.html as "partials/nav.html"
//! docs/partials/nav.html: {% include "/shared/links.html" %}
//!                         → registers shared/links.html as "/shared/links.html"
//! ```
//!
//! A reference may not climb above the evaluator root. Missing files are not
//! registered; Tera then reports them at render time (or skips them for
//! `ignore missing` includes).

use crate::attributes::AttributeMap;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template error in {path}: {message}")]
    Tera { path: String, message: String },
    #[error("IO error reading template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template reference '{name}' in {from} escapes the template root")]
    EscapesRoot { name: String, from: String },
}

/// Template data handed to an evaluator.
pub type Props = AttributeMap;

/// Renders a template source in the context of a file.
pub trait Evaluator {
    /// Render `source`, treating it as the contents of `current_path`
    /// (relative to the evaluator's root) for reference resolution.
    fn render(&self, source: &str, current_path: &str, props: &Props)
    -> Result<String, TemplateError>;
}

/// Name under which the inline source is registered.
const INLINE_TEMPLATE: &str = "__inline__";

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*(?:include|import|extends)\s+["']([^"']+)["']"#)
        .expect("template reference pattern is valid")
});

/// [`Evaluator`] backed by Tera, resolving references under `root`.
#[derive(Debug, Clone)]
pub struct TeraEvaluator {
    root: PathBuf,
}

impl TeraEvaluator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Collect `(name, source)` for every file reachable from `source`.
    fn collect_references(
        &self,
        source: &str,
        current_path: &str,
        seen: &mut HashSet<String>,
        out: &mut Vec<(String, String)>,
    ) -> Result<(), TemplateError> {
        for capture in REFERENCE.captures_iter(source) {
            let name = &capture[1];
            if !seen.insert(name.to_string()) {
                continue;
            }
            let resolved =
                resolve_reference(current_path, name).ok_or_else(|| TemplateError::EscapesRoot {
                    name: name.to_string(),
                    from: current_path.to_string(),
                })?;
            let path = self.root.join(&resolved);
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(TemplateError::Io { path, source }),
            };
            self.collect_references(&content, &resolved, seen, out)?;
            out.push((name.to_string(), content));
        }
        Ok(())
    }
}

impl Evaluator for TeraEvaluator {
    fn render(
        &self,
        source: &str,
        current_path: &str,
        props: &Props,
    ) -> Result<String, TemplateError> {
        let tera_err = |e: tera::Error| TemplateError::Tera {
            path: current_path.to_string(),
            message: error_chain(&e),
        };

        let mut references = Vec::new();
        self.collect_references(source, current_path, &mut HashSet::new(), &mut references)?;

        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(references).map_err(tera_err)?;
        tera.add_raw_template(INLINE_TEMPLATE, source)
            .map_err(tera_err)?;

        let context = Context::from_value(Value::Object(props.clone())).map_err(tera_err)?;
        tera.render(INLINE_TEMPLATE, &context).map_err(tera_err)
    }
}

/// Resolve `name` relative to the directory of `current_path`.
///
/// A leading `/` resolves from the root. Returns `None` if `..` segments
/// climb above the root.
pub fn resolve_reference(current_path: &str, name: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    let relative = match name.strip_prefix('/') {
        Some(absolute) => absolute,
        None => {
            if let Some((dir, _)) = current_path.rsplit_once('/') {
                segments.extend(dir.split('/').filter(|s| !s.is_empty()));
            }
            name
        }
    };
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Tera's top-level error is terse; the cause chain holds the useful part.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
