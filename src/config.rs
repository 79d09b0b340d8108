//! Project configuration module.
//!
//! Handles discovering, loading, and validating the project file. A project
//! is a directory holding one config file next to its content, theme and
//! build directories:
//!
//! ```text
//! my-site/
//! ├── project.yml      # or project.json / project.yaml / project.toml
//! ├── site/            # content tree (parse pass input)
//! ├── theme/           # theme templates
//! └── _build/          # generated output (replaced on every build)
//! ```
//!
//! ## Discovery
//!
//! Candidates are probed in a fixed order and the first one found wins:
//! `project.json`, `project.yml`, `project.yaml`, `project.toml`. Having more
//! than one is not an error, but only the first is read. No candidate at all
//! is [`ConfigError::NotFound`].
//!
//! ## Configuration Options
//!
//! ```yaml
//! # All options are optional - defaults shown below
//! name: my-site
//! site:  { dir: site }
//! theme: { dir: theme }
//! build: { dir: _build }
//! uses:
//!   - extension: blog   # extension name; remaining keys are its settings
//!     path: blog
//! ```
//!
//! Unknown top-level keys are rejected to catch typos early. Extension
//! settings are passed through untouched; each extension validates its own.

use crate::context::Roots;
use crate::extensions::ExtensionSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no project file found in {}", .0.display())]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

pub const DEFAULT_SITE_DIR: &str = "site";
pub const DEFAULT_THEME_DIR: &str = "theme";
pub const DEFAULT_BUILD_DIR: &str = "_build";

/// Syntax of a project file, picked by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

/// Probe order for project files.
pub const CONFIG_CANDIDATES: [(&str, ConfigFormat); 4] = [
    ("project.json", ConfigFormat::Json),
    ("project.yml", ConfigFormat::Yaml),
    ("project.yaml", ConfigFormat::Yaml),
    ("project.toml", ConfigFormat::Toml),
];

/// Project configuration loaded from the project file.
///
/// Every field is optional. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Display name of the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Content directory (default `site`).
    pub site: DirConfig,
    /// Theme directory (default `theme`).
    pub theme: DirConfig,
    /// Build output directory (default `_build`).
    pub build: DirConfig,
    /// Extensions to enable, in priority order.
    pub uses: Vec<ExtensionConfig>,
}

/// A directory setting, relative to the project directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// One `uses` entry: the extension name plus its free-form settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub extension: String,
    #[serde(flatten)]
    pub settings: ExtensionSettings,
}

impl ExtensionConfig {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            settings: ExtensionSettings::new(),
        }
    }
}

impl ProjectConfig {
    pub fn site_dir(&self) -> &str {
        self.site.dir.as_deref().unwrap_or(DEFAULT_SITE_DIR)
    }

    pub fn theme_dir(&self) -> &str {
        self.theme.dir.as_deref().unwrap_or(DEFAULT_THEME_DIR)
    }

    pub fn build_dir(&self) -> &str {
        self.build.dir.as_deref().unwrap_or(DEFAULT_BUILD_DIR)
    }

    /// Resolve the three directories under `work_dir`.
    pub fn roots(&self, work_dir: &Path) -> Roots {
        Roots {
            site: work_dir.join(self.site_dir()),
            theme: work_dir.join(self.theme_dir()),
            build: work_dir.join(self.build_dir()),
        }
    }

    /// Validate directory names and extension entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dirs = [
            ("site.dir", self.site_dir()),
            ("theme.dir", self.theme_dir()),
            ("build.dir", self.build_dir()),
        ];
        for (key, dir) in dirs {
            validate_dir(key, dir)?;
        }

        let mut seen = HashSet::new();
        for (key, dir) in dirs {
            let normalized: PathBuf = Path::new(dir)
                .components()
                .filter(|c| *c != Component::CurDir)
                .collect();
            if !seen.insert(normalized) {
                return Err(ConfigError::Validation(format!(
                    "{key} '{dir}' is already used by another directory setting"
                )));
            }
        }

        for (i, ext) in self.uses.iter().enumerate() {
            if ext.extension.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "uses[{i}].extension must not be empty"
                )));
            }
        }
        Ok(())
    }
}

fn validate_dir(key: &str, dir: &str) -> Result<(), ConfigError> {
    if dir.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }
    let path = Path::new(dir);
    if path.is_absolute() || path.has_root() {
        return Err(ConfigError::Validation(format!(
            "{key} must be relative to the project directory, got '{dir}'"
        )));
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(ConfigError::Validation(format!(
            "{key} must not contain '..', got '{dir}'"
        )));
    }
    if path.components().all(|c| c == Component::CurDir) {
        return Err(ConfigError::Validation(format!(
            "{key} must name a subdirectory, got '{dir}'"
        )));
    }
    Ok(())
}

/// The first existing project file in `work_dir`, in probe order.
pub fn find_config(work_dir: &Path) -> Option<(PathBuf, ConfigFormat)> {
    CONFIG_CANDIDATES
        .iter()
        .map(|(name, format)| (work_dir.join(name), *format))
        .find(|(path, _)| path.is_file())
}

/// Parse project file contents without validating them.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<ProjectConfig, ConfigError> {
    Ok(match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => {
            // An empty YAML document is null, not an empty mapping.
            if content.trim().is_empty() {
                ProjectConfig::default()
            } else {
                serde_yaml::from_str(content)?
            }
        }
        ConfigFormat::Toml => toml::from_str(content)?,
    })
}

/// Load and validate the project file in `work_dir`.
pub fn load_config(work_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let (path, format) =
        find_config(work_dir).ok_or_else(|| ConfigError::NotFound(work_dir.to_path_buf()))?;
    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, format)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `project.yml` with all keys and explanations.
///
/// Used by the `init` CLI command.
pub fn stock_config_yaml() -> &'static str {
    r##"# pagetree project
# ================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# pagetree looks for project.json, project.yml, project.yaml and
# project.toml in that order and reads the first one it finds.
# Unknown keys will cause an error.

# Display name of the project.
# name: my-site

# Content directory. Every file and directory under it is offered to the
# registered parsers; names follow kind[.extra...].slug.ext.
site:
  dir: site

# Theme directory. Pages select a theme template with `template:` in their
# front matter; themes may in turn name a parent template.
theme:
  dir: theme

# Build directory. Replaced as a whole on every successful build; the
# previous build is kept as <dir>.bk while building, and a failed build is
# left behind as <dir>.failed for inspection.
build:
  dir: _build

# Extensions, in priority order. Extension parsers and renderers are
# consulted before the built-in ones.
uses: []
#  - extension: blog
#    path: blog      # content subdirectory holding posts
#    output: blog    # output subdirectory (defaults to path)
"##
}
