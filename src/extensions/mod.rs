//! Extensions: named bundles of parsers and renderers enabled from config.
//!
//! A project's `uses` list names extensions in priority order. For each entry
//! the orchestrator looks the name up, hands the extension the rest of the
//! entry as raw settings, and lets it register into the run's [`Registry`]:
//!
//! ```yaml
//! uses:
//!   - extension: blog     # looked up by name
//!     path: posts         # everything else is the extension's settings
//! ```
//!
//! Extensions decode their own settings with [`decode_settings`], so the core
//! config never needs to know their shape.

pub mod blog;

use crate::project::Registry;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub use blog::BlogExtension;

#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("invalid settings for extension '{extension}': {source}")]
    Settings {
        extension: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("extension '{extension}': {message}")]
    Invalid { extension: String, message: String },
}

/// Raw settings of one `uses` entry, minus the `extension` key.
pub type ExtensionSettings = serde_json::Map<String, Value>;

pub trait Extension {
    /// Name matched against `uses[].extension`.
    fn name(&self) -> &str;

    /// Add this extension's parsers and renderers to `registry`.
    fn register(
        &self,
        registry: &mut Registry,
        settings: &ExtensionSettings,
    ) -> Result<(), ExtensionError>;
}

/// Decode `settings` into an extension's own config type.
pub fn decode_settings<T: DeserializeOwned>(
    extension: &str,
    settings: &ExtensionSettings,
) -> Result<T, ExtensionError> {
    serde_json::from_value(Value::Object(settings.clone())).map_err(|source| {
        ExtensionError::Settings {
            extension: extension.to_string(),
            source,
        }
    })
}

/// Extensions shipped with the crate.
pub fn builtin() -> Vec<Arc<dyn Extension>> {
    vec![Arc::new(BlogExtension)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        path: String,
    }

    fn settings(value: Value) -> ExtensionSettings {
        match value {
            Value::Object(map) => map,
            _ => panic!("settings must be an object"),
        }
    }

    #[test]
    fn decodes_settings() {
        let s: Sample = decode_settings("x", &settings(json!({"path": "p"}))).unwrap();
        assert_eq!(s, Sample { path: "p".into() });
    }

    #[test]
    fn unknown_setting_names_extension() {
        let err = decode_settings::<Sample>("x", &settings(json!({"path": "p", "bogus": 1})))
            .unwrap_err();
        assert!(matches!(&err, ExtensionError::Settings { extension, .. } if extension == "x"));
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn builtin_includes_blog() {
        let names: Vec<String> = builtin().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["blog"]);
    }
}
