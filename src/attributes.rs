//! Namespaced, multi-valued node attributes.
//!
//! Several independent collaborators may want to describe the same node: the
//! tree builder attaches the generic page front matter, an extension parser
//! attaches its own metadata, and either may do so more than once. Rather than
//! forcing a single shape, every contribution is stored as its own payload
//! under a namespace, and the payloads are merged when read:
//!
//! ```text
//! "page" → [ {title: "Hello", template: "base.html"}, {title: "Hi"} ]
//! "post" → [ {created_at: "...", slug: "hello"} ]
//!
//! get("page") → {title: "Hi", template: "base.html"}
//! ```
//!
//! Payloads are plain JSON objects. Anything that serializes to a mapping can
//! be added; the core never needs to know an extension's data shape.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("attributes for namespace '{0}' must serialize to a mapping")]
    NotAMapping(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single attribute payload.
pub type AttributeMap = Map<String, Value>;

/// Ordered `namespace → [payload]` store owned by one node.
///
/// Namespaces keep their first-insertion order so that [`to_props`](Self::to_props)
/// and debug output are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAttributes {
    entries: Vec<(String, Vec<AttributeMap>)>,
}

impl NodeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` and append it as a payload under `namespace`.
    pub fn add<T: Serialize + ?Sized>(
        &mut self,
        namespace: &str,
        value: &T,
    ) -> Result<(), AttributeError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => {
                self.add_map(namespace, map);
                Ok(())
            }
            _ => Err(AttributeError::NotAMapping(namespace.to_string())),
        }
    }

    /// Append an already-built mapping under `namespace`.
    pub fn add_map(&mut self, namespace: &str, map: AttributeMap) {
        match self.entries.iter_mut().find(|(ns, _)| ns == namespace) {
            Some((_, payloads)) => payloads.push(map),
            None => self.entries.push((namespace.to_string(), vec![map])),
        }
    }

    /// All payloads of `namespace` deep-merged in insertion order.
    pub fn get(&self, namespace: &str) -> Option<AttributeMap> {
        let payloads = self.get_all(namespace)?;
        let mut merged = Value::Object(Map::new());
        for payload in payloads {
            merged = merge_values(merged, Value::Object(payload.clone()));
        }
        match merged {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// The raw payload sequence of `namespace`.
    pub fn get_all(&self, namespace: &str) -> Option<&[AttributeMap]> {
        self.entries
            .iter()
            .find(|(ns, _)| ns == namespace)
            .map(|(_, payloads)| payloads.as_slice())
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(ns, _)| ns.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every namespace merged, keyed by namespace name.
    ///
    /// This is the base layer of the template properties for a node.
    pub fn to_props(&self) -> AttributeMap {
        self.entries
            .iter()
            .filter_map(|(ns, _)| self.get(ns).map(|map| (ns.clone(), Value::Object(map))))
            .collect()
    }
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Objects are merged key-by-key (overlay keys override base keys).
/// - Non-object values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_values(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge `overlay` into `base` in place, with [`merge_values`] semantics.
pub fn merge_into(base: &mut AttributeMap, overlay: AttributeMap) {
    for (key, overlay_val) in overlay {
        let merged = match base.remove(&key) {
            Some(base_val) => merge_values(base_val, overlay_val),
            None => overlay_val,
        };
        base.insert(key, merged);
    }
}
