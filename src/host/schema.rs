//! Host schema registry
//!
//! Runners contribute configuration schema fragments under `runners.{id}`; the
//! host merges them into one document it validates stored settings against.

use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use serde_json::Value;

/// Schema fragments keyed by dotted path
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    fragments: RwLock<IndexMap<String, Value>>,
}

impl SchemaRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment at `path`
    ///
    /// Object fragments are merged key by key onto an existing object at the
    /// same path; anything else replaces it.
    pub fn extend(&self, path: &str, fragment: Value) {
        let mut fragments = self.fragments.write().unwrap_or_else(PoisonError::into_inner);
        match (fragments.get_mut(path), fragment) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                existing.extend(incoming);
            }
            (_, fragment) => {
                fragments.insert(path.to_string(), fragment);
            }
        }
        tracing::debug!(path, "extended schema");
    }

    /// Fragment registered at `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        self.fragments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// All registered paths, in registration order
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.fragments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
