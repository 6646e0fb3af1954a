// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared mutable form context
//!
//! The context is a JSON object `{form_id, show_validation, data, ...extra}`.
//! Field data paths are relative to `data`; dependency keys and template
//! lookups are relative to the root.

use crate::path::{get_path, join, remove_path, set_path};
use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const DATA_KEY: &str = "data";

/// Handle to the context of one form instance; clones share state
#[derive(Debug, Clone)]
pub struct SharedContext {
    inner: Arc<RwLock<Value>>,
    revision: Arc<AtomicU64>,
}

impl SharedContext {
    /// Create a context around initial data
    pub fn new(form_id: Option<&str>, show_validation: bool, data: Value) -> Self {
        let data = if data.is_object() {
            data
        } else {
            Value::Object(Map::new())
        };
        Self {
            inner: Arc::new(RwLock::new(json!({
                "form_id": form_id,
                "show_validation": show_validation,
                "data": data,
            }))),
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter bumped on every write
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Copy of the whole context
    pub fn snapshot(&self) -> Value {
        self.inner.read().clone()
    }

    /// Copy of the data tree
    pub fn data(&self) -> Value {
        self.inner
            .read()
            .get(DATA_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Value at a path from the context root
    pub fn get(&self, path: &str) -> Option<Value> {
        get_path(&self.inner.read(), path).cloned()
    }

    /// Value at a data path
    pub fn get_data(&self, data_path: &str) -> Option<Value> {
        self.get(&join(DATA_KEY, data_path))
    }

    /// Whether a non-null value exists at a data path
    pub fn has_data(&self, data_path: &str) -> bool {
        self.get_data(data_path).is_some_and(|value| !value.is_null())
    }

    /// Write a value at a data path, returning the previous value
    ///
    /// Paths that index past the end of an existing array are ignored.
    pub fn set_data(&self, data_path: &str, value: Value) -> Option<Value> {
        let path = join(DATA_KEY, data_path);
        let mut guard = self.inner.write();
        let previous = get_path(&guard, &path).cloned();
        if !set_path(&mut guard, &path, value) {
            log::warn!("Ignoring write to '{path}': index past the end of an array");
            return previous;
        }
        drop(guard);
        self.bump();
        previous
    }

    /// Remove the value at a data path, returning it
    pub fn remove_data(&self, data_path: &str) -> Option<Value> {
        let removed = remove_path(&mut self.inner.write(), &join(DATA_KEY, data_path));
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Replace the whole data tree
    pub fn replace_data(&self, data: Value) {
        set_path(&mut self.inner.write(), DATA_KEY, data);
        self.bump();
    }

    /// Set a top-level key outside of `data`
    pub fn set_extra(&self, key: &str, value: Value) {
        if let Value::Object(root) = &mut *self.inner.write() {
            root.insert(key.to_string(), value);
        }
        self.bump();
    }

    /// Toggle the `show_validation` flag
    pub fn set_show_validation(&self, show: bool) {
        self.set_extra("show_validation", Value::Bool(show));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_context_shape() {
        let context = SharedContext::new(Some("signup"), false, json!({"name": "Sam"}));
        assert_eq!(
            context.snapshot(),
            json!({"form_id": "signup", "show_validation": false, "data": {"name": "Sam"}})
        );
        assert_eq!(context.get("data.name"), Some(json!("Sam")));
        assert_eq!(context.get_data("name"), Some(json!("Sam")));
    }

    #[test]
    fn test_non_object_data_is_replaced() {
        let context = SharedContext::new(None, false, json!(null));
        assert_eq!(context.data(), json!({}));
    }

    #[test]
    fn test_writes_bump_revision_and_share_state() {
        let context = SharedContext::new(None, false, json!({}));
        let other = context.clone();
        assert_eq!(context.set_data("a.b", json!(1)), None);
        assert_eq!(other.get_data("a.b"), Some(json!(1)));
        assert_eq!(context.set_data("a.b", json!(2)), Some(json!(1)));
        assert_eq!(other.revision(), 2);

        assert_eq!(context.remove_data("a.b"), Some(json!(2)));
        assert_eq!(context.remove_data("a.b"), None);
        assert_eq!(context.revision(), 3);
        assert!(!context.has_data("a.b"));
    }

    #[test]
    fn test_extra_keys() {
        let context = SharedContext::new(None, false, json!({}));
        context.set_extra("locale", json!("nb"));
        context.set_show_validation(true);
        assert_eq!(context.get("locale"), Some(json!("nb")));
        assert_eq!(context.get("show_validation"), Some(json!(true)));
    }
}
