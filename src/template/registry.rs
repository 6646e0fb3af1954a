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

//! Template language registry
//!
//! Languages are split into sync and async based on their actual needs. The
//! mustache renderer and the JSONata evaluator are pure and synchronous; a
//! language that has to await something (a remote lookup, a script runtime)
//! implements [`AsyncTemplateLanguage`] instead. Strings opening with
//! `[[<tag>]]` are routed to the language registered under `<tag>`; everything
//! else goes to the default language.

use super::tag::split_tag;
use crate::Result;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

/// Synchronous template language
///
/// # Example
/// ```rust
/// use formflow::template::{LanguageRegistry, SyncTemplateLanguage};
/// use serde_json::Value;
///
/// struct Upper;
///
/// impl SyncTemplateLanguage for Upper {
///     fn name(&self) -> &'static str {
///         "upper"
///     }
///
///     fn evaluate(&self, expression: &str, _context: &Value) -> formflow::Result<Option<Value>> {
///         Ok(Some(Value::String(expression.to_uppercase())))
///     }
/// }
///
/// let mut registry = LanguageRegistry::standard(16);
/// registry.register_sync(Upper);
/// assert!(registry.has_language("upper"));
/// ```
pub trait SyncTemplateLanguage: Send + Sync {
    /// Tag the language is registered under
    fn name(&self) -> &'static str;

    /// Evaluate an expression body (tag already stripped). `Ok(None)` means undefined.
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Option<Value>>;
}

/// Asynchronous template language
#[async_trait]
pub trait AsyncTemplateLanguage: Send + Sync {
    /// Tag the language is registered under
    fn name(&self) -> &'static str;

    /// Evaluate an expression body (tag already stripped). `Ok(None)` means undefined.
    async fn evaluate(&self, expression: &str, context: &Value) -> Result<Option<Value>>;
}

#[derive(Clone)]
enum Language {
    Sync(Arc<dyn SyncTemplateLanguage>),
    Async(Arc<dyn AsyncTemplateLanguage>),
}

impl Language {
    fn name(&self) -> &'static str {
        match self {
            Language::Sync(language) => language.name(),
            Language::Async(language) => language.name(),
        }
    }

    async fn evaluate(&self, expression: &str, context: &Value) -> Result<Option<Value>> {
        match self {
            Language::Sync(language) => language.evaluate(expression, context),
            Language::Async(language) => language.evaluate(expression, context).await,
        }
    }
}

/// Maps prefix tags to template languages
#[derive(Clone)]
pub struct LanguageRegistry {
    default: Language,
    tagged: FxHashMap<String, Language>,
}

impl LanguageRegistry {
    /// Create a registry with the given default (untagged) language
    pub fn new(default: impl SyncTemplateLanguage + 'static) -> Self {
        Self {
            default: Language::Sync(Arc::new(default)),
            tagged: FxHashMap::default(),
        }
    }

    /// Registry with mustache as default and JSONata under `jsonata`
    pub fn standard(expression_cache_size: usize) -> Self {
        let mut registry = Self::new(super::mustache::MustacheLanguage);
        registry.register_sync(crate::jsonata::JsonataLanguage::new(expression_cache_size));
        registry
    }

    /// Register a synchronous language under its name
    pub fn register_sync(&mut self, language: impl SyncTemplateLanguage + 'static) {
        let language = Language::Sync(Arc::new(language));
        self.tagged.insert(language.name().to_string(), language);
    }

    /// Register an asynchronous language under its name
    pub fn register_async(&mut self, language: impl AsyncTemplateLanguage + 'static) {
        let language = Language::Async(Arc::new(language));
        self.tagged.insert(language.name().to_string(), language);
    }

    /// Replace the default language
    pub fn set_default(&mut self, language: impl SyncTemplateLanguage + 'static) {
        self.default = Language::Sync(Arc::new(language));
    }

    /// Whether a language is registered under `tag`
    pub fn has_language(&self, tag: &str) -> bool {
        self.tagged.contains_key(tag)
    }

    /// Name of the default language
    pub fn default_language(&self) -> &'static str {
        self.default.name()
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.tagged.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Evaluate a template string, dispatching on its prefix tag
    ///
    /// Strings with an unknown tag are handed whole to the default language.
    pub async fn evaluate(&self, template: &str, context: &Value) -> Result<Option<Value>> {
        if let Some((tag, body)) = split_tag(template) {
            if let Some(language) = self.tagged.get(tag) {
                return language.evaluate(body, context).await;
            }
            log::debug!("No template language registered for tag '{tag}', using default");
        }
        self.default.evaluate(template, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl SyncTemplateLanguage for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn evaluate(&self, expression: &str, _context: &Value) -> Result<Option<Value>> {
            Ok(Some(Value::String(format!("echo:{expression}"))))
        }
    }

    struct Delayed;

    #[async_trait]
    impl AsyncTemplateLanguage for Delayed {
        fn name(&self) -> &'static str {
            "delayed"
        }

        async fn evaluate(&self, expression: &str, context: &Value) -> Result<Option<Value>> {
            tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
            Ok(context.get(expression).cloned())
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_tag() {
        let mut registry = LanguageRegistry::standard(8);
        registry.register_sync(Echo);
        registry.register_async(Delayed);
        let context = json!({"name": "Sam"});

        assert_eq!(
            registry.evaluate("[[echo]]hi", &context).await.unwrap(),
            Some(json!("echo:hi"))
        );
        assert_eq!(
            registry.evaluate("[[delayed]] name", &context).await.unwrap(),
            Some(json!("Sam"))
        );
        assert_eq!(
            registry.evaluate("Hi {{name}}", &context).await.unwrap(),
            Some(json!("Hi Sam"))
        );
    }

    #[tokio::test]
    async fn test_unknown_tag_goes_to_default() {
        let registry = LanguageRegistry::standard(8);
        assert_eq!(
            registry.evaluate("[[nope]] {{x}}", &json!({"x": 1})).await.unwrap(),
            Some(json!("[[nope]] 1"))
        );
    }

    #[test]
    fn test_tags() {
        let mut registry = LanguageRegistry::standard(8);
        registry.register_sync(Echo);
        assert_eq!(registry.tags(), vec!["echo", "jsonata"]);
        assert_eq!(registry.default_language(), "mustache");
    }
}
