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

//! Template evaluation
//!
//! A template is any JSON value. Strings are expressions, arrays and objects are
//! evaluated element-wise, every other value is returned unchanged. `None` stands
//! for "undefined" throughout: a missing template, a missing context and a failed
//! evaluation all produce it.

pub mod mustache;
mod registry;
mod tag;

pub use registry::{AsyncTemplateLanguage, LanguageRegistry, SyncTemplateLanguage};
pub use tag::split_tag;

use crate::config::EngineConfig;
use futures::future::{BoxFuture, FutureExt, join_all};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Evaluates templates against a context through a [`LanguageRegistry`]
#[derive(Clone)]
pub struct TemplateEvaluator {
    registry: Arc<LanguageRegistry>,
}

impl Default for TemplateEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEvaluator {
    /// Evaluator with the standard languages and default settings
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Evaluator with the standard languages sized by `config`
    pub fn with_config(config: &EngineConfig) -> Self {
        Self::with_registry(LanguageRegistry::standard(config.expression_cache_size))
    }

    /// Evaluator over a custom registry
    pub fn with_registry(registry: LanguageRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The languages this evaluator dispatches to
    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    /// Evaluate a template against a context
    ///
    /// Without a context the template is returned unevaluated. Array elements that
    /// evaluate to undefined become `null`; object entries that do are dropped.
    /// Failing expressions are logged and count as undefined.
    pub async fn evaluate(&self, template: Option<&Value>, context: Option<&Value>) -> Option<Value> {
        let template = template?;
        let Some(context) = context else {
            return Some(template.clone());
        };
        self.walk(template, context, false).await.unwrap_or_default()
    }

    /// Evaluate a template, failing when any expression in it fails
    ///
    /// Lets callers tell a template that is undefined apart from one that faulted.
    pub async fn try_evaluate(&self, template: &Value, context: &Value) -> crate::Result<Option<Value>> {
        self.walk(template, context, true).await
    }

    fn walk<'a>(
        &'a self,
        template: &'a Value,
        context: &'a Value,
        strict: bool,
    ) -> BoxFuture<'a, crate::Result<Option<Value>>> {
        async move {
            match template {
                Value::String(expression) if strict => self.registry.evaluate(expression, context).await,
                Value::String(expression) => Ok(self.evaluate_expression(expression, context).await),
                Value::Array(items) => {
                    let results = join_all(
                        items
                            .iter()
                            .map(|item| self.walk(item, context, strict)),
                    )
                    .await;
                    let items = results
                        .into_iter()
                        .map(|result| result.map(|value| value.unwrap_or(Value::Null)))
                        .collect::<crate::Result<Vec<Value>>>()?;
                    Ok(Some(Value::Array(items)))
                }
                Value::Object(entries) => {
                    let results = join_all(
                        entries
                            .values()
                            .map(|item| self.walk(item, context, strict)),
                    )
                    .await;
                    let mut evaluated = Map::new();
                    for (key, result) in entries.keys().zip(results) {
                        if let Some(value) = result? {
                            evaluated.insert(key.clone(), value);
                        }
                    }
                    Ok(Some(Value::Object(evaluated)))
                }
                other => Ok(Some(other.clone())),
            }
        }
        .boxed()
    }

    /// Evaluate a single template string
    pub async fn evaluate_str(&self, template: &str, context: Option<&Value>) -> Option<Value> {
        match context {
            Some(context) => self.evaluate_expression(template, context).await,
            None => Some(Value::String(template.to_string())),
        }
    }

    /// Evaluate a template string, surfacing errors instead of logging them
    pub async fn try_evaluate_str(
        &self,
        template: &str,
        context: &Value,
    ) -> crate::Result<Option<Value>> {
        self.registry.evaluate(template, context).await
    }

    async fn evaluate_expression(&self, expression: &str, context: &Value) -> Option<Value> {
        match self.registry.evaluate(expression, context).await {
            Ok(value) => value,
            Err(err) => {
                log::warn!("Failed to evaluate template '{expression}': {err}");
                None
            }
        }
    }
}

/// Truthiness of an evaluation result
///
/// Undefined, `null`, `false`, zero, empty strings and empty containers are
/// false. The strings `"false"`, `"0"`, `"null"` and `"undefined"` are false as
/// well, since the default language always renders to a string.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => {
            !matches!(text.trim(), "" | "false" | "0" | "null" | "undefined")
        }
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(entries)) => !entries.is_empty(),
    }
}
