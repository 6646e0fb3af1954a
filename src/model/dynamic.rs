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

//! Literal-or-expression properties

use crate::error::Result;
use crate::template::TemplateEvaluator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A property that is either a literal value or an expression producing one
///
/// `Dynamic<String>` is not useful: every string deserializes as a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dynamic<T> {
    /// Value used as-is
    Literal(T),
    /// Template string resolved through the [`TemplateEvaluator`]
    Expression(String),
}

impl<T> Dynamic<T>
where
    T: DeserializeOwned + Clone,
{
    /// Resolve the property against a context
    ///
    /// Expressions whose result does not fit `T` resolve to `None`. A string result
    /// is parsed as JSON before giving up, since the default template language
    /// always produces strings.
    pub async fn resolve(
        &self,
        evaluator: &TemplateEvaluator,
        context: Option<&Value>,
    ) -> Option<T> {
        let resolved = match (self, context) {
            (_, Some(context)) => self.try_resolve(evaluator, context).await,
            (Dynamic::Literal(value), None) => Ok(Some(value.clone())),
            (Dynamic::Expression(expression), None) => {
                coerce(Value::String(expression.clone())).map(Some)
            }
        };
        resolved.unwrap_or_else(|err| {
            log::debug!("Failed to resolve expression: {err}");
            None
        })
    }

    /// Resolve the property, surfacing evaluation and shape errors
    pub async fn try_resolve(
        &self,
        evaluator: &TemplateEvaluator,
        context: &Value,
    ) -> Result<Option<T>> {
        match self {
            Dynamic::Literal(value) => Ok(Some(value.clone())),
            Dynamic::Expression(expression) => {
                match evaluator.try_evaluate_str(expression, context).await? {
                    Some(value) => coerce(value).map(Some),
                    None => Ok(None),
                }
            }
        }
    }
}

fn coerce<T: DeserializeOwned>(value: Value) -> Result<T> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(typed) => Ok(typed),
        Err(err) => match value {
            Value::String(text) => Ok(serde_json::from_str(&text)?),
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldOption;
    use serde_json::json;

    #[tokio::test]
    async fn test_literal_resolves_without_context() {
        let evaluator = TemplateEvaluator::new();
        let dynamic: Dynamic<bool> = Dynamic::Literal(true);
        assert_eq!(dynamic.resolve(&evaluator, None).await, Some(true));
    }

    #[tokio::test]
    async fn test_jsonata_expression_resolves_options() {
        let evaluator = TemplateEvaluator::new();
        let dynamic: Dynamic<Vec<FieldOption>> =
            Dynamic::Expression("[[jsonata]] choices".to_string());
        let context = json!({"choices": [{"label": "Yes", "value": true}]});

        let options = dynamic.resolve(&evaluator, Some(&context)).await.unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].label, "Yes");
    }

    #[tokio::test]
    async fn test_mustache_string_result_is_parsed() {
        let evaluator = TemplateEvaluator::new();
        let dynamic: Dynamic<Vec<i64>> = Dynamic::Expression("[{{a}}, {{b}}]".to_string());
        let context = json!({"a": 1, "b": 2});

        assert_eq!(
            dynamic.resolve(&evaluator, Some(&context)).await,
            Some(vec![1, 2])
        );
    }

    #[tokio::test]
    async fn test_mismatched_result_is_none() {
        let evaluator = TemplateEvaluator::new();
        let dynamic: Dynamic<Vec<i64>> = Dynamic::Expression("not json".to_string());
        assert_eq!(dynamic.resolve(&evaluator, Some(&json!({}))).await, None);
        assert!(matches!(
            dynamic.try_resolve(&evaluator, &json!({})).await,
            Err(crate::FormError::Serialization { .. })
        ));
    }
}
