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

//! JSONata expression language
//!
//! A subset of JSONata sufficient for form authoring: path navigation with
//! array mapping, predicates, constructors, arithmetic, comparison, boolean
//! logic, conditionals and a small function library.
//!
//! ```rust
//! use serde_json::json;
//!
//! let result = formflow::jsonata::evaluate("$sum(items.price)", &json!({
//!     "items": [{"price": 2}, {"price": 3}]
//! }))
//! .unwrap();
//! assert_eq!(result, Some(json!(5)));
//! ```

pub mod ast;
mod error;
mod evaluator;
pub mod functions;
pub mod parser;
mod span;
pub mod tokenizer;

pub use ast::{BinaryOperator, ExpressionNode};
pub use error::{JsonataError, JsonataResult};
pub use parser::parse;
pub use span::{Span, Spanned};

use crate::template::SyncTemplateLanguage;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Parse and evaluate an expression in one step
pub fn evaluate(expression: &str, input: &Value) -> JsonataResult<Option<Value>> {
    let ast = parse(expression)?;
    evaluator::evaluate(&ast, input)
}

/// Evaluate an already parsed expression
pub fn evaluate_ast(ast: &ExpressionNode, input: &Value) -> JsonataResult<Option<Value>> {
    evaluator::evaluate(ast, input)
}

/// The `jsonata` template language, caching parsed expressions
pub struct JsonataLanguage {
    cache: Mutex<LruCache<String, Arc<ExpressionNode>>>,
}

impl JsonataLanguage {
    /// Create the language with room for `cache_size` parsed expressions
    pub fn new(cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Parse an expression, reusing a cached AST when available
    pub fn compile(&self, expression: &str) -> JsonataResult<Arc<ExpressionNode>> {
        if let Some(ast) = self.cache.lock().get(expression) {
            return Ok(Arc::clone(ast));
        }
        let ast = Arc::new(parse(expression)?);
        self.cache
            .lock()
            .put(expression.to_string(), Arc::clone(&ast));
        Ok(ast)
    }

    /// Number of cached expressions
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }
}

impl SyncTemplateLanguage for JsonataLanguage {
    fn name(&self) -> &'static str {
        "jsonata"
    }

    fn evaluate(&self, expression: &str, context: &Value) -> crate::Result<Option<Value>> {
        let ast = self.compile(expression)?;
        Ok(evaluator::evaluate(&ast, context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_reuses_ast() {
        let language = JsonataLanguage::new(2);
        let first = language.compile("a.b").unwrap();
        let second = language.compile("a.b").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(language.cached(), 1);
    }

    #[test]
    fn test_cache_is_bounded() {
        let language = JsonataLanguage::new(2);
        for expression in ["a", "b", "c"] {
            language.compile(expression).unwrap();
        }
        assert_eq!(language.cached(), 2);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let language = JsonataLanguage::new(4);
        assert!(language.compile("a +").is_err());
        assert_eq!(language.cached(), 0);
    }

    #[test]
    fn test_language_contract() {
        let language = JsonataLanguage::new(4);
        let context = json!({"data": {"age": 20}});
        assert_eq!(
            language.evaluate("data.age >= 18", &context).unwrap(),
            Some(json!(true))
        );
        assert!(matches!(
            language.evaluate("data.age >", &context),
            Err(crate::FormError::Jsonata(_))
        ));
    }
}
