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

//! Error types for form evaluation
//!
//! Most faults inside the engine are recovered locally (an expression that fails
//! to evaluate degrades to `None`), so these errors mostly travel between the
//! template languages and the evaluator, and out of the store for unknown ids.

use crate::jsonata::JsonataError;
use crate::model::FieldId;
use thiserror::Error;

/// Result type alias for form operations
pub type Result<T> = std::result::Result<T, FormError>;

/// Error type for form evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    /// Errors raised by the JSONata language
    #[error(transparent)]
    Jsonata(#[from] JsonataError),

    /// Malformed mustache template
    #[error("Template syntax error at position {position}: {message}")]
    TemplateSyntax {
        /// Byte offset in the template where the problem was found
        position: usize,
        /// Human-readable error message
        message: String,
    },

    /// A template language failed while evaluating
    ///
    /// Raised by custom languages registered on a [`crate::LanguageRegistry`].
    #[error("Template error in language '{language}': {message}")]
    TemplateError {
        /// Tag of the language that failed (`mustache` for the default language)
        language: String,
        /// Human-readable error message
        message: String,
    },

    /// A field id that is not registered in the metadata store
    #[error("Field '{field_id}' is not registered")]
    FieldNotFound {
        /// The missing field id
        field_id: FieldId,
    },

    /// JSON (de)serialization failures
    #[error("Serialization error: {message}")]
    Serialization {
        /// Message of the underlying serde error
        message: String,
    },
}

impl FormError {
    /// Create a template syntax error
    pub fn template_syntax(position: usize, message: impl Into<String>) -> Self {
        Self::TemplateSyntax {
            position,
            message: message.into(),
        }
    }

    /// Create a template evaluation error
    pub fn template_error(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateError {
            language: language.into(),
            message: message.into(),
        }
    }

    /// Create a field-not-found error
    pub fn field_not_found(field_id: FieldId) -> Self {
        Self::FieldNotFound { field_id }
    }
}

impl From<serde_json::Error> for FormError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
