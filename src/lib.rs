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

//! Declarative form evaluation engine
//!
//! A form is a tree of field definitions. Mounting it against a JSON data tree
//! normalizes every field's paths, evaluates its templates (mustache by default,
//! JSONata behind a `[[jsonata]]` prefix), and keeps those derived values in
//! step with the data as it changes. Conditions decide which fields are visible
//! and whether their data is kept; validations roll up into a form verdict.

pub mod components;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod form;
pub mod jsonata;
pub mod model;
pub mod path;
pub mod scheduler;
pub mod store;
pub mod template;
pub mod validation;

pub use components::{ComponentRegistry, FieldRenderer, RenderContext};
pub use condition::{ConditionGate, GateOutcome, GateTransition};
pub use config::EngineConfig;
pub use context::SharedContext;
pub use error::{FormError, Result};
pub use form::{Form, FormBuilder};
pub use model::{
    Dynamic, FieldDefinition, FieldId, FieldMetadata, FieldOption, FieldType, FormConfig,
    FormSettings, FormValidationResult, FormattedFieldDefinition, ValidationIssue,
};
pub use path::PathResolver;
pub use scheduler::{Debouncer, DependencyScheduler};
pub use store::FieldMetadataStore;
pub use template::{LanguageRegistry, TemplateEvaluator, is_truthy};
pub use validation::ValidationAggregator;
