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

//! Swappable field renderers
//!
//! Renderers are looked up by fieldtype name. The reserved keys `_label`,
//! `_validation` and `_fieldcontainer` render the pieces every field shares;
//! `_fieldwrapper` is accepted as an alias of `_fieldcontainer`.

use crate::model::{FieldMetadata, FieldType};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

pub const LABEL_KEY: &str = "_label";
pub const VALIDATION_KEY: &str = "_validation";
pub const FIELD_CONTAINER_KEY: &str = "_fieldcontainer";
const FIELD_WRAPPER_ALIAS: &str = "_fieldwrapper";

/// Everything a renderer may look at
pub struct RenderContext<'a> {
    /// Value at the field's data path
    pub data: Option<&'a Value>,
    pub metadata: &'a FieldMetadata,
    /// Output of the field's own renderer, for the reserved keys
    pub body: &'a str,
    /// Rendered children, already wrapped in their containers
    pub children: &'a [String],
    /// Whether validation messages are shown
    pub show_validation: bool,
    /// Nesting depth, zero for root fields
    pub depth: usize,
}

impl RenderContext<'_> {
    fn label(&self) -> Option<String> {
        self.metadata.dynamic_settings.label.as_ref().map(text)
    }
}

/// Renders one piece of a field
pub trait FieldRenderer: Send + Sync {
    fn render(&self, context: &RenderContext<'_>) -> String;
}

impl<F> FieldRenderer for F
where
    F: Fn(&RenderContext<'_>) -> String + Send + Sync,
{
    fn render(&self, context: &RenderContext<'_>) -> String {
        self(context)
    }
}

/// Renderers keyed by fieldtype or reserved key
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    renderers: FxHashMap<String, Arc<dyn FieldRenderer>>,
}

impl ComponentRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain-text renderers for every built-in fieldtype
    pub fn text() -> Self {
        let mut registry = Self::new();
        registry.register(LABEL_KEY, TextLabel);
        registry.register(VALIDATION_KEY, TextValidation);
        registry.register(FIELD_CONTAINER_KEY, TextContainer);
        for fieldtype in [FieldType::Heading, FieldType::Html] {
            registry.register(fieldtype.as_str(), TextContent);
        }
        registry.register(FieldType::Checkbox.as_str(), TextCheckbox);
        for fieldtype in [FieldType::Select, FieldType::Radio] {
            registry.register(fieldtype.as_str(), TextChoice);
        }
        for fieldtype in [FieldType::Checkboxes, FieldType::Multiselect] {
            registry.register(fieldtype.as_str(), TextChoices);
        }
        registry.register(FieldType::Json.as_str(), TextJson);
        for fieldtype in [
            FieldType::Fieldset,
            FieldType::Pages,
            FieldType::Array,
        ] {
            registry.register(fieldtype.as_str(), TextGroup);
        }
        for fieldtype in [
            FieldType::Text,
            FieldType::Textarea,
            FieldType::Number,
            FieldType::Tel,
            FieldType::Date,
            FieldType::Datetime,
            FieldType::Time,
        ] {
            registry.register(fieldtype.as_str(), TextValue);
        }
        registry
    }

    /// Register or replace a renderer
    pub fn register(&mut self, key: impl Into<String>, renderer: impl FieldRenderer + 'static) {
        let key = key.into();
        let key = if key == FIELD_WRAPPER_ALIAS {
            FIELD_CONTAINER_KEY.to_string()
        } else {
            key
        };
        self.renderers.insert(key, Arc::new(renderer));
    }

    /// Renderer registered under a key
    pub fn get(&self, key: &str) -> Option<Arc<dyn FieldRenderer>> {
        let key = if key == FIELD_WRAPPER_ALIAS {
            FIELD_CONTAINER_KEY
        } else {
            key
        };
        self.renderers.get(key).cloned()
    }

    /// Renderer for a field: its custom component, its fieldtype, or the text renderer
    pub fn resolve(&self, metadata: &FieldMetadata) -> Option<Arc<dyn FieldRenderer>> {
        let definition = &metadata.definition;
        let custom = match definition.fieldtype {
            FieldType::Custom => definition.custom_component_key.as_deref(),
            _ => None,
        };
        custom
            .and_then(|key| self.get(key))
            .or_else(|| self.get(definition.fieldtype.as_str()))
            .or_else(|| {
                log::debug!(
                    "No renderer for '{}', falling back to text",
                    definition.fieldtype.as_str()
                );
                self.get(FieldType::Text.as_str())
            })
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn option_label(context: &RenderContext<'_>, value: &Value) -> String {
    context
        .metadata
        .dynamic_settings
        .options
        .as_ref()
        .and_then(|options| options.iter().find(|option| option.value == *value))
        .map(|option| option.label.clone())
        .unwrap_or_else(|| text(value))
}

struct TextLabel;

impl FieldRenderer for TextLabel {
    fn render(&self, context: &RenderContext<'_>) -> String {
        match context.label() {
            Some(label) if !context.metadata.definition.hide_label && !label.is_empty() => {
                format!("{label}: ")
            }
            _ => String::new(),
        }
    }
}

struct TextValidation;

impl FieldRenderer for TextValidation {
    fn render(&self, context: &RenderContext<'_>) -> String {
        let validations = &context.metadata.validations;
        if !context.show_validation || validations.is_valid {
            return String::new();
        }
        format!(" [!{}]", validations.error_message.as_deref().unwrap_or_default())
    }
}

/// Indented line with label, body and validation, followed by the children
struct TextContainer;

impl FieldRenderer for TextContainer {
    fn render(&self, context: &RenderContext<'_>) -> String {
        let indent = "  ".repeat(context.depth);
        let label = TextLabel.render(context);
        let validation = TextValidation.render(context);
        let mut lines = vec![format!("{indent}- {label}{}{validation}", context.body)];
        lines.extend(context.children.iter().cloned());
        lines.join("\n")
    }
}

struct TextValue;

impl FieldRenderer for TextValue {
    fn render(&self, context: &RenderContext<'_>) -> String {
        context.data.map(text).unwrap_or_default()
    }
}

struct TextContent;

impl FieldRenderer for TextContent {
    fn render(&self, context: &RenderContext<'_>) -> String {
        context
            .metadata
            .dynamic_settings
            .content
            .as_ref()
            .map(text)
            .unwrap_or_default()
    }
}

struct TextCheckbox;

impl FieldRenderer for TextCheckbox {
    fn render(&self, context: &RenderContext<'_>) -> String {
        let checked = matches!(context.data, Some(Value::Bool(true)));
        if checked { "[x]" } else { "[ ]" }.to_string()
    }
}

struct TextChoice;

impl FieldRenderer for TextChoice {
    fn render(&self, context: &RenderContext<'_>) -> String {
        match context.data {
            None | Some(Value::Null) => String::new(),
            Some(value) => option_label(context, value),
        }
    }
}

struct TextChoices;

impl FieldRenderer for TextChoices {
    fn render(&self, context: &RenderContext<'_>) -> String {
        match context.data {
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| option_label(context, value))
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        }
    }
}

struct TextJson;

impl FieldRenderer for TextJson {
    fn render(&self, context: &RenderContext<'_>) -> String {
        context.data.map(Value::to_string).unwrap_or_default()
    }
}

/// Groups show nothing on their own line; their children follow
struct TextGroup;

impl FieldRenderer for TextGroup {
    fn render(&self, _context: &RenderContext<'_>) -> String {
        String::new()
    }
}
