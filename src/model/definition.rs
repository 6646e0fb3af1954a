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

//! Declarative field definitions as authored by form integrators

use super::dynamic::Dynamic;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::ops::Deref;

/// Kind of field, used to pick the renderer and the default value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    /// Repeated group of fields, one per array item
    Array,
    /// Single boolean checkbox
    Checkbox,
    /// Multiple choice checkboxes
    Checkboxes,
    /// Rendered by a component registered under `custom_component_key`
    Custom,
    /// Date input
    Date,
    /// Date and time input
    Datetime,
    /// Group of nested fields writing into an object
    Fieldset,
    /// Static heading
    Heading,
    /// Static html content
    Html,
    /// Raw JSON editor
    Json,
    /// Multi-select dropdown
    Multiselect,
    /// Numeric input
    Number,
    /// Paged group of fields
    Pages,
    /// Radio group
    Radio,
    /// Single-select dropdown
    Select,
    /// Telephone input
    Tel,
    /// Single-line text input
    #[default]
    Text,
    /// Multi-line text input
    Textarea,
    /// Time input
    Time,
    /// Any fieldtype not known to the engine, looked up verbatim in the component registry
    Other(String),
}

impl FieldType {
    /// Parse a fieldtype name. Unknown names are kept as [`FieldType::Other`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "array" => Self::Array,
            "checkbox" => Self::Checkbox,
            "checkboxes" => Self::Checkboxes,
            "custom" => Self::Custom,
            "date" => Self::Date,
            "datetime" => Self::Datetime,
            "fieldset" => Self::Fieldset,
            "heading" => Self::Heading,
            "html" => Self::Html,
            "json" => Self::Json,
            "multiselect" => Self::Multiselect,
            "number" => Self::Number,
            "pages" => Self::Pages,
            "radio" => Self::Radio,
            "select" => Self::Select,
            "tel" => Self::Tel,
            "text" => Self::Text,
            "textarea" => Self::Textarea,
            "time" => Self::Time,
            other => Self::Other(other.to_string()),
        }
    }

    /// The registry key of this fieldtype
    pub fn as_str(&self) -> &str {
        match self {
            Self::Array => "array",
            Self::Checkbox => "checkbox",
            Self::Checkboxes => "checkboxes",
            Self::Custom => "custom",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Fieldset => "fieldset",
            Self::Heading => "heading",
            Self::Html => "html",
            Self::Json => "json",
            Self::Multiselect => "multiselect",
            Self::Number => "number",
            Self::Pages => "pages",
            Self::Radio => "radio",
            Self::Select => "select",
            Self::Tel => "tel",
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Time => "time",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// A condition gating whether a field renders. Truthy result means the condition is met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Template expression for the condition
    pub expression: String,
}

/// A validation rule. Truthy result means the value is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Template expression for the validation
    pub expression: String,
    /// Error message shown when the validation fails (itself a template)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One selectable option of a select/radio/checkboxes field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    /// Text shown to the user
    pub label: String,
    /// Value written to the data tree when selected
    pub value: Value,
}

/// Declarative description of one form field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDefinition {
    /// Determines the component to render
    pub fieldtype: FieldType,
    /// Determines where the field writes data when `data_path` is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where in `context.data` the value is written, relative to the parent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
    /// Written to `data_path` at mount when no value exists yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Re-evaluated whenever the dependencies change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
    /// Hide the label even when one is defined
    pub hide_label: bool,
    /// Re-evaluated whenever the dependencies change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Value>,
    /// Re-evaluated whenever the dependencies change (headings, html)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Context keys whose change triggers re-evaluation
    #[serde(alias = "dependencies", skip_serializing_if = "IndexSet::is_empty")]
    pub template_dependencies: IndexSet<String>,
    /// Evaluated first; the results are visible to the other expressions of the field
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub template_context: IndexMap<String, Value>,
    /// Every condition must hold for the field to render
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Keep the field's data when its conditions fail
    pub keep_data_on_conditions_failed: bool,
    /// Every validation must hold for the field to be valid
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<Validation>,
    /// Nested child definitions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDefinition>,
    /// Config applied to every array item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_item_config: Option<Box<FormConfig>>,
    /// One config per page
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<FormConfig>,
    /// Registry key of the component rendering a `custom` field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_component_key: Option<String>,
    /// Literal options or an expression producing them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Dynamic<Vec<FieldOption>>>,
    /// Fieldtype specific settings, evaluated with the other derived values
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub settings: IndexMap<String, Value>,
}

impl FieldDefinition {
    /// Create a definition with the given fieldtype and name
    pub fn new(fieldtype: FieldType, name: impl Into<String>) -> Self {
        Self {
            fieldtype,
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set an explicit data path
    pub fn with_data_path(mut self, data_path: impl Into<String>) -> Self {
        self.data_path = Some(data_path.into());
        self
    }

    /// Set the default template
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the label template
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(Value::String(label.into()));
        self
    }

    /// Add a dependency key
    pub fn with_dependency(mut self, key: impl Into<String>) -> Self {
        self.template_dependencies.insert(key.into());
        self
    }

    /// Add a condition
    pub fn with_condition(mut self, expression: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            expression: expression.into(),
        });
        self
    }

    /// Add a validation
    pub fn with_validation(
        mut self,
        expression: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        self.validations.push(Validation {
            expression: expression.into(),
            error_message: Some(error_message.into()),
        });
        self
    }

    /// Keep data when conditions fail
    pub fn keep_data(mut self) -> Self {
        self.keep_data_on_conditions_failed = true;
        self
    }

    /// Add a nested child field
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Expressions of the declared validations, in declaration order
    pub fn validation_expressions(&self) -> Vec<String> {
        self.validations
            .iter()
            .map(|v| v.expression.clone())
            .collect()
    }
}

/// Configuration of a whole form (also used for array items and pages)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Unique identifier of the form, generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    /// Whether validation messages should be shown
    pub show_validation: bool,
    /// Top level fields
    pub fields: Vec<FieldDefinition>,
}

impl FormConfig {
    /// Create a config holding the given fields
    pub fn with_fields(fields: Vec<FieldDefinition>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }
}

/// A field definition after path normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedFieldDefinition {
    /// The authored definition
    #[serde(flatten)]
    pub definition: FieldDefinition,
    /// Resolved absolute data path (relative to `context.data`)
    ///
    /// Serialized as `resolved_data_path`; `data_path` keeps the authored value.
    #[serde(rename = "resolved_data_path")]
    pub data_path: String,
    /// The final key of the potentially nested data path
    pub data_key: String,
    /// Where the field's state lives
    pub state_path: String,
    /// State path of the parent field (empty for root fields)
    pub parent_state_path: String,
    /// Data path of the parent field (empty for root fields)
    pub parent_data_path: String,
}

impl Deref for FormattedFieldDefinition {
    type Target = FieldDefinition;

    fn deref(&self) -> &Self::Target {
        &self.definition
    }
}
