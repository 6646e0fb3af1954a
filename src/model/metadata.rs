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

//! Runtime metadata of mounted fields

use super::definition::{FieldOption, FormattedFieldDefinition};
use super::settings::ValidationIssue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a mounted field instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(Uuid);

impl FieldId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing uuid
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index path of a field among its siblings, root first. Sorting by it gives
/// depth-first declaration order.
pub type TreePosition = SmallVec<[usize; 4]>;

/// Result of one validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    /// The declared expression
    pub expression: String,
    /// Whether the expression evaluated truthy
    pub is_valid: bool,
    /// Evaluated error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Validation state of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationState {
    /// All validations hold
    pub is_valid: bool,
    /// Message of the first failing validation
    pub error_message: Option<String>,
    /// Expressions evaluated by the last completed pass; `None` before the first pass
    pub previous_result: Option<Vec<String>>,
    /// Per-rule results of the last completed pass
    pub checks: Vec<ValidationCheck>,
}

impl Default for ValidationState {
    fn default() -> Self {
        Self {
            is_valid: true,
            error_message: None,
            previous_result: None,
            checks: Vec::new(),
        }
    }
}

impl ValidationState {
    /// Build the state from the checks of a completed pass
    pub fn from_checks(checks: Vec<ValidationCheck>) -> Self {
        let failing = checks.iter().find(|c| !c.is_valid);
        Self {
            is_valid: failing.is_none(),
            error_message: failing.map(|c| c.error_message.clone().unwrap_or_default()),
            previous_result: Some(checks.iter().map(|c| c.expression.clone()).collect()),
            checks,
        }
    }
}

/// Condition state of a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionState {
    /// All conditions hold
    pub is_passed: bool,
    /// Per-condition results of the last completed pass; `None` before the first pass
    pub previous_result: Option<Vec<bool>>,
}

/// Values re-derived on every recomputation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicSettings {
    /// Evaluated label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
    /// Evaluated placeholder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Value>,
    /// Evaluated content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Resolved options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    /// Evaluated fieldtype settings
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub settings: IndexMap<String, Value>,
}

/// Runtime metadata of one mounted field
#[derive(Debug, Clone, Serialize)]
pub struct FieldMetadata {
    /// Identifier in the metadata store
    pub field_id: FieldId,
    /// Identifier of the parent field, `None` for root fields
    pub parent_field_id: Option<FieldId>,
    /// Position in the field tree
    pub tree_position: TreePosition,
    /// Normalized definition
    pub definition: Arc<FormattedFieldDefinition>,
    /// Value found at `data_path` when the field mounted
    pub init_value: Option<Value>,
    /// Evaluated default (or the fieldtype default)
    pub default_value: Option<Value>,
    /// Validation state
    pub validations: ValidationState,
    /// Condition state
    pub conditions: ConditionState,
    /// Derived display values
    pub dynamic_settings: DynamicSettings,
    /// A dependency changed and the recomputation has not completed yet
    pub dependencies_changed: bool,
}

impl FieldMetadata {
    /// Create metadata for a freshly mounted field
    pub fn new(
        definition: Arc<FormattedFieldDefinition>,
        parent_field_id: Option<FieldId>,
        tree_position: TreePosition,
    ) -> Self {
        Self {
            field_id: FieldId::generate(),
            parent_field_id,
            tree_position,
            definition,
            init_value: None,
            default_value: None,
            validations: ValidationState::default(),
            conditions: ConditionState::default(),
            dynamic_settings: DynamicSettings::default(),
            dependencies_changed: false,
        }
    }

    /// State path of the field
    pub fn state_path(&self) -> &str {
        &self.definition.state_path
    }

    /// Data path of the field
    pub fn data_path(&self) -> &str {
        &self.definition.data_path
    }

    /// The field reflects its current dependency values with no pending recomputation
    pub fn is_settled(&self) -> bool {
        if self.dependencies_changed {
            return false;
        }
        match &self.validations.previous_result {
            Some(evaluated) => {
                evaluated.len() == self.definition.validations.len()
                    && evaluated
                        .iter()
                        .zip(&self.definition.validations)
                        .all(|(done, declared)| *done == declared.expression)
            }
            None => false,
        }
    }

    /// The field's conditions passed and it takes part in rendering and validity
    pub fn is_visible(&self) -> bool {
        self.conditions.is_passed
    }

    /// Validation issue of a visible, invalid field
    pub fn issue(&self) -> Option<ValidationIssue> {
        if !self.is_visible() || self.validations.is_valid {
            return None;
        }
        Some(ValidationIssue {
            state_path: self.state_path().to_string(),
            error_message: self.validations.error_message.clone().unwrap_or_default(),
        })
    }
}
