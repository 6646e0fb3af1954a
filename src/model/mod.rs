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

//! Data model: authored definitions, runtime metadata and form settings

mod defaults;
mod definition;
mod dynamic;
mod metadata;
mod settings;

pub use defaults::default_value_for;
pub use definition::{
    Condition, FieldDefinition, FieldOption, FieldType, FormConfig, FormattedFieldDefinition,
    Validation,
};
pub use dynamic::Dynamic;
pub use metadata::{
    ConditionState, DynamicSettings, FieldId, FieldMetadata, TreePosition, ValidationCheck,
    ValidationState,
};
pub use settings::{FormSettings, FormValidationResult, FormValidationSettings, ValidationIssue};
