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

//! Empty values written for fields without a `default`

use super::definition::FieldType;
use serde_json::{Map, Value};

/// Value a field of the given type starts with. `None` means the type writes nothing.
pub fn default_value_for(fieldtype: &FieldType) -> Option<Value> {
    match fieldtype {
        FieldType::Array | FieldType::Checkboxes | FieldType::Multiselect => {
            Some(Value::Array(Vec::new()))
        }
        FieldType::Fieldset | FieldType::Pages => Some(Value::Object(Map::new())),
        FieldType::Number => Some(Value::Null),
        FieldType::Date
        | FieldType::Datetime
        | FieldType::Time
        | FieldType::Radio
        | FieldType::Select
        | FieldType::Text
        | FieldType::Textarea => Some(Value::String(String::new())),
        _ => None,
    }
}
