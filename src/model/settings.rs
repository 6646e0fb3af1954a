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

//! Form level settings and the validation verdict

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A failing, visible field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// State path of the failing field
    pub state_path: String,
    /// Evaluated error message
    pub error_message: String,
}

/// Outcome of a form level validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormValidationResult {
    /// All visible fields in the form are valid
    pub is_valid: bool,
    /// Validation could not settle in time
    pub is_validation_timeout: bool,
    /// Validation failed to complete
    pub is_validation_failed: bool,
    /// Issues in field-tree order
    pub issues: Vec<ValidationIssue>,
}

/// Validation settings and last verdict of a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormValidationSettings {
    /// Whether validation messages are shown. Never changes the computed validity.
    pub is_show: bool,
    /// Last computed validity
    pub is_valid: bool,
    /// Polling budget
    #[serde(with = "duration_ms")]
    pub max_time: Duration,
    /// Delay between two polls
    #[serde(with = "duration_ms")]
    pub check_interval: Duration,
    /// Last validation failed to complete
    pub is_failed: bool,
    /// Last validation ran out of time
    pub is_timeout: bool,
    /// Issues of the last validation
    pub issues: Vec<ValidationIssue>,
    /// How long the last validation took
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl FormValidationSettings {
    /// Create settings with the given polling budget
    pub fn new(max_time: Duration, check_interval: Duration) -> Self {
        Self {
            is_show: false,
            is_valid: false,
            max_time,
            check_interval,
            is_failed: false,
            is_timeout: false,
            issues: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}

/// Runtime settings of one form instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSettings {
    /// Identifier of the form
    pub form_id: String,
    /// Validation settings and last verdict
    pub validations: FormValidationSettings,
}

impl FormSettings {
    /// Create settings for a form
    pub fn new(form_id: impl Into<String>, max_time: Duration, check_interval: Duration) -> Self {
        Self {
            form_id: form_id.into(),
            validations: FormValidationSettings::new(max_time, check_interval),
        }
    }

    /// Toggle visibility of validation messages
    pub fn show_validation(&mut self, show: bool) {
        self.validations.is_show = show;
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
