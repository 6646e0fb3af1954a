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

//! Edge-triggered visibility and data retention

use crate::context::SharedContext;
use crate::error::Result;
use crate::model::FieldId;
use crate::store::FieldMetadataStore;
use std::sync::Arc;

/// What a condition pass changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    /// Visibility is the same as after the previous pass
    Unchanged,
    /// The field became visible, or passed on its first evaluation
    Passed,
    /// The field became hidden, or failed on its first evaluation
    Failed,
}

/// Result of [`ConditionGate::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    pub transition: GateTransition,
    /// The gate wrote to or pruned the data tree
    pub data_changed: bool,
}

/// Applies condition results to a field's visibility and data
#[derive(Clone)]
pub struct ConditionGate {
    context: SharedContext,
    store: Arc<FieldMetadataStore>,
}

impl ConditionGate {
    pub fn new(context: SharedContext, store: Arc<FieldMetadataStore>) -> Self {
        Self { context, store }
    }

    /// Record the condition results of a pass and act on a visibility change
    ///
    /// A field passes when every condition holds; a field with no conditions always
    /// passes. On a pass transition an undefined value is replaced by the field's
    /// default. On a fail transition the value is pruned unless the field keeps its
    /// data.
    pub fn apply(&self, field_id: FieldId, results: Vec<bool>) -> Result<GateOutcome> {
        let is_passed = results.iter().all(|passed| *passed);
        let was_passed = self.store.update(field_id, |metadata| {
            let previous = metadata
                .conditions
                .previous_result
                .as_ref()
                .map(|_| metadata.conditions.is_passed);
            metadata.conditions.is_passed = is_passed;
            metadata.conditions.previous_result = Some(results);
            previous
        })?;

        if was_passed == Some(is_passed) {
            return Ok(GateOutcome {
                transition: GateTransition::Unchanged,
                data_changed: false,
            });
        }

        let metadata = self.store.get(field_id)?;
        let data_path = metadata.data_path();
        if is_passed {
            let mut data_changed = false;
            if self.context.get_data(data_path).is_none() {
                if let Some(default) = metadata.default_value.clone() {
                    log::debug!("Writing default for '{}'", metadata.state_path());
                    self.context.set_data(data_path, default);
                    data_changed = true;
                }
            }
            Ok(GateOutcome {
                transition: GateTransition::Passed,
                data_changed,
            })
        } else {
            let data_changed = !metadata.definition.keep_data_on_conditions_failed
                && self.context.remove_data(data_path).is_some();
            if data_changed {
                log::debug!("Pruned data of hidden field '{}'", metadata.state_path());
            }
            Ok(GateOutcome {
                transition: GateTransition::Failed,
                data_changed,
            })
        }
    }
}
