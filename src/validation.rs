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

//! Form-level validation
//!
//! The aggregator never evaluates anything itself. It waits for every field in
//! the store to settle and then folds the per-field results.

use crate::model::{FieldId, FieldMetadata, FormSettings, FormValidationResult, ValidationIssue};
use crate::store::FieldMetadataStore;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tokio::time::Instant;

enum Poll {
    Settled(Vec<FieldMetadata>),
    Pending(Vec<FieldMetadata>),
    Fault(String),
}

/// Computes the form verdict from the metadata store
#[derive(Clone)]
pub struct ValidationAggregator {
    store: Arc<FieldMetadataStore>,
}

impl ValidationAggregator {
    pub fn new(store: Arc<FieldMetadataStore>) -> Self {
        Self { store }
    }

    /// Wait for all fields to settle, then compute the verdict
    ///
    /// Polls every `check_interval` until settled or `max_time` has elapsed.
    /// Only `settings.validations` is written, and never its `is_show` flag.
    pub async fn validate(&self, settings: &mut FormSettings) -> FormValidationResult {
        let started = Instant::now();
        let max_time = settings.validations.max_time;
        let check_interval = settings.validations.check_interval;

        let result = loop {
            match self.poll() {
                Poll::Fault(message) => {
                    log::warn!("Validation of '{}' failed: {message}", settings.form_id);
                    break FormValidationResult {
                        is_valid: false,
                        is_validation_timeout: false,
                        is_validation_failed: true,
                        issues: Vec::new(),
                    };
                }
                Poll::Settled(fields) => {
                    let issues = issues(&fields);
                    let is_valid = fields
                        .iter()
                        .filter(|field| field.is_visible())
                        .all(|field| field.validations.is_valid);
                    break FormValidationResult {
                        is_valid,
                        is_validation_timeout: false,
                        is_validation_failed: false,
                        issues,
                    };
                }
                Poll::Pending(fields) => {
                    if started.elapsed() >= max_time {
                        let settled: Vec<FieldMetadata> =
                            fields.into_iter().filter(FieldMetadata::is_settled).collect();
                        break FormValidationResult {
                            is_valid: false,
                            is_validation_timeout: true,
                            is_validation_failed: false,
                            issues: issues(&settled),
                        };
                    }
                    log::trace!(
                        "Waiting for {} field(s) of '{}' to settle",
                        fields.iter().filter(|field| !field.is_settled()).count(),
                        settings.form_id
                    );
                    tokio::time::sleep(check_interval).await;
                }
            }
        };

        let validations = &mut settings.validations;
        validations.is_valid = result.is_valid;
        validations.is_timeout = result.is_validation_timeout;
        validations.is_failed = result.is_validation_failed;
        validations.issues = result.issues.clone();
        validations.duration = started.elapsed();

        log::info!(
            "Validated '{}' in {:?}: valid={}, timeout={}, failed={}, issues={}",
            settings.form_id,
            validations.duration,
            result.is_valid,
            result.is_validation_timeout,
            result.is_validation_failed,
            result.issues.len()
        );
        result
    }

    fn poll(&self) -> Poll {
        let fields = self.store.all();
        let ids: FxHashSet<FieldId> = fields.iter().map(|field| field.field_id).collect();
        if let Some(orphan) = fields
            .iter()
            .find(|field| field.parent_field_id.is_some_and(|parent| !ids.contains(&parent)))
        {
            return Poll::Fault(format!(
                "parent of '{}' is not mounted",
                orphan.state_path()
            ));
        }

        if fields.iter().all(FieldMetadata::is_settled) {
            Poll::Settled(fields)
        } else {
            Poll::Pending(fields)
        }
    }
}

fn issues(fields: &[FieldMetadata]) -> Vec<ValidationIssue> {
    fields.iter().filter_map(FieldMetadata::issue).collect()
}
