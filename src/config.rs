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

//! Engine configuration
//!
//! Timing knobs for recomputation and validation, and the size of the parsed
//! expression cache.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration for a [`Form`](crate::Form)
///
/// # Examples
///
/// ```rust
/// use formflow::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_debounce_ms(100)
///     .with_validation_max_time_ms(5000)
///     .with_expression_cache_size(1024);
///
/// assert_eq!(config.debounce().as_millis(), 100);
/// assert!(config.validate().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Debounce window for dependency-driven recomputation (milliseconds).
    /// Default: 50
    pub debounce_ms: u64,

    /// Debounce the first call of a burst too, instead of running it
    /// immediately. Default: false
    pub delayed_debounce: bool,

    /// Upper bound for one form validation (milliseconds). Default: 2000
    pub validation_max_time_ms: u64,

    /// Polling interval while waiting for fields to settle (milliseconds).
    /// Default: 20
    pub validation_check_interval_ms: u64,

    /// Number of parsed JSONata expressions kept in the LRU cache. Default: 256
    pub expression_cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            delayed_debounce: false,
            validation_max_time_ms: 2000,
            validation_check_interval_ms: 20,
            expression_cache_size: 256,
        }
    }
}

impl EngineConfig {
    /// Create new configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    /// Debounce the first call of a burst as well
    pub fn with_delayed_debounce(mut self, delayed: bool) -> Self {
        self.delayed_debounce = delayed;
        self
    }

    /// Set the validation time budget
    pub fn with_validation_max_time_ms(mut self, max_time_ms: u64) -> Self {
        self.validation_max_time_ms = max_time_ms;
        self
    }

    /// Set the validation polling interval
    pub fn with_validation_check_interval_ms(mut self, interval_ms: u64) -> Self {
        self.validation_check_interval_ms = interval_ms;
        self
    }

    /// Set the expression cache capacity
    pub fn with_expression_cache_size(mut self, size: usize) -> Self {
        self.expression_cache_size = size;
        self
    }

    /// Debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Validation budget as a duration
    pub fn validation_max_time(&self) -> Duration {
        Duration::from_millis(self.validation_max_time_ms)
    }

    /// Polling interval as a duration
    pub fn validation_check_interval(&self) -> Duration {
        Duration::from_millis(self.validation_check_interval_ms)
    }

    /// Configuration for tests: no debounce window, short budgets
    pub fn for_testing() -> Self {
        Self {
            debounce_ms: 0,
            delayed_debounce: false,
            validation_max_time_ms: 500,
            validation_check_interval_ms: 5,
            expression_cache_size: 32,
        }
    }

    /// Check configuration values, returning warnings for problematic settings
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.validation_check_interval_ms == 0 {
            warnings.push("validation_check_interval_ms is 0 - polling will spin".to_string());
        } else if self.validation_check_interval_ms > self.validation_max_time_ms {
            warnings.push(
                "validation_check_interval_ms exceeds validation_max_time_ms - validation polls once"
                    .to_string(),
            );
        }

        if self.expression_cache_size == 0 {
            warnings.push(
                "expression_cache_size is 0 - a single entry cache will be used".to_string(),
            );
        }

        if self.debounce_ms > self.validation_max_time_ms {
            warnings.push(
                "debounce_ms exceeds validation_max_time_ms - validation may time out while recomputing"
                    .to_string(),
            );
        }

        warnings
    }
}
