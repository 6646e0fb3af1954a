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

//! Mounted form instances

use crate::components::{ComponentRegistry, FIELD_CONTAINER_KEY, RenderContext};
use crate::config::EngineConfig;
use crate::context::SharedContext;
use crate::error::Result;
use crate::model::{
    FieldId, FieldMetadata, FormConfig, FormSettings, FormValidationResult, TreePosition,
};
use crate::scheduler::DependencyScheduler;
use crate::store::FieldMetadataStore;
use crate::template::TemplateEvaluator;
use crate::validation::ValidationAggregator;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

/// Builder for a [`Form`]
///
/// # Examples
///
/// ```rust
/// use formflow::{EngineConfig, FieldDefinition, FieldType, FormBuilder, FormConfig};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = FormConfig::with_fields(vec![
///     FieldDefinition::new(FieldType::Text, "Name").with_validation("{{data.name}}", "Required"),
/// ]);
/// let form = FormBuilder::new(config)
///     .with_engine_config(EngineConfig::for_testing())
///     .mount(json!({}))
///     .await
///     .unwrap();
///
/// let result = form.validate().await;
/// assert!(!result.is_valid);
/// assert_eq!(result.issues[0].state_path, "name");
/// # }
/// ```
pub struct FormBuilder {
    config: FormConfig,
    engine: EngineConfig,
    evaluator: Option<TemplateEvaluator>,
    components: ComponentRegistry,
    extra: IndexMap<String, Value>,
}

impl FormBuilder {
    pub fn new(config: FormConfig) -> Self {
        Self {
            config,
            engine: EngineConfig::default(),
            evaluator: None,
            components: ComponentRegistry::text(),
            extra: IndexMap::new(),
        }
    }

    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Use a custom evaluator, e.g. one with extra languages registered
    pub fn with_evaluator(mut self, evaluator: TemplateEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = components;
        self
    }

    /// Add a top-level context key next to `data`
    pub fn with_context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Mount every root field against the initial data
    pub async fn mount(self, data: Value) -> Result<Form> {
        for warning in self.engine.validate() {
            log::warn!("{warning}");
        }

        let form_id = self
            .config
            .form_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let context = SharedContext::new(Some(&form_id), self.config.show_validation, data);
        for (key, value) in self.extra {
            context.set_extra(&key, value);
        }

        let evaluator = self
            .evaluator
            .unwrap_or_else(|| TemplateEvaluator::with_config(&self.engine));
        let store = Arc::new(FieldMetadataStore::new());
        let scheduler = DependencyScheduler::new(
            evaluator,
            context.clone(),
            Arc::clone(&store),
            self.engine.clone(),
        );

        let mut settings = FormSettings::new(
            form_id.clone(),
            self.engine.validation_max_time(),
            self.engine.validation_check_interval(),
        );
        settings.show_validation(self.config.show_validation);

        let roots = scheduler
            .mount_group(&self.config.fields, None, None, &TreePosition::new())
            .await?;
        log::debug!("Mounted form '{form_id}' with {} root field(s)", roots.len());

        Ok(Form {
            config: self.config,
            engine: self.engine,
            context,
            aggregator: ValidationAggregator::new(Arc::clone(&store)),
            store,
            scheduler,
            components: self.components,
            settings: Mutex::new(settings),
        })
    }
}

/// A mounted form instance
pub struct Form {
    config: FormConfig,
    engine: EngineConfig,
    context: SharedContext,
    store: Arc<FieldMetadataStore>,
    scheduler: DependencyScheduler,
    aggregator: ValidationAggregator,
    components: ComponentRegistry,
    settings: Mutex<FormSettings>,
}

impl Form {
    pub fn form_id(&self) -> String {
        self.settings.lock().form_id.clone()
    }

    /// Source configuration
    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn store(&self) -> &Arc<FieldMetadataStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &DependencyScheduler {
        &self.scheduler
    }

    /// Copy of the data tree
    pub fn data(&self) -> Value {
        self.context.data()
    }

    /// Value at a data path
    pub fn value(&self, data_path: &str) -> Option<Value> {
        self.context.get_data(data_path)
    }

    /// Write a value and schedule recomputation of every field depending on it
    ///
    /// Returns the number of fields scheduled.
    pub fn set_value(&self, data_path: &str, value: Value) -> usize {
        self.context.set_data(data_path, value);
        self.scheduler.notify_changed()
    }

    /// Remove a value and schedule recomputation of every field depending on it
    pub fn remove_value(&self, data_path: &str) -> usize {
        self.context.remove_data(data_path);
        self.scheduler.notify_changed()
    }

    /// Wait until no field has a pending recomputation
    ///
    /// Gives up after the validation budget and returns whether the form settled.
    pub async fn settle(&self) -> bool {
        let deadline = Instant::now() + self.engine.validation_max_time();
        loop {
            if self.scheduler.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.engine.validation_check_interval()).await;
        }
    }

    /// Wait for the fields to settle and compute the form verdict
    pub async fn validate(&self) -> FormValidationResult {
        let mut settings = self.settings.lock().clone();
        let result = self.aggregator.validate(&mut settings).await;

        let mut current = self.settings.lock();
        let is_show = current.validations.is_show;
        current.validations = settings.validations;
        current.validations.is_show = is_show;
        result
    }

    /// Show or hide validation messages; validity is unaffected
    pub fn show_validation(&self, show: bool) {
        self.settings.lock().show_validation(show);
        self.context.set_show_validation(show);
        self.scheduler.notify_changed();
    }

    /// Copy of the form settings
    pub fn settings(&self) -> FormSettings {
        self.settings.lock().clone()
    }

    /// All mounted fields in tree order
    pub fn fields(&self) -> Vec<FieldMetadata> {
        self.store.all()
    }

    /// The field mounted at a state path
    pub fn field(&self, state_path: &str) -> Option<FieldMetadata> {
        self.store.find_by_state_path(state_path)
    }

    /// Render visible fields as indented text using the component registry
    pub fn render(&self) -> String {
        let show_validation = self.settings.lock().validations.is_show;
        let data = self.context.data();
        self.store
            .roots()
            .iter()
            .filter(|field| field.is_visible())
            .map(|field| self.render_field(field, &data, show_validation, 0))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_field(
        &self,
        metadata: &FieldMetadata,
        data: &Value,
        show_validation: bool,
        depth: usize,
    ) -> String {
        let children: Vec<String> = self
            .store
            .children_of(metadata.field_id)
            .iter()
            .filter(|child| child.is_visible())
            .map(|child| self.render_field(child, data, show_validation, depth + 1))
            .collect();

        let value = crate::path::get_path(data, metadata.data_path());
        let body = self
            .components
            .resolve(metadata)
            .map(|renderer| {
                renderer.render(&RenderContext {
                    data: value,
                    metadata,
                    body: "",
                    children: &[],
                    show_validation,
                    depth,
                })
            })
            .unwrap_or_default();

        let context = RenderContext {
            data: value,
            metadata,
            body: &body,
            children: &children,
            show_validation,
            depth,
        };
        match self.components.get(FIELD_CONTAINER_KEY) {
            Some(container) => container.render(&context),
            None => {
                let mut lines = vec![body.clone()];
                lines.extend(children.iter().cloned());
                lines.join("\n")
            }
        }
    }

    /// Stop all recomputation and drop every field; the data tree is left as is
    pub fn dispose(&self) {
        self.scheduler.unwatch_all();
        self.store.clear();
        log::debug!("Disposed form '{}'", self.form_id());
    }

    /// Id of the field mounted at a state path
    pub fn field_id(&self, state_path: &str) -> Option<FieldId> {
        self.field(state_path).map(|field| field.field_id)
    }
}
