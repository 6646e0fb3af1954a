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

//! Dependency tracking and field recomputation
//!
//! Every mounted field is watched on its declared dependency keys plus its own
//! `data.<data_path>`. [`DependencyScheduler::notify_changed`] diffs those keys
//! against the last snapshot and schedules a debounced recomputation for each
//! field whose inputs moved. A recomputation evaluates conditions, drives the
//! [`ConditionGate`], then evaluates display values and validations, and writes
//! the results back through [`FieldMetadataStore::update`].

use super::debounce::Debouncer;
use crate::condition::{ConditionGate, GateTransition};
use crate::config::EngineConfig;
use crate::context::SharedContext;
use crate::error::Result;
use crate::model::{
    DynamicSettings, FieldDefinition, FieldId, FieldMetadata, FieldOption, FieldType,
    FormattedFieldDefinition, TreePosition, ValidationCheck, ValidationState, default_value_for,
};
use crate::path::{ParentPaths, PathResolver, join};
use crate::store::FieldMetadataStore;
use crate::template::{TemplateEvaluator, is_truthy};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, join_all};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Display values from one pass; an `Err` entry keeps the value of the last good pass
struct SettingsPass {
    label: Result<Option<Value>>,
    placeholder: Result<Option<Value>>,
    content: Result<Option<Value>>,
    options: Result<Option<Vec<FieldOption>>>,
    settings: Vec<(String, Result<Option<Value>>)>,
}

impl SettingsPass {
    fn apply(self, state_path: &str, target: &mut DynamicSettings) {
        merge(state_path, "label", &mut target.label, self.label);
        merge(state_path, "placeholder", &mut target.placeholder, self.placeholder);
        merge(state_path, "content", &mut target.content, self.content);
        merge(state_path, "options", &mut target.options, self.options);
        for (key, result) in self.settings {
            match result {
                Ok(Some(value)) => {
                    target.settings.insert(key, value);
                }
                Ok(None) => {
                    target.settings.shift_remove(&key);
                }
                Err(err) => log::warn!("Keeping setting '{key}' of '{state_path}': {err}"),
            }
        }
    }
}

fn merge<T>(state_path: &str, name: &str, slot: &mut Option<T>, result: Result<Option<T>>) {
    match result {
        Ok(value) => *slot = value,
        Err(err) => log::warn!("Keeping {name} of '{state_path}': {err}"),
    }
}

struct Watch {
    keys: Vec<String>,
    snapshot: Mutex<Vec<Option<Value>>>,
    debouncer: Debouncer<(), ()>,
    /// Bumped on every detected change; a pass clears the dirty flag only if
    /// this did not move while it ran
    changes: AtomicU64,
}

struct Inner {
    evaluator: TemplateEvaluator,
    context: SharedContext,
    store: Arc<FieldMetadataStore>,
    gate: ConditionGate,
    config: EngineConfig,
    watches: DashMap<FieldId, Arc<Watch>>,
    locks: DashMap<FieldId, Arc<tokio::sync::Mutex<()>>>,
}

/// Mounts fields and keeps their derived values in step with the context
#[derive(Clone)]
pub struct DependencyScheduler {
    inner: Arc<Inner>,
}

impl DependencyScheduler {
    pub fn new(
        evaluator: TemplateEvaluator,
        context: SharedContext,
        store: Arc<FieldMetadataStore>,
        config: EngineConfig,
    ) -> Self {
        let gate = ConditionGate::new(context.clone(), Arc::clone(&store));
        Self {
            inner: Arc::new(Inner {
                evaluator,
                context,
                store,
                gate,
                config,
                watches: DashMap::new(),
                locks: DashMap::new(),
            }),
        }
    }

    /// Mount a normalized field and its visible descendants
    ///
    /// Records the initial value, evaluates the default, starts watching the
    /// field's dependencies and runs the first recomputation.
    pub async fn mount(
        &self,
        definition: FormattedFieldDefinition,
        parent: Option<FieldId>,
        tree_position: TreePosition,
    ) -> Result<FieldId> {
        self.inner.mount(definition, parent, tree_position).await
    }

    /// Mount a sibling group, normalizing its paths first
    pub async fn mount_group(
        &self,
        definitions: &[FieldDefinition],
        parent: Option<FieldId>,
        paths: Option<&ParentPaths>,
        prefix: &TreePosition,
    ) -> Result<Vec<FieldId>> {
        self.inner
            .mount_group(definitions.to_vec(), parent, paths.cloned(), prefix.clone())
            .await
    }

    /// Unmount a field and its descendants, pruning data unless kept
    pub async fn unmount(&self, field_id: FieldId) -> Result<()> {
        self.inner.unmount(field_id).await
    }

    /// Recompute a field now, bypassing the debouncer
    pub async fn recompute(&self, field_id: FieldId) -> Result<()> {
        self.inner.recompute(field_id).await
    }

    /// Mount or unmount array items so they match the array's data
    pub async fn sync_array(&self, field_id: FieldId) -> Result<()> {
        self.inner.sync_array(field_id).await
    }

    /// Diff every watched field's dependency values against its last snapshot
    ///
    /// Changed fields are marked dirty and a debounced recomputation is spawned
    /// for each of them. Returns the number of fields scheduled.
    pub fn notify_changed(&self) -> usize {
        self.inner.notify_changed()
    }

    /// Stop tracking a field without unmounting it
    pub fn unwatch(&self, field_id: FieldId) {
        self.inner.unwatch(field_id);
    }

    /// Stop tracking every field
    pub fn unwatch_all(&self) {
        self.inner.watches.clear();
        self.inner.locks.clear();
    }

    /// Dependency keys a field is watched on
    pub fn watched_keys(&self, field_id: FieldId) -> Option<Vec<String>> {
        self.inner
            .watches
            .get(&field_id)
            .map(|watch| watch.keys.clone())
    }

    /// Every field is settled
    pub fn is_idle(&self) -> bool {
        self.inner.store.all().iter().all(FieldMetadata::is_settled)
    }
}

impl Inner {
    fn mount(
        self: &Arc<Self>,
        definition: FormattedFieldDefinition,
        parent: Option<FieldId>,
        tree_position: TreePosition,
    ) -> BoxFuture<'static, Result<FieldId>> {
        let inner = Arc::clone(self);
        async move {
            let snapshot = inner.context.snapshot();
            let init_value = inner.context.get_data(&definition.data_path);
            let default_value = inner
                .evaluator
                .evaluate(definition.default.as_ref(), Some(&snapshot))
                .await
                .or_else(|| default_value_for(&definition.fieldtype));

            let mut metadata = FieldMetadata::new(Arc::new(definition), parent, tree_position);
            metadata.init_value = init_value;
            metadata.default_value = default_value;

            let field_id = inner.store.register(metadata);
            inner.watch(field_id)?;
            log::debug!("Mounted field {field_id}");
            inner.recompute(field_id).await?;
            Ok(field_id)
        }
        .boxed()
    }

    fn mount_group(
        self: &Arc<Self>,
        definitions: Vec<FieldDefinition>,
        parent: Option<FieldId>,
        paths: Option<ParentPaths>,
        prefix: TreePosition,
    ) -> BoxFuture<'static, Result<Vec<FieldId>>> {
        let inner = Arc::clone(self);
        async move {
            let formatted = PathResolver::resolve_group(&definitions, paths.as_ref());
            let mut mounted = Vec::with_capacity(formatted.len());
            for (index, definition) in formatted.into_iter().enumerate() {
                let mut position = prefix.clone();
                position.push(index);
                mounted.push(inner.mount(definition, parent, position).await?);
            }
            Ok(mounted)
        }
        .boxed()
    }

    fn mount_children(self: &Arc<Self>, field_id: FieldId) -> BoxFuture<'static, Result<()>> {
        let inner = Arc::clone(self);
        async move {
            let parent = inner.store.get(field_id)?;
            if parent.definition.fieldtype == FieldType::Array {
                return inner.sync_array(field_id).await;
            }
            if !inner.store.children_of(field_id).is_empty() {
                return Ok(());
            }

            let definition = Arc::clone(&parent.definition);
            inner
                .mount_group(
                    definition.fields.clone(),
                    Some(field_id),
                    Some(ParentPaths::of(&definition)),
                    parent.tree_position.clone(),
                )
                .await?;

            for (page_index, page) in definition.pages.iter().enumerate() {
                let mut prefix = parent.tree_position.clone();
                prefix.push(definition.fields.len() + page_index);
                inner
                    .mount_group(
                        page.fields.clone(),
                        Some(field_id),
                        Some(ParentPaths::page(&definition, page_index)),
                        prefix,
                    )
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn sync_array(self: &Arc<Self>, field_id: FieldId) -> BoxFuture<'static, Result<()>> {
        let inner = Arc::clone(self);
        async move {
            let parent = inner.store.get(field_id)?;
            let definition = Arc::clone(&parent.definition);
            let Some(item_config) = definition.array_item_config.as_deref() else {
                return Ok(());
            };

            let length = inner
                .context
                .get_data(&definition.data_path)
                .and_then(|value| value.as_array().map(Vec::len))
                .unwrap_or(0);

            let mut mounted = FxHashSet::default();
            for child in inner.store.children_of(field_id) {
                match item_index(&definition.state_path, &child) {
                    Some(index) if index < length => {
                        mounted.insert(index);
                    }
                    _ => inner.unmount(child.field_id).await?,
                }
            }

            for index in (0..length).filter(|index| !mounted.contains(index)) {
                let mut prefix = parent.tree_position.clone();
                prefix.push(index);
                log::debug!("Mounting item {index} of '{}'", definition.state_path);
                inner
                    .mount_group(
                        item_config.fields.clone(),
                        Some(field_id),
                        Some(ParentPaths::array_item(&definition, index)),
                        prefix,
                    )
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn unmount(self: &Arc<Self>, field_id: FieldId) -> BoxFuture<'static, Result<()>> {
        let inner = Arc::clone(self);
        async move {
            inner.unmount_children(field_id).await?;
            inner.unwatch(field_id);
            let metadata = inner.store.unregister(field_id)?;
            if !metadata.definition.keep_data_on_conditions_failed {
                inner.context.remove_data(metadata.data_path());
            }
            Ok(())
        }
        .boxed()
    }

    fn unmount_children(self: &Arc<Self>, field_id: FieldId) -> BoxFuture<'static, Result<()>> {
        let inner = Arc::clone(self);
        async move {
            for child in inner.store.children_of(field_id) {
                inner.unmount(child.field_id).await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn watch(self: &Arc<Self>, field_id: FieldId) -> Result<()> {
        let metadata = self.store.get(field_id)?;
        let mut keys: Vec<String> = metadata
            .definition
            .template_dependencies
            .iter()
            .cloned()
            .collect();
        let own = join("data", metadata.data_path());
        if !keys.contains(&own) {
            keys.push(own);
        }

        let snapshot = keys.iter().map(|key| self.context.get(key)).collect();
        let weak: Weak<Inner> = Arc::downgrade(self);
        let action = move |()| {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let Err(err) = inner.recompute(field_id).await {
                    log::debug!("Skipped recomputation of {field_id}: {err}");
                }
            }
        };
        let debouncer = if self.config.delayed_debounce {
            Debouncer::delayed(self.config.debounce(), action)
        } else {
            Debouncer::new(self.config.debounce(), action)
        };

        self.watches.insert(
            field_id,
            Arc::new(Watch {
                keys,
                snapshot: Mutex::new(snapshot),
                debouncer,
                changes: AtomicU64::new(0),
            }),
        );
        Ok(())
    }

    fn unwatch(&self, field_id: FieldId) {
        self.watches.remove(&field_id);
        self.locks.remove(&field_id);
    }

    fn notify_changed(&self) -> usize {
        let root = self.context.snapshot();
        let watches: Vec<(FieldId, Arc<Watch>)> = self
            .watches
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut scheduled = 0;
        for (field_id, watch) in watches {
            let current: Vec<Option<Value>> = watch
                .keys
                .iter()
                .map(|key| crate::path::get_path(&root, key).cloned())
                .collect();
            {
                let mut snapshot = watch.snapshot.lock();
                if *snapshot == current {
                    continue;
                }
                *snapshot = current;
            }

            watch.changes.fetch_add(1, Ordering::AcqRel);
            if self
                .store
                .update(field_id, |metadata| metadata.dependencies_changed = true)
                .is_err()
            {
                continue;
            }
            log::debug!("Dependencies of {field_id} changed");
            tokio::spawn(watch.debouncer.call(()));
            scheduled += 1;
        }
        scheduled
    }

    fn refresh_snapshot(&self, watch: &Watch) {
        let current = watch.keys.iter().map(|key| self.context.get(key)).collect();
        *watch.snapshot.lock() = current;
    }

    fn lock_for(&self, field_id: FieldId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(field_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .value(),
        )
    }

    fn recompute(self: &Arc<Self>, field_id: FieldId) -> BoxFuture<'static, Result<()>> {
        let inner = Arc::clone(self);
        async move {
            let lock = inner.lock_for(field_id);
            let _guard = lock.lock().await;

            let metadata = inner.store.get(field_id)?;
            let watch = inner
                .watches
                .get(&field_id)
                .map(|entry| Arc::clone(entry.value()));
            let started_at = watch
                .as_ref()
                .map_or(0, |watch| watch.changes.load(Ordering::Acquire));
            let definition = Arc::clone(&metadata.definition);
            log::debug!("Recomputing '{}'", definition.state_path);

            let mut context = inner.scoped_context(&definition).await;
            let results: Vec<bool> = join_all(
                definition
                    .conditions
                    .iter()
                    .map(|condition| inner.evaluator.evaluate_str(&condition.expression, Some(&context))),
            )
            .await
            .iter()
            .map(|result| is_truthy(result.as_ref()))
            .collect();

            let outcome = inner.gate.apply(field_id, results)?;
            if outcome.data_changed {
                if let Some(watch) = &watch {
                    inner.refresh_snapshot(watch);
                }
                context = inner.scoped_context(&definition).await;
            }

            let (settings_pass, checks) = futures::join!(
                inner.evaluate_settings(&definition, &context),
                inner.evaluate_validations(&definition, &context)
            );

            match outcome.transition {
                GateTransition::Passed => inner.mount_children(field_id).await?,
                GateTransition::Failed => inner.unmount_children(field_id).await?,
                GateTransition::Unchanged => {
                    if definition.fieldtype == FieldType::Array && metadata.is_visible() {
                        inner.sync_array(field_id).await?;
                    }
                }
            }

            inner.store.update(field_id, |metadata| {
                settings_pass.apply(&definition.state_path, &mut metadata.dynamic_settings);
                metadata.validations = ValidationState::from_checks(checks);
                let unchanged = watch
                    .as_ref()
                    .is_none_or(|watch| watch.changes.load(Ordering::Acquire) == started_at);
                if unchanged {
                    metadata.dependencies_changed = false;
                }
            })?;

            if outcome.data_changed {
                inner.notify_changed();
            }
            Ok(())
        }
        .boxed()
    }

    /// Context for one field's pass, with its `template_context` merged at the root
    async fn scoped_context(&self, definition: &FormattedFieldDefinition) -> Value {
        let mut root = self.context.snapshot();
        if definition.template_context.is_empty() {
            return root;
        }

        let values = join_all(
            definition
                .template_context
                .values()
                .map(|template| self.evaluator.evaluate(Some(template), Some(&root))),
        )
        .await;
        let evaluated: Vec<(String, Value)> = definition
            .template_context
            .keys()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| (key.clone(), value)))
            .collect();

        if let Value::Object(entries) = &mut root {
            entries.extend(evaluated);
        }
        root
    }

    async fn evaluate_settings(
        &self,
        definition: &FormattedFieldDefinition,
        context: &Value,
    ) -> SettingsPass {
        let evaluator = &self.evaluator;
        let options = async {
            match &definition.options {
                Some(options) => options.try_resolve(evaluator, context).await,
                None => Ok(None),
            }
        };
        let settings = async {
            let values = join_all(
                definition
                    .settings
                    .values()
                    .map(|template| evaluator.try_evaluate(template, context)),
            )
            .await;
            definition.settings.keys().cloned().zip(values).collect::<Vec<_>>()
        };

        let (label, placeholder, content, options, settings) = futures::join!(
            self.derived(definition.label.as_ref(), context),
            self.derived(definition.placeholder.as_ref(), context),
            self.derived(definition.content.as_ref(), context),
            options,
            settings
        );

        SettingsPass {
            label,
            placeholder,
            content,
            options,
            settings,
        }
    }

    async fn derived(&self, template: Option<&Value>, context: &Value) -> Result<Option<Value>> {
        match template {
            Some(template) => self.evaluator.try_evaluate(template, context).await,
            None => Ok(None),
        }
    }

    async fn evaluate_validations(
        &self,
        definition: &FormattedFieldDefinition,
        context: &Value,
    ) -> Vec<ValidationCheck> {
        join_all(definition.validations.iter().map(|validation| async move {
            let result = self
                .evaluator
                .evaluate_str(&validation.expression, Some(context))
                .await;
            let error_message = match &validation.error_message {
                Some(template) => self
                    .evaluator
                    .evaluate_str(template, Some(context))
                    .await
                    .map(|message| display(&message)),
                None => None,
            };
            ValidationCheck {
                expression: validation.expression.clone(),
                is_valid: is_truthy(result.as_ref()),
                error_message,
            }
        }))
        .await
    }
}

/// Index of the array item a child of an array field belongs to
fn item_index(array_state_path: &str, child: &FieldMetadata) -> Option<usize> {
    child
        .definition
        .parent_state_path
        .strip_prefix(array_state_path)?
        .strip_prefix('.')?
        .split('.')
        .next()?
        .parse()
        .ok()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, FormConfig};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn scheduler(data: Value) -> (DependencyScheduler, SharedContext, Arc<FieldMetadataStore>) {
        let config = EngineConfig::for_testing();
        let context = SharedContext::new(Some("test"), false, data);
        let store = Arc::new(FieldMetadataStore::new());
        let scheduler = DependencyScheduler::new(
            TemplateEvaluator::with_config(&config),
            context.clone(),
            Arc::clone(&store),
            config,
        );
        (scheduler, context, store)
    }

    async fn mount_roots(scheduler: &DependencyScheduler, fields: Vec<FieldDefinition>) -> Vec<FieldId> {
        scheduler
            .mount_group(&fields, None, None, &TreePosition::new())
            .await
            .unwrap()
    }

    async fn settle(scheduler: &DependencyScheduler) {
        for _ in 0..200 {
            if scheduler.is_idle() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("fields never settled");
    }

    #[tokio::test]
    async fn test_mount_evaluates_derived_values() {
        let (scheduler, context, store) = scheduler(json!({"name": "Sam"}));
        let mut field = FieldDefinition::new(FieldType::Text, "Greeting")
            .with_label("Hello {{data.name}}")
            .with_default(json!("hi"));
        field.placeholder = Some(json!("[[jsonata]] $uppercase(data.name)"));

        let ids = mount_roots(&scheduler, vec![field]).await;
        let metadata = store.get(ids[0]).unwrap();

        assert_eq!(metadata.dynamic_settings.label, Some(json!("Hello Sam")));
        assert_eq!(metadata.dynamic_settings.placeholder, Some(json!("SAM")));
        assert_eq!(metadata.default_value, Some(json!("hi")));
        assert_eq!(context.get_data("greeting"), Some(json!("hi")));
        assert!(metadata.is_settled());
        assert_eq!(
            scheduler.watched_keys(ids[0]).unwrap(),
            vec!["data.greeting".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dependency_change_recomputes() {
        let (scheduler, context, store) = scheduler(json!({"age": 10}));
        let field = FieldDefinition::new(FieldType::Text, "Status")
            .with_dependency("data.age")
            .with_validation("[[jsonata]] data.age >= 18", "Too young ({{data.age}})");

        let ids = mount_roots(&scheduler, vec![field]).await;
        let before = store.get(ids[0]).unwrap();
        assert!(!before.validations.is_valid);
        assert_eq!(before.validations.error_message.as_deref(), Some("Too young (10)"));

        context.set_data("age", json!(30));
        assert_eq!(scheduler.notify_changed(), 1);
        assert!(!store.get(ids[0]).unwrap().is_settled());
        settle(&scheduler).await;

        assert!(store.get(ids[0]).unwrap().validations.is_valid);
        assert_eq!(scheduler.notify_changed(), 0);
    }

    struct Quantity;

    impl crate::template::SyncTemplateLanguage for Quantity {
        fn name(&self) -> &'static str {
            "qty"
        }

        fn evaluate(&self, _expression: &str, context: &Value) -> Result<Option<Value>> {
            match context.pointer("/data/qty") {
                Some(Value::Number(qty)) => Ok(Some(Value::Number(qty.clone()))),
                other => Err(crate::FormError::template_error(
                    "qty",
                    format!("not a quantity: {other:?}"),
                )),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_evaluation_keeps_previous_values() {
        let config = EngineConfig::for_testing();
        let context = SharedContext::new(Some("test"), false, json!({"qty": 3}));
        let store = Arc::new(FieldMetadataStore::new());
        let mut registry = crate::LanguageRegistry::standard(config.expression_cache_size);
        registry.register_sync(Quantity);
        let scheduler = DependencyScheduler::new(
            TemplateEvaluator::with_registry(registry),
            context.clone(),
            Arc::clone(&store),
            config,
        );

        let mut field = FieldDefinition::new(FieldType::Number, "Total")
            .with_dependency("data.qty")
            .with_label("Total for {{data.qty}}");
        field.placeholder = Some(json!("[[jsonata]] data.qty * 2"));
        field.settings.insert("max".into(), json!("[[qty]]"));

        let ids = mount_roots(&scheduler, vec![field]).await;
        let before = store.get(ids[0]).unwrap().dynamic_settings;
        assert_eq!(before.placeholder, Some(json!(6)));
        assert_eq!(before.settings.get("max"), Some(&json!(3)));

        context.set_data("qty", json!("abc"));
        assert_eq!(scheduler.notify_changed(), 1);
        settle(&scheduler).await;

        let after = store.get(ids[0]).unwrap().dynamic_settings;
        assert_eq!(after.placeholder, Some(json!(6)));
        assert_eq!(after.settings.get("max"), Some(&json!(3)));
        assert_eq!(after.label, Some(json!("Total for abc")));

        context.set_data("qty", json!(5));
        scheduler.notify_changed();
        settle(&scheduler).await;
        let recovered = store.get(ids[0]).unwrap().dynamic_settings;
        assert_eq!(recovered.placeholder, Some(json!(10)));
        assert_eq!(recovered.settings.get("max"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_template_context_is_merged() {
        let (scheduler, _, store) = scheduler(json!({"first": "Ada", "last": "Lovelace"}));
        let mut field = FieldDefinition::new(FieldType::Heading, "Title")
            .with_label("{{full}}");
        field
            .template_context
            .insert("full".into(), json!("{{data.first}} {{data.last}}"));

        let ids = mount_roots(&scheduler, vec![field]).await;
        assert_eq!(
            store.get(ids[0]).unwrap().dynamic_settings.label,
            Some(json!("Ada Lovelace"))
        );
    }

    #[tokio::test]
    async fn test_condition_flip_unmounts_children() {
        let (scheduler, context, store) = scheduler(json!({"show": true}));
        let group = FieldDefinition::new(FieldType::Fieldset, "Details")
            .with_dependency("data.show")
            .with_condition("[[jsonata]] data.show")
            .with_field(FieldDefinition::new(FieldType::Text, "City"));

        let ids = mount_roots(&scheduler, vec![group]).await;
        assert_eq!(store.len(), 2);
        assert_eq!(context.get_data("details.city"), Some(json!("")));

        context.set_data("show", json!(false));
        scheduler.notify_changed();
        settle(&scheduler).await;
        assert_eq!(store.len(), 1);
        assert_eq!(context.get_data("details"), None);
        assert!(!store.get(ids[0]).unwrap().is_visible());

        context.set_data("show", json!(true));
        scheduler.notify_changed();
        settle(&scheduler).await;
        assert_eq!(store.len(), 2);
        assert_eq!(context.get_data("details.city"), Some(json!("")));
    }

    #[tokio::test]
    async fn test_array_items_follow_data() {
        let (scheduler, context, store) = scheduler(json!({"people": [{"name": "A"}]}));
        let mut people = FieldDefinition::new(FieldType::Array, "People");
        people.array_item_config = Some(Box::new(FormConfig::with_fields(vec![
            FieldDefinition::new(FieldType::Text, "Name"),
        ])));

        let ids = mount_roots(&scheduler, vec![people]).await;
        let children = store.children_of(ids[0]);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].state_path(), "people.0.name");
        assert_eq!(children[0].data_path(), "people.0.name");

        context.set_data("people.1", json!({"name": "B"}));
        scheduler.notify_changed();
        settle(&scheduler).await;
        assert_eq!(store.children_of(ids[0]).len(), 2);

        context.set_data("people", json!([]));
        scheduler.notify_changed();
        settle(&scheduler).await;
        assert!(store.children_of(ids[0]).is_empty());
    }

    #[tokio::test]
    async fn test_pages_mount_under_page_state_paths() {
        let (scheduler, _, store) = scheduler(json!({}));
        let mut wizard = FieldDefinition::new(FieldType::Pages, "Wizard");
        wizard.pages = vec![
            FormConfig::with_fields(vec![FieldDefinition::new(FieldType::Text, "First")]),
            FormConfig::with_fields(vec![FieldDefinition::new(FieldType::Text, "Second")]),
        ];

        mount_roots(&scheduler, vec![wizard]).await;
        let paths: Vec<String> = store.all().iter().map(|m| m.state_path().to_string()).collect();
        assert_eq!(paths, vec!["wizard", "wizard.pages.0.first", "wizard.pages.1.second"]);
        assert!(store.find_by_state_path("wizard.pages.1.second").is_some_and(|m| m.data_path() == "wizard.second"));
    }

    #[tokio::test]
    async fn test_unmount_prunes_unless_kept() {
        let (scheduler, context, store) = scheduler(json!({"a": "1", "b": "2"}));
        let ids = mount_roots(
            &scheduler,
            vec![
                FieldDefinition::new(FieldType::Text, "A"),
                FieldDefinition::new(FieldType::Text, "B").keep_data(),
            ],
        )
        .await;

        scheduler.unmount(ids[0]).await.unwrap();
        scheduler.unmount(ids[1]).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(context.get_data("a"), None);
        assert_eq!(context.get_data("b"), Some(json!("2")));
        assert!(scheduler.watched_keys(ids[0]).is_none());
    }
}
