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

//! Per-form metadata store
//!
//! Fields are addressed by [`FieldId`]; parent/child links are ids, never
//! references. Every mutation of a record goes through [`FieldMetadataStore::update`].

use crate::error::{FormError, Result};
use crate::model::{FieldId, FieldMetadata};
use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;

#[derive(Default)]
struct Entries {
    fields: IndexMap<FieldId, FieldMetadata>,
    /// Ids of unregistered fields. Grows by one id per unmount for the life of the
    /// store, which is what keeps ids unique across remounts; dropping the store
    /// with its form releases it.
    retired: FxHashSet<FieldId>,
}

impl Entries {
    fn is_taken(&self, field_id: &FieldId) -> bool {
        self.fields.contains_key(field_id) || self.retired.contains(field_id)
    }
}

/// Metadata of every mounted field of one form instance
#[derive(Default)]
pub struct FieldMetadataStore {
    entries: RwLock<Entries>,
}

impl FieldMetadataStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field and return the id it is stored under
    ///
    /// An id that is already in use, or was used before, is replaced by a fresh one.
    pub fn register(&self, mut metadata: FieldMetadata) -> FieldId {
        let mut entries = self.entries.write();
        while entries.is_taken(&metadata.field_id) {
            log::debug!("Field id {} already used, regenerating", metadata.field_id);
            metadata.field_id = FieldId::generate();
        }
        let field_id = metadata.field_id;
        log::debug!("Registered field {field_id} at '{}'", metadata.state_path());
        entries.fields.insert(field_id, metadata);
        field_id
    }

    /// Copy of a field's metadata
    pub fn get(&self, field_id: FieldId) -> Result<FieldMetadata> {
        self.entries
            .read()
            .fields
            .get(&field_id)
            .cloned()
            .ok_or_else(|| FormError::field_not_found(field_id))
    }

    /// Whether the field is registered
    pub fn contains(&self, field_id: FieldId) -> bool {
        self.entries.read().fields.contains_key(&field_id)
    }

    /// Apply a patch to a field's metadata under the store's write lock
    pub fn update<R>(&self, field_id: FieldId, patch: impl FnOnce(&mut FieldMetadata) -> R) -> Result<R> {
        let mut entries = self.entries.write();
        let metadata = entries
            .fields
            .get_mut(&field_id)
            .ok_or_else(|| FormError::field_not_found(field_id))?;
        Ok(patch(metadata))
    }

    /// Remove a field; its id is retired for the lifetime of the store
    pub fn unregister(&self, field_id: FieldId) -> Result<FieldMetadata> {
        let mut entries = self.entries.write();
        let metadata = entries
            .fields
            .shift_remove(&field_id)
            .ok_or_else(|| FormError::field_not_found(field_id))?;
        entries.retired.insert(field_id);
        log::debug!("Unregistered field {field_id} at '{}'", metadata.state_path());
        Ok(metadata)
    }

    /// All fields in depth-first tree order
    pub fn all(&self) -> Vec<FieldMetadata> {
        let mut fields: Vec<FieldMetadata> = self.entries.read().fields.values().cloned().collect();
        fields.sort_by(|a, b| a.tree_position.cmp(&b.tree_position));
        fields
    }

    /// Direct children of a field in tree order
    pub fn children_of(&self, parent: FieldId) -> Vec<FieldMetadata> {
        let mut children: Vec<FieldMetadata> = self
            .entries
            .read()
            .fields
            .values()
            .filter(|metadata| metadata.parent_field_id == Some(parent))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.tree_position.cmp(&b.tree_position));
        children
    }

    /// Root fields in tree order
    pub fn roots(&self) -> Vec<FieldMetadata> {
        let mut roots: Vec<FieldMetadata> = self
            .entries
            .read()
            .fields
            .values()
            .filter(|metadata| metadata.parent_field_id.is_none())
            .cloned()
            .collect();
        roots.sort_by(|a, b| a.tree_position.cmp(&b.tree_position));
        roots
    }

    /// Field mounted at a state path
    pub fn find_by_state_path(&self, state_path: &str) -> Option<FieldMetadata> {
        self.entries
            .read()
            .fields
            .values()
            .find(|metadata| metadata.state_path() == state_path)
            .cloned()
    }

    /// Ids of every registered field
    pub fn ids(&self) -> Vec<FieldId> {
        self.entries.read().fields.keys().copied().collect()
    }

    /// Number of registered fields
    pub fn len(&self) -> usize {
        self.entries.read().fields.len()
    }

    /// Whether no field is registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().fields.is_empty()
    }

    /// Remove every field, retiring their ids
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let ids: Vec<FieldId> = entries.fields.keys().copied().collect();
        entries.retired.extend(ids);
        entries.fields.clear();
    }
}
