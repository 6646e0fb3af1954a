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

//! Data and state path resolution for field definitions
//!
//! A field's `data_path` says where its value lives in `context.data`; its
//! `state_path` identifies its metadata. Both are dotted paths built from the
//! parent's paths. Two fields on different pages may share a `data_path`, but
//! never a `state_path`.

pub mod data;

use crate::model::{FieldDefinition, FormattedFieldDefinition};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Serialize;

pub use data::{get_path, remove_path, set_path};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Paths a parent hands down to its children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentPaths {
    /// State path children extend
    pub state_path: String,
    /// Data path children extend
    pub data_path: String,
}

impl ParentPaths {
    /// Paths of the form root
    pub fn root() -> Self {
        Self::default()
    }

    /// Paths handed down by a formatted field to its direct children
    pub fn of(field: &FormattedFieldDefinition) -> Self {
        Self {
            state_path: field.state_path.clone(),
            data_path: field.data_path.clone(),
        }
    }

    /// Paths for the children of one page of a `pages` field
    pub fn page(field: &FormattedFieldDefinition, page_index: usize) -> Self {
        Self {
            state_path: join(&join(&field.state_path, "pages"), &page_index.to_string()),
            data_path: field.data_path.clone(),
        }
    }

    /// Paths for the children of one item of an `array` field
    pub fn array_item(field: &FormattedFieldDefinition, item_index: usize) -> Self {
        let segment = item_index.to_string();
        Self {
            state_path: join(&field.state_path, &segment),
            data_path: join(&field.data_path, &segment),
        }
    }
}

/// A normalized field together with its normalized children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedField {
    /// The normalized field
    pub field: FormattedFieldDefinition,
    /// Normalized children (nested fields, then page fields)
    pub children: Vec<ResolvedField>,
}

/// Derives canonical paths for field definitions
pub struct PathResolver;

impl PathResolver {
    /// Key derived from a field name: lowercase, trimmed, whitespace runs to `_`
    pub fn key_from_name(name: &str) -> String {
        WHITESPACE
            .replace_all(name.to_lowercase().trim(), "_")
            .into_owned()
    }

    /// Sanitize a dotted path: trims segments, replaces inner whitespace and drops
    /// empty segments
    pub fn sanitize(path: &str) -> String {
        path.split('.')
            .map(|segment| WHITESPACE.replace_all(segment.trim(), "_").into_owned())
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Normalize a single field. `index` is its position among its siblings and only
    /// matters for fields with neither a name nor a data path.
    pub fn resolve(
        definition: &FieldDefinition,
        parent: Option<&ParentPaths>,
        index: usize,
    ) -> FormattedFieldDefinition {
        let relative = Self::relative_data_path(definition, index);
        let data_key = relative
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_string();
        Self::format(definition, parent, relative, data_key.clone(), &data_key)
    }

    /// Normalize a sibling group, keeping state paths unique within the group
    pub fn resolve_group(
        definitions: &[FieldDefinition],
        parent: Option<&ParentPaths>,
    ) -> Vec<FormattedFieldDefinition> {
        let mut claimed = FxHashSet::default();
        definitions
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                let relative = Self::relative_data_path(definition, index);
                let data_key = relative
                    .rsplit('.')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let mut segment = data_key.clone();
                if !claimed.insert(segment.clone()) {
                    segment = format!("{data_key}__{index}");
                    claimed.insert(segment.clone());
                }
                Self::format(definition, parent, relative, data_key, &segment)
            })
            .collect()
    }

    /// Normalize a whole definition tree, depth-first in declaration order
    ///
    /// Array items depend on runtime data and are not expanded here.
    pub fn resolve_tree(
        definitions: &[FieldDefinition],
        parent: Option<&ParentPaths>,
    ) -> Vec<ResolvedField> {
        Self::resolve_group(definitions, parent)
            .into_iter()
            .map(|field| {
                let mut children = Self::resolve_tree(&field.fields, Some(&ParentPaths::of(&field)));
                for (page_index, page) in field.pages.iter().enumerate() {
                    children.extend(Self::resolve_tree(
                        &page.fields,
                        Some(&ParentPaths::page(&field, page_index)),
                    ));
                }
                ResolvedField { field, children }
            })
            .collect()
    }

    fn relative_data_path(definition: &FieldDefinition, index: usize) -> String {
        let explicit = definition
            .data_path
            .as_deref()
            .map(Self::sanitize)
            .filter(|path| !path.is_empty());
        if let Some(path) = explicit {
            return path;
        }
        let key = definition
            .name
            .as_deref()
            .map(Self::key_from_name)
            .unwrap_or_default();
        if key.is_empty() {
            format!("field_{index}")
        } else {
            Self::sanitize(&key)
        }
    }

    fn format(
        definition: &FieldDefinition,
        parent: Option<&ParentPaths>,
        relative: String,
        data_key: String,
        state_segment: &str,
    ) -> FormattedFieldDefinition {
        let root = ParentPaths::root();
        let parent = parent.unwrap_or(&root);
        FormattedFieldDefinition {
            definition: definition.clone(),
            data_path: join(&parent.data_path, &relative),
            data_key,
            state_path: join(&parent.state_path, state_segment),
            parent_state_path: parent.state_path.clone(),
            parent_data_path: parent.data_path.clone(),
        }
    }
}

/// Join two dotted paths, skipping empty sides
pub fn join(prefix: &str, suffix: &str) -> String {
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, _) => suffix.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}.{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, FormConfig};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("  First Name ", "first_name")]
    #[case("Email", "email")]
    #[case("Street\t\tAddress  Line", "street_address_line")]
    #[case("", "")]
    fn test_key_from_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(PathResolver::key_from_name(name), expected);
    }

    #[test]
    fn test_sanitize_drops_empty_segments() {
        assert_eq!(PathResolver::sanitize(" a .. b c . "), "a.b_c");
    }

    #[test]
    fn test_root_field_paths() {
        let def = FieldDefinition::new(FieldType::Text, "  First Name ");
        let formatted = PathResolver::resolve(&def, None, 0);
        assert_eq!(formatted.data_key, "first_name");
        assert_eq!(formatted.data_path, "first_name");
        assert_eq!(formatted.state_path, "first_name");
        assert_eq!(formatted.parent_state_path, "");
        assert_eq!(formatted.parent_data_path, "");
    }

    #[test]
    fn test_explicit_data_path_is_relative_to_parent() {
        let parent = ParentPaths {
            state_path: "person".into(),
            data_path: "person".into(),
        };
        let def = FieldDefinition::new(FieldType::Text, "City").with_data_path("address.city");
        let formatted = PathResolver::resolve(&def, Some(&parent), 0);
        assert_eq!(formatted.data_key, "city");
        assert_eq!(formatted.data_path, "person.address.city");
        assert_eq!(formatted.state_path, "person.city");
        assert!(formatted.state_path.starts_with(&formatted.parent_state_path));
    }

    #[test]
    fn test_unnamed_field_gets_positional_key() {
        let def = FieldDefinition {
            fieldtype: FieldType::Heading,
            ..Default::default()
        };
        let formatted = PathResolver::resolve(&def, None, 3);
        assert_eq!(formatted.data_key, "field_3");
    }

    #[test]
    fn test_sibling_state_paths_are_unique() {
        let defs = vec![
            FieldDefinition::new(FieldType::Text, "Name"),
            FieldDefinition::new(FieldType::Text, "name"),
        ];
        let group = PathResolver::resolve_group(&defs, None);
        assert_eq!(group[0].data_path, "name");
        assert_eq!(group[1].data_path, "name");
        assert_eq!(group[0].state_path, "name");
        assert_eq!(group[1].state_path, "name__1");
    }

    #[test]
    fn test_pages_share_data_paths_but_not_state_paths() {
        let pages = FieldDefinition {
            fieldtype: FieldType::Pages,
            name: Some("Wizard".into()),
            pages: vec![
                FormConfig::with_fields(vec![FieldDefinition::new(FieldType::Text, "Notes")]),
                FormConfig::with_fields(vec![FieldDefinition::new(FieldType::Text, "Notes")]),
            ],
            ..Default::default()
        };
        let tree = PathResolver::resolve_tree(&[pages], None);
        let children = &tree[0].children;
        assert_eq!(children[0].field.data_path, "wizard.notes");
        assert_eq!(children[1].field.data_path, "wizard.notes");
        assert_eq!(children[0].field.state_path, "wizard.pages.0.notes");
        assert_eq!(children[1].field.state_path, "wizard.pages.1.notes");
    }

    #[test]
    fn test_resolve_tree_is_deterministic() {
        let defs = vec![
            FieldDefinition::new(FieldType::Fieldset, "Person")
                .with_field(FieldDefinition::new(FieldType::Text, "First Name"))
                .with_field(FieldDefinition::new(FieldType::Number, "Age")),
            FieldDefinition::new(FieldType::Text, "Comment"),
        ];
        let first = PathResolver::resolve_tree(&defs, None);
        let second = PathResolver::resolve_tree(&defs, None);
        assert_eq!(first, second);
        assert_eq!(first[0].children[0].field.state_path, "person.first_name");
        assert_eq!(first[0].children[1].field.data_path, "person.age");
    }

    #[test]
    fn test_array_item_paths() {
        let array = PathResolver::resolve(&FieldDefinition::new(FieldType::Array, "Items"), None, 0);
        let item = ParentPaths::array_item(&array, 2);
        assert_eq!(item.data_path, "items.2");
        assert_eq!(item.state_path, "items.2");
    }
}
