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

//! Reading and writing values at dotted paths of a JSON tree
//!
//! Numeric segments index arrays; every other segment is an object key.

use serde_json::{Map, Value};

/// Split a dotted path into its non-empty segments
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

fn array_index(segment: &str) -> Option<usize> {
    if segment.bytes().all(|b| b.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}

/// Value at `path`, `None` when any segment is missing. The empty path is the root.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => array_index(segment).and_then(|index| items.get(index)),
        _ => None,
    })
}

/// Write `value` at `path`, creating intermediate containers as needed
///
/// Scalars found in the way are replaced. Writing to the empty path replaces the root.
/// A numeric segment only creates or extends an array when it addresses an existing
/// slot or the next one; on a missing container it is used as an object key instead.
/// Returns `false`, leaving `root` untouched, when the path indexes past the end of an
/// existing array.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> bool {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        *root = value;
        return true;
    };
    if !is_writable(root, &parts) {
        return false;
    }

    let mut current = root;
    for segment in parents {
        current = child_slot(current, segment);
    }
    *child_slot(current, last) = value;
    true
}

fn is_writable(root: &Value, parts: &[&str]) -> bool {
    let mut current = Some(root);
    for segment in parts {
        current = match (current, array_index(segment)) {
            (Some(Value::Array(items)), Some(index)) if index > items.len() => return false,
            (Some(Value::Array(items)), Some(index)) => items.get(index),
            (Some(Value::Object(map)), _) => map.get(*segment),
            _ => None,
        };
    }
    true
}

fn child_slot<'a>(current: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = array_index(segment);
    let needs_container = match current {
        Value::Object(_) => false,
        Value::Array(_) => index.is_none(),
        _ => true,
    };
    if needs_container {
        *current = match index {
            Some(0) => Value::Array(Vec::new()),
            _ => Value::Object(Map::new()),
        };
    }

    match current {
        Value::Array(items) => {
            let index = index.unwrap_or_default();
            if items.len() == index {
                items.push(Value::Null);
            }
            &mut items[index]
        }
        Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
        _ => unreachable!("container was created above"),
    }
}

/// Remove the value at `path` and return it
///
/// Object entries are removed keeping the order of the remaining keys; array
/// elements are replaced with `null` so sibling indices stay stable.
pub fn remove_path(root: &mut Value, path: &str) -> Option<Value> {
    let parts: Vec<&str> = segments(path).collect();
    let (last, parents) = parts.split_last()?;

    let mut current = root;
    for segment in parents {
        current = match current {
            Value::Object(map) => map.get_mut(*segment)?,
            Value::Array(items) => items.get_mut(array_index(segment)?)?,
            _ => return None,
        };
    }

    match current {
        Value::Object(map) => map.shift_remove(*last),
        Value::Array(items) => {
            let slot = items.get_mut(array_index(last)?)?;
            Some(std::mem::replace(slot, Value::Null))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_get_path() {
        let data = json!({"a": {"b": [10, {"c": "x"}]}});
        assert_eq!(get_path(&data, "a.b.0"), Some(&json!(10)));
        assert_eq!(get_path(&data, "a.b.1.c"), Some(&json!("x")));
        assert_eq!(get_path(&data, "a.missing"), None);
        assert_eq!(get_path(&data, "a.b.x"), None);
        assert_eq!(get_path(&data, ""), Some(&data));
    }

    #[test]
    fn test_set_path_creates_containers() {
        let mut data = json!({});
        set_path(&mut data, "person.name", json!("Sam"));
        set_path(&mut data, "items.0.label", json!("first"));
        set_path(&mut data, "items.1.label", json!("second"));
        assert_eq!(
            data,
            json!({"person": {"name": "Sam"}, "items": [{"label": "first"}, {"label": "second"}]})
        );
    }

    #[test]
    fn test_set_path_never_pads_arrays() {
        let mut data = json!({"list": [1, 2]});
        assert!(!set_path(&mut data, "list.90210000", json!(3)));
        assert!(!set_path(&mut data, "list.3.name", json!("x")));
        assert_eq!(data, json!({"list": [1, 2]}));

        assert!(set_path(&mut data, "list.2", json!(3)));
        assert!(set_path(&mut data, "zip.90210000", json!("")));
        assert_eq!(data, json!({"list": [1, 2, 3], "zip": {"90210000": ""}}));
    }

    #[test]
    fn test_set_path_replaces_scalars() {
        let mut data = json!({"a": 5});
        set_path(&mut data, "a.b", json!(true));
        assert_eq!(data, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_remove_path() {
        let mut data = json!({"a": {"x": 1, "y": 2, "z": 3}, "list": [1, 2]});
        assert_eq!(remove_path(&mut data, "a.y"), Some(json!(2)));
        assert_eq!(remove_path(&mut data, "list.0"), Some(json!(1)));
        assert_eq!(remove_path(&mut data, "a.missing"), None);
        assert_eq!(data, json!({"a": {"x": 1, "z": 3}, "list": [null, 2]}));
        let keys: Vec<&String> = data["a"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["x", "z"]);
    }
}
