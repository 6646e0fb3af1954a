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

//! Built-in JSONata functions and value casts

use super::error::{JsonataError, JsonataResult};
use serde_json::{Number, Value};

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Convert a number to a JSON value; whole numbers become integers
pub fn number_value(n: f64) -> JsonataResult<Value> {
    if !n.is_finite() {
        return Err(JsonataError::NumberOutOfRange);
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or(JsonataError::NumberOutOfRange)
}

/// Collapse a result sequence: empty is undefined, a single item is unwrapped
pub fn sequence(mut items: Vec<Value>) -> Option<Value> {
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(Value::Array(items)),
    }
}

/// JSONata boolean cast
pub fn to_boolean(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => items.iter().any(|item| to_boolean(Some(item))),
        Some(Value::Object(entries)) => !entries.is_empty(),
    }
}

/// JSONata string cast; whole numbers print without a fraction
pub fn to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => (f as i64).to_string(),
            _ => n.to_string(),
        },
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Structural equality, comparing numbers by value
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => left == right,
    }
}

fn arg(arguments: &[Option<Value>], index: usize) -> Option<&Value> {
    arguments.get(index).and_then(Option::as_ref)
}

fn string_arg<'a>(
    function: &str,
    arguments: &'a [Option<Value>],
    index: usize,
) -> JsonataResult<Option<&'a str>> {
    match arg(arguments, index) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(JsonataError::invalid_arguments(
            function,
            format!("argument {} must be a string, got {other}", index + 1),
        )),
    }
}

fn numbers(function: &str, value: Option<&Value>) -> JsonataResult<Vec<f64>> {
    let items: Vec<&Value> = match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    };
    items
        .into_iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| {
                JsonataError::invalid_arguments(function, format!("expected numbers, got {item}"))
            })
        })
        .collect()
}

fn map_string(
    function: &str,
    arguments: &[Option<Value>],
    f: impl FnOnce(&str) -> String,
) -> JsonataResult<Option<Value>> {
    Ok(string_arg(function, arguments, 0)?.map(|s| Value::String(f(s))))
}

/// Call a built-in function
pub fn call(name: &str, arguments: &[Option<Value>]) -> JsonataResult<Option<Value>> {
    match name {
        "string" => Ok(arg(arguments, 0).map(|v| Value::String(to_string(v)))),
        "number" => to_number(arguments),
        "boolean" => Ok(arg(arguments, 0).map(|v| Value::Bool(to_boolean(Some(v))))),
        "not" => Ok(arg(arguments, 0).map(|v| Value::Bool(!to_boolean(Some(v))))),
        "exists" => Ok(Some(Value::Bool(arg(arguments, 0).is_some()))),
        "count" => {
            let count = match arg(arguments, 0) {
                None => 0,
                Some(Value::Array(items)) => items.len(),
                Some(_) => 1,
            };
            Ok(Some(Value::from(count)))
        }
        "length" => Ok(string_arg(name, arguments, 0)?.map(|s| Value::from(s.chars().count()))),
        "sum" => {
            let values = numbers(name, arg(arguments, 0))?;
            number_value(values.iter().sum()).map(Some)
        }
        "max" => numbers(name, arg(arguments, 0))?
            .into_iter()
            .reduce(f64::max)
            .map(number_value)
            .transpose(),
        "min" => numbers(name, arg(arguments, 0))?
            .into_iter()
            .reduce(f64::min)
            .map(number_value)
            .transpose(),
        "average" => {
            let values = numbers(name, arg(arguments, 0))?;
            if values.is_empty() {
                return Ok(None);
            }
            number_value(values.iter().sum::<f64>() / values.len() as f64).map(Some)
        }
        "uppercase" => map_string(name, arguments, str::to_uppercase),
        "lowercase" => map_string(name, arguments, str::to_lowercase),
        "trim" => map_string(name, arguments, |s| {
            s.split_whitespace().collect::<Vec<_>>().join(" ")
        }),
        "contains" => {
            let Some(text) = string_arg(name, arguments, 0)? else {
                return Ok(None);
            };
            let pattern = string_arg(name, arguments, 1)?.unwrap_or_default();
            Ok(Some(Value::Bool(text.contains(pattern))))
        }
        "substring" => substring(arguments),
        "join" => join(arguments),
        "keys" => Ok(keys(arg(arguments, 0))),
        other => Err(JsonataError::UnknownFunction {
            name: other.to_string(),
        }),
    }
}

fn to_number(arguments: &[Option<Value>]) -> JsonataResult<Option<Value>> {
    match arg(arguments, 0) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(Value::Number(n.clone()))),
        Some(Value::Bool(flag)) => Ok(Some(Value::from(u8::from(*flag)))),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(n) => number_value(n).map(Some),
            Err(_) => Err(JsonataError::invalid_arguments(
                "number",
                format!("unable to cast '{s}' to a number"),
            )),
        },
        Some(other) => Err(JsonataError::invalid_arguments(
            "number",
            format!("unable to cast {other} to a number"),
        )),
    }
}

fn substring(arguments: &[Option<Value>]) -> JsonataResult<Option<Value>> {
    let Some(text) = string_arg("substring", arguments, 0)? else {
        return Ok(None);
    };
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as f64;
    let start = arg(arguments, 1).and_then(Value::as_f64).ok_or_else(|| {
        JsonataError::invalid_arguments("substring", "argument 2 must be a number")
    })?;
    // Clamped in f64 so huge lengths or offsets never overflow an index
    let start = if start < 0.0 {
        (len + start.trunc()).max(0.0)
    } else {
        start.trunc().min(len)
    };
    let end = match arg(arguments, 2).and_then(Value::as_f64) {
        Some(length) => (start + length.trunc().max(0.0)).min(len),
        None => len,
    };
    Ok(Some(Value::String(
        chars[start as usize..end as usize].iter().collect(),
    )))
}

fn join(arguments: &[Option<Value>]) -> JsonataResult<Option<Value>> {
    let separator = string_arg("join", arguments, 1)?.unwrap_or_default();
    let parts: Vec<&str> = match arg(arguments, 0) {
        None => return Ok(None),
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| {
                    JsonataError::invalid_arguments("join", "argument 1 must be an array of strings")
                })
            })
            .collect::<JsonataResult<_>>()?,
        Some(_) => {
            return Err(JsonataError::invalid_arguments(
                "join",
                "argument 1 must be an array of strings",
            ));
        }
    };
    Ok(Some(Value::String(parts.join(separator))))
}

fn keys(value: Option<&Value>) -> Option<Value> {
    let mut names: Vec<String> = Vec::new();
    let objects: Vec<&Value> = match value? {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for object in objects {
        if let Value::Object(entries) = object {
            for key in entries.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
    }
    sequence(names.into_iter().map(Value::String).collect())
}
