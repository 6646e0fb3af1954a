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

//! Tree-walking evaluator
//!
//! Results follow JSONata sequence semantics: `None` is undefined, a path that
//! matches several values yields an array, and a path that matches one value
//! yields the value itself.

use super::ast::{BinaryOperator, ExpressionNode};
use super::error::{JsonataError, JsonataResult};
use super::functions::{self, number_value, sequence, to_boolean, to_string, values_equal};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Evaluate a parsed expression with `input` as both context and root
pub fn evaluate(node: &ExpressionNode, input: &Value) -> JsonataResult<Option<Value>> {
    Evaluator { root: input }.eval(node, input)
}

struct Evaluator<'a> {
    root: &'a Value,
}

fn items_of(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Field lookup, mapping over arrays and flattening one level
fn lookup_field(input: &Value, name: &str) -> Option<Value> {
    match input {
        Value::Object(entries) => entries.get(name).cloned(),
        Value::Array(items) => {
            let mut results = Vec::new();
            for item in items {
                match lookup_field(item, name) {
                    Some(Value::Array(inner)) => results.extend(inner),
                    Some(value) => results.push(value),
                    None => {}
                }
            }
            sequence(results)
        }
        _ => None,
    }
}

fn index_matches(position: f64, index: usize, len: usize) -> bool {
    let position = position.floor();
    let resolved = if position < 0.0 {
        len as f64 + position
    } else {
        position
    };
    resolved == index as f64
}

impl Evaluator<'_> {
    fn eval(&self, node: &ExpressionNode, input: &Value) -> JsonataResult<Option<Value>> {
        match node {
            ExpressionNode::Literal(value) => Ok(Some(value.clone())),
            ExpressionNode::Name(name) => Ok(lookup_field(input, name)),
            ExpressionNode::Variable(name) => Ok(match name.as_str() {
                "" => Some(input.clone()),
                "$" => Some(self.root.clone()),
                _ => None,
            }),
            ExpressionNode::Path { source, step } => self.eval_path(source, step, input),
            ExpressionNode::Filter { source, predicate } => {
                self.eval_filter(source, predicate, input)
            }
            ExpressionNode::FunctionCall { name, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.eval(argument, input))
                    .collect::<JsonataResult<Vec<_>>>()?;
                functions::call(name, &arguments)
            }
            ExpressionNode::Negate(operand) => match self.eval(operand, input)? {
                None => Ok(None),
                Some(Value::Number(n)) => {
                    number_value(-n.as_f64().unwrap_or_default()).map(Some)
                }
                Some(other) => Err(JsonataError::type_error(format!(
                    "cannot negate non-number {other}"
                ))),
            },
            ExpressionNode::Binary {
                operator,
                left,
                right,
            } => self.eval_binary(*operator, left, right, input),
            ExpressionNode::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.eval(condition, input)?;
                if to_boolean(condition.as_ref()) {
                    self.eval(then, input)
                } else {
                    match otherwise {
                        Some(otherwise) => self.eval(otherwise, input),
                        None => Ok(None),
                    }
                }
            }
            ExpressionNode::Array(elements) => {
                let mut results = Vec::new();
                for element in elements {
                    match self.eval(element, input)? {
                        None => {}
                        Some(Value::Array(inner)) if !element.is_array_constructor() => {
                            results.extend(inner)
                        }
                        Some(value) => results.push(value),
                    }
                }
                Ok(Some(Value::Array(results)))
            }
            ExpressionNode::Object(entries) => {
                let mut object = Map::new();
                for (key, value) in entries {
                    let key = match self.eval(key, input)? {
                        Some(Value::String(key)) => key,
                        other => {
                            return Err(JsonataError::type_error(format!(
                                "object key must be a string, got {}",
                                other.map_or_else(|| "undefined".to_string(), |v| v.to_string())
                            )));
                        }
                    };
                    if let Some(value) = self.eval(value, input)? {
                        object.insert(key, value);
                    }
                }
                Ok(Some(Value::Object(object)))
            }
        }
    }

    fn eval_path(
        &self,
        source: &ExpressionNode,
        step: &ExpressionNode,
        input: &Value,
    ) -> JsonataResult<Option<Value>> {
        let Some(base) = self.eval(source, input)? else {
            return Ok(None);
        };
        let mut results = Vec::new();
        for item in items_of(&base) {
            match self.eval(step, item)? {
                None => {}
                Some(Value::Array(inner)) if !step.is_array_constructor() => results.extend(inner),
                Some(value) => results.push(value),
            }
        }
        Ok(sequence(results))
    }

    fn eval_filter(
        &self,
        source: &ExpressionNode,
        predicate: &ExpressionNode,
        input: &Value,
    ) -> JsonataResult<Option<Value>> {
        let Some(base) = self.eval(source, input)? else {
            return Ok(None);
        };
        let items = items_of(&base);
        let len = items.len();
        let mut selected = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let keep = match self.eval(predicate, item)? {
                Some(Value::Number(n)) => {
                    index_matches(n.as_f64().unwrap_or(f64::NAN), index, len)
                }
                Some(Value::Array(positions))
                    if !positions.is_empty() && positions.iter().all(Value::is_number) =>
                {
                    positions
                        .iter()
                        .filter_map(Value::as_f64)
                        .any(|p| index_matches(p, index, len))
                }
                other => to_boolean(other.as_ref()),
            };
            if keep {
                selected.push(item.clone());
            }
        }
        Ok(sequence(selected))
    }

    fn eval_binary(
        &self,
        operator: BinaryOperator,
        left: &ExpressionNode,
        right: &ExpressionNode,
        input: &Value,
    ) -> JsonataResult<Option<Value>> {
        match operator {
            BinaryOperator::And => {
                let result = to_boolean(self.eval(left, input)?.as_ref())
                    && to_boolean(self.eval(right, input)?.as_ref());
                return Ok(Some(Value::Bool(result)));
            }
            BinaryOperator::Or => {
                let result = to_boolean(self.eval(left, input)?.as_ref())
                    || to_boolean(self.eval(right, input)?.as_ref());
                return Ok(Some(Value::Bool(result)));
            }
            _ => {}
        }

        let lhs = self.eval(left, input)?;
        let rhs = self.eval(right, input)?;

        if operator.is_arithmetic() {
            return arithmetic(operator, lhs.as_ref(), rhs.as_ref());
        }

        match operator {
            BinaryOperator::Concat => {
                let mut text = lhs.as_ref().map(to_string).unwrap_or_default();
                text.push_str(&rhs.as_ref().map(to_string).unwrap_or_default());
                Ok(Some(Value::String(text)))
            }
            BinaryOperator::Equal | BinaryOperator::NotEqual => {
                let equal = match (&lhs, &rhs) {
                    (Some(l), Some(r)) => values_equal(l, r),
                    _ => return Ok(Some(Value::Bool(false))),
                };
                Ok(Some(Value::Bool(equal == (operator == BinaryOperator::Equal))))
            }
            BinaryOperator::In => {
                let found = match (&lhs, &rhs) {
                    (Some(needle), Some(haystack)) => items_of(haystack)
                        .into_iter()
                        .any(|candidate| values_equal(needle, candidate)),
                    _ => false,
                };
                Ok(Some(Value::Bool(found)))
            }
            _ => compare(operator, lhs.as_ref(), rhs.as_ref()),
        }
    }
}

fn arithmetic(
    operator: BinaryOperator,
    lhs: Option<&Value>,
    rhs: Option<&Value>,
) -> JsonataResult<Option<Value>> {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return Ok(None);
    };
    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(JsonataError::type_error(format!(
            "operands of '{operator}' must be numbers, got {lhs} and {rhs}"
        )));
    };
    let result = match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => a / b,
        _ => a % b,
    };
    number_value(result).map(Some)
}

fn compare(
    operator: BinaryOperator,
    lhs: Option<&Value>,
    rhs: Option<&Value>,
) -> JsonataResult<Option<Value>> {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return Ok(Some(Value::Bool(false)));
    };
    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            return Err(JsonataError::type_error(format!(
                "operands of '{operator}' must both be numbers or both be strings"
            )));
        }
    };
    let Some(ordering) = ordering else {
        return Ok(Some(Value::Bool(false)));
    };
    let result = match operator {
        BinaryOperator::Less => ordering == Ordering::Less,
        BinaryOperator::LessEqual => ordering != Ordering::Greater,
        BinaryOperator::Greater => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(Some(Value::Bool(result)))
}
