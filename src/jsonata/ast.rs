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

//! Abstract syntax tree for JSONata expressions

use serde_json::Value;
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `&`
    Concat,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `and`
    And,
    /// `or`
    Or,
    /// `in`
    In,
}

impl BinaryOperator {
    /// Operator symbol as written in expressions
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Concat => "&",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::In => "in",
        }
    }

    /// Arithmetic operators take numbers and produce a number
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// Number, string, boolean or null literal
    Literal(Value),
    /// Field lookup on the current input
    Name(String),
    /// `$` (input), `$$` (root) or a named variable
    Variable(String),
    /// `source.step`: evaluates `step` once per item of `source`
    Path {
        /// Left side of the dot
        source: Box<ExpressionNode>,
        /// Right side of the dot
        step: Box<ExpressionNode>,
    },
    /// `source[predicate]`: index selection or filter
    Filter {
        /// Filtered expression
        source: Box<ExpressionNode>,
        /// Index or boolean predicate
        predicate: Box<ExpressionNode>,
    },
    /// `$name(arguments)`
    FunctionCall {
        /// Function name without `$`
        name: String,
        /// Argument expressions
        arguments: Vec<ExpressionNode>,
    },
    /// Unary minus
    Negate(Box<ExpressionNode>),
    /// Binary operation
    Binary {
        /// The operator
        operator: BinaryOperator,
        /// Left operand
        left: Box<ExpressionNode>,
        /// Right operand
        right: Box<ExpressionNode>,
    },
    /// `condition ? then : otherwise`
    Conditional {
        /// Condition
        condition: Box<ExpressionNode>,
        /// Result when the condition holds
        then: Box<ExpressionNode>,
        /// Result otherwise; undefined when absent
        otherwise: Option<Box<ExpressionNode>>,
    },
    /// `[a, b, ...]`
    Array(Vec<ExpressionNode>),
    /// `{"key": value, ...}`
    Object(Vec<(ExpressionNode, ExpressionNode)>),
}

impl ExpressionNode {
    /// Create a literal node
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Create a path step node
    pub fn path(source: ExpressionNode, step: ExpressionNode) -> Self {
        Self::Path {
            source: Box::new(source),
            step: Box::new(step),
        }
    }

    /// Create a filter node
    pub fn filter(source: ExpressionNode, predicate: ExpressionNode) -> Self {
        Self::Filter {
            source: Box::new(source),
            predicate: Box::new(predicate),
        }
    }

    /// Create a binary operation node
    pub fn binary(operator: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a conditional node
    pub fn conditional(
        condition: ExpressionNode,
        then: ExpressionNode,
        otherwise: Option<ExpressionNode>,
    ) -> Self {
        Self::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        }
    }

    /// Array constructors keep their results as nested arrays inside paths
    pub fn is_array_constructor(&self) -> bool {
        matches!(self, Self::Array(_))
    }
}
