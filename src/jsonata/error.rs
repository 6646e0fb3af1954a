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

//! Error types for JSONata parsing and evaluation

use super::span::Span;
use nom::error::{ErrorKind, ParseError as NomParseError};
use thiserror::Error;

/// Result type alias for JSONata operations
pub type JsonataResult<T> = std::result::Result<T, JsonataError>;

/// Errors raised while tokenizing, parsing or evaluating a JSONata expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsonataError {
    /// Generic syntax error from the tokenizer
    #[error("Syntax error at position {position}: {message}")]
    Syntax {
        /// Byte offset in the expression
        position: usize,
        /// Human-readable error message
        message: String,
    },

    /// A character that starts no token
    #[error("Invalid character '{character}' at position {position}")]
    InvalidCharacter {
        /// The offending character
        character: char,
        /// Byte offset in the expression
        position: usize,
    },

    /// A string literal without its closing quote
    #[error("Unclosed string literal starting at position {position}")]
    UnclosedString {
        /// Byte offset of the opening quote
        position: usize,
    },

    /// A token that does not fit the grammar at this point
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// Text of the token
        token: String,
        /// Byte offset in the expression
        position: usize,
    },

    /// A specific token was required
    #[error("Expected {expected} at position {position}")]
    ExpectedToken {
        /// Description of what was expected
        expected: String,
        /// Byte offset in the expression
        position: usize,
    },

    /// The expression ended early
    #[error("Unexpected end of expression")]
    UnexpectedEof,

    /// Operand types do not fit the operator
    #[error("Type error: {message}")]
    TypeError {
        /// Human-readable error message
        message: String,
    },

    /// Call of an unregistered function
    #[error("Unknown function '${name}'")]
    UnknownFunction {
        /// Function name without the `$`
        name: String,
    },

    /// Arguments rejected by a function
    #[error("Invalid arguments to '${function}': {message}")]
    InvalidArguments {
        /// Function name without the `$`
        function: String,
        /// Human-readable error message
        message: String,
    },

    /// Arithmetic produced an infinite or NaN number
    #[error("Number out of range")]
    NumberOutOfRange,
}

impl JsonataError {
    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Create an invalid arguments error
    pub fn invalid_arguments(function: &str, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            function: function.to_string(),
            message: message.into(),
        }
    }

    /// Byte offset the error points at, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Syntax { position, .. }
            | Self::InvalidCharacter { position, .. }
            | Self::UnclosedString { position }
            | Self::UnexpectedToken { position, .. }
            | Self::ExpectedToken { position, .. } => Some(*position),
            _ => None,
        }
    }
}

impl<'a> NomParseError<Span<'a>> for JsonataError {
    fn from_error_kind(input: Span<'a>, kind: ErrorKind) -> Self {
        Self::Syntax {
            position: input.location_offset(),
            message: kind.description().to_string(),
        }
    }

    fn append(_input: Span<'a>, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}
