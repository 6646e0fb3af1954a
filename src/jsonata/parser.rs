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

//! Pratt parser for JSONata expressions
//!
//! ### Precedence Levels (highest to lowest):
//! - **Invocation**: `.`, `[]`
//! - **Unary**: `-`
//! - **Multiplicative**: `*`, `/`, `%`
//! - **Additive**: `+`, `-`, `&`
//! - **Comparison**: `=`, `!=`, `<`, `<=`, `>`, `>=`, `in`
//! - **And**: `and`
//! - **Or**: `or`
//! - **Conditional**: `? :` (right associative)
//!
//! The right side of `.` is parsed at invocation level, so `a.b[0]` filters each
//! `b` step rather than the whole path result.

use super::ast::{BinaryOperator, ExpressionNode};
use super::error::{JsonataError, JsonataResult};
use super::functions::number_value;
use super::span::Spanned;
use super::tokenizer::{Token, tokenize};
use serde_json::Value;

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// `? :`
    Conditional = 1,
    /// `or`
    Or = 2,
    /// `and`
    And = 3,
    /// Comparisons and `in`
    Comparison = 4,
    /// `+`, `-`, `&`
    Additive = 5,
    /// `*`, `/`, `%`
    Multiplicative = 6,
    /// Unary minus
    Unary = 7,
    /// `.` and `[]`
    Invocation = 8,
}

impl Precedence {
    /// Next higher level, for left-associative operators
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Conditional => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Comparison,
            Precedence::Comparison => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Invocation,
            Precedence::Invocation => Precedence::Invocation,
        }
    }
}

fn infix_precedence(token: &Token) -> Option<Precedence> {
    match token {
        Token::Dot | Token::LeftBracket => Some(Precedence::Invocation),
        Token::Star | Token::Slash | Token::Percent => Some(Precedence::Multiplicative),
        Token::Plus | Token::Minus | Token::Ampersand => Some(Precedence::Additive),
        Token::Equal
        | Token::NotEqual
        | Token::Less
        | Token::LessEqual
        | Token::Greater
        | Token::GreaterEqual
        | Token::In => Some(Precedence::Comparison),
        Token::And => Some(Precedence::And),
        Token::Or => Some(Precedence::Or),
        Token::Question => Some(Precedence::Conditional),
        _ => None,
    }
}

fn binary_operator(token: &Token) -> Option<BinaryOperator> {
    Some(match token {
        Token::Plus => BinaryOperator::Add,
        Token::Minus => BinaryOperator::Subtract,
        Token::Star => BinaryOperator::Multiply,
        Token::Slash => BinaryOperator::Divide,
        Token::Percent => BinaryOperator::Modulo,
        Token::Ampersand => BinaryOperator::Concat,
        Token::Equal => BinaryOperator::Equal,
        Token::NotEqual => BinaryOperator::NotEqual,
        Token::Less => BinaryOperator::Less,
        Token::LessEqual => BinaryOperator::LessEqual,
        Token::Greater => BinaryOperator::Greater,
        Token::GreaterEqual => BinaryOperator::GreaterEqual,
        Token::And => BinaryOperator::And,
        Token::Or => BinaryOperator::Or,
        Token::In => BinaryOperator::In,
        _ => return None,
    })
}

/// Parse an expression into its AST
pub fn parse(expression: &str) -> JsonataResult<ExpressionNode> {
    let mut parser = PrattParser::new(tokenize(expression)?);
    let node = parser.parse_expression(Precedence::Conditional)?;
    match parser.current() {
        Some(token) => Err(JsonataError::UnexpectedToken {
            token: token.value.to_string(),
            position: token.start,
        }),
        None => Ok(node),
    }
}

/// Precedence-climbing parser over a token buffer
pub struct PrattParser {
    tokens: Vec<Spanned<Token>>,
    position: usize,
}

impl PrattParser {
    /// Create a parser over already tokenized input
    pub fn new(tokens: Vec<Spanned<Token>>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn current(&self) -> Option<&Spanned<Token>> {
        self.tokens.get(self.position)
    }

    fn current_is(&self, expected: &Token) -> bool {
        self.current().is_some_and(|t| &t.value == expected)
    }

    fn advance(&mut self) -> JsonataResult<Spanned<Token>> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(JsonataError::UnexpectedEof)?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> JsonataResult<()> {
        match self.current() {
            Some(token) if token.value == expected => {
                self.position += 1;
                Ok(())
            }
            Some(token) => Err(JsonataError::ExpectedToken {
                expected: format!("'{expected}', found '{}'", token.value),
                position: token.start,
            }),
            None => Err(JsonataError::UnexpectedEof),
        }
    }

    /// Parse an expression whose operators bind at least as tight as `min_precedence`
    pub fn parse_expression(&mut self, min_precedence: Precedence) -> JsonataResult<ExpressionNode> {
        let mut left = self.parse_prefix()?;

        while let Some(precedence) = self.current().and_then(|t| infix_precedence(&t.value)) {
            if precedence < min_precedence {
                break;
            }
            let token = self.advance()?;
            left = match token.value {
                Token::Dot => {
                    let step = self.parse_expression(Precedence::Invocation)?;
                    ExpressionNode::path(left, step)
                }
                Token::LeftBracket => {
                    if self.current_is(&Token::RightBracket) {
                        // `a[]` keeps the result an array
                        self.position += 1;
                        left
                    } else {
                        let predicate = self.parse_expression(Precedence::Conditional)?;
                        self.expect(Token::RightBracket)?;
                        ExpressionNode::filter(left, predicate)
                    }
                }
                Token::Question => {
                    let then = self.parse_expression(Precedence::Conditional)?;
                    let otherwise = if self.current_is(&Token::Colon) {
                        self.position += 1;
                        Some(self.parse_expression(Precedence::Conditional)?)
                    } else {
                        None
                    };
                    ExpressionNode::conditional(left, then, otherwise)
                }
                other => {
                    let operator =
                        binary_operator(&other).ok_or_else(|| JsonataError::UnexpectedToken {
                            token: other.to_string(),
                            position: token.start,
                        })?;
                    let right = self.parse_expression(precedence.next_level())?;
                    ExpressionNode::binary(operator, left, right)
                }
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> JsonataResult<ExpressionNode> {
        let token = self.advance()?;
        match token.value {
            Token::Number(n) => Ok(ExpressionNode::Literal(number_value(n)?)),
            Token::String(s) => Ok(ExpressionNode::literal(s)),
            Token::True => Ok(ExpressionNode::literal(true)),
            Token::False => Ok(ExpressionNode::literal(false)),
            Token::Null => Ok(ExpressionNode::Literal(Value::Null)),
            Token::Name(name) => Ok(ExpressionNode::Name(name)),
            Token::Variable(name) => {
                if self.current_is(&Token::LeftParen) {
                    self.position += 1;
                    let arguments = self.parse_list(Token::RightParen)?;
                    Ok(ExpressionNode::FunctionCall { name, arguments })
                } else {
                    Ok(ExpressionNode::Variable(name))
                }
            }
            Token::Minus => {
                let operand = self.parse_expression(Precedence::Unary)?;
                Ok(match operand {
                    ExpressionNode::Literal(Value::Number(n)) => {
                        ExpressionNode::Literal(number_value(-n.as_f64().unwrap_or_default())?)
                    }
                    other => ExpressionNode::Negate(Box::new(other)),
                })
            }
            Token::LeftParen => {
                let inner = self.parse_expression(Precedence::Conditional)?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::LeftBracket => Ok(ExpressionNode::Array(self.parse_list(Token::RightBracket)?)),
            Token::LeftBrace => self.parse_object(),
            other => Err(JsonataError::UnexpectedToken {
                token: other.to_string(),
                position: token.start,
            }),
        }
    }

    /// Comma separated expressions up to `close`; the opening token is consumed
    fn parse_list(&mut self, close: Token) -> JsonataResult<Vec<ExpressionNode>> {
        let mut items = Vec::new();
        if self.current_is(&close) {
            self.position += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression(Precedence::Conditional)?);
            if self.current_is(&Token::Comma) {
                self.position += 1;
                continue;
            }
            self.expect(close)?;
            return Ok(items);
        }
    }

    fn parse_object(&mut self) -> JsonataResult<ExpressionNode> {
        let mut entries = Vec::new();
        if self.current_is(&Token::RightBrace) {
            self.position += 1;
            return Ok(ExpressionNode::Object(entries));
        }
        loop {
            let key = self.parse_expression(Precedence::Conditional)?;
            self.expect(Token::Colon)?;
            let value = self.parse_expression(Precedence::Conditional)?;
            entries.push((key, value));
            if self.current_is(&Token::Comma) {
                self.position += 1;
                continue;
            }
            self.expect(Token::RightBrace)?;
            return Ok(ExpressionNode::Object(entries));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn name(n: &str) -> ExpressionNode {
        ExpressionNode::Name(n.to_string())
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            ExpressionNode::binary(
                BinaryOperator::Add,
                ExpressionNode::literal(1),
                ExpressionNode::binary(
                    BinaryOperator::Multiply,
                    ExpressionNode::literal(2),
                    ExpressionNode::literal(3)
                )
            )
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        assert_eq!(
            parse("10 - 4 - 3").unwrap(),
            ExpressionNode::binary(
                BinaryOperator::Subtract,
                ExpressionNode::binary(
                    BinaryOperator::Subtract,
                    ExpressionNode::literal(10),
                    ExpressionNode::literal(4)
                ),
                ExpressionNode::literal(3)
            )
        );
    }

    #[test]
    fn test_predicate_binds_to_step() {
        assert_eq!(
            parse("a.b[0]").unwrap(),
            ExpressionNode::path(
                name("a"),
                ExpressionNode::filter(name("b"), ExpressionNode::literal(0))
            )
        );
    }

    #[test]
    fn test_conditional_and_logic() {
        assert_eq!(
            parse("x > 1 and y ? 'big' : 'small'").unwrap(),
            ExpressionNode::conditional(
                ExpressionNode::binary(
                    BinaryOperator::And,
                    ExpressionNode::binary(
                        BinaryOperator::Greater,
                        name("x"),
                        ExpressionNode::literal(1)
                    ),
                    name("y")
                ),
                ExpressionNode::literal("big"),
                Some(ExpressionNode::literal("small"))
            )
        );
    }

    #[test]
    fn test_negative_literal_is_folded() {
        assert_eq!(parse("-2").unwrap(), ExpressionNode::literal(-2));
        assert_eq!(
            parse("-a").unwrap(),
            ExpressionNode::Negate(Box::new(name("a")))
        );
    }

    #[test]
    fn test_constructors_and_calls() {
        assert_eq!(
            parse("{'n': $count([1, 2])}").unwrap(),
            ExpressionNode::Object(vec![(
                ExpressionNode::literal("n"),
                ExpressionNode::FunctionCall {
                    name: "count".into(),
                    arguments: vec![ExpressionNode::Array(vec![
                        ExpressionNode::literal(1),
                        ExpressionNode::literal(2)
                    ])]
                }
            )])
        );
        assert_eq!(parse("[]").unwrap(), ExpressionNode::Array(vec![]));
        assert_eq!(
            parse("null").unwrap(),
            ExpressionNode::Literal(json!(null))
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("").unwrap_err(), JsonataError::UnexpectedEof);
        assert_eq!(parse("(1 + 2").unwrap_err(), JsonataError::UnexpectedEof);
        assert!(matches!(
            parse("1 2").unwrap_err(),
            JsonataError::UnexpectedToken { position: 2, .. }
        ));
        assert!(matches!(
            parse("[1 2]").unwrap_err(),
            JsonataError::ExpectedToken { position: 3, .. }
        ));
    }
}
