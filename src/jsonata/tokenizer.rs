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

//! Tokenizer for JSONata expressions
//!
//! Numbers are unsigned; a leading `-` is left to the parser as unary minus.
//! String escapes are resolved here, so string tokens own their text.

use super::error::{JsonataError, JsonataResult};
use super::span::{Span, Spanned};
use nom::{
    IResult, Input, Parser,
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace1, one_of},
    combinator::{opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair},
};
use std::fmt;
use unicode_xid::UnicodeXID;

/// JSONata token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Number literal
    Number(f64),
    /// String literal with escapes resolved
    String(String),
    /// Field name, plain or backtick-quoted
    Name(String),
    /// `$name`; `$` alone is the empty name and `$$` is `"$"`
    Variable(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `and`
    And,
    /// `or`
    Or,
    /// `in`
    In,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `&`
    Ampersand,
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
    /// `.`
    Dot,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `?`
    Question,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::String(s) => write!(f, "\"{s}\""),
            Token::Name(name) => write!(f, "{name}"),
            Token::Variable(name) => write!(f, "${name}"),
            other => f.write_str(match other {
                Token::True => "true",
                Token::False => "false",
                Token::Null => "null",
                Token::And => "and",
                Token::Or => "or",
                Token::In => "in",
                Token::Plus => "+",
                Token::Minus => "-",
                Token::Star => "*",
                Token::Slash => "/",
                Token::Percent => "%",
                Token::Ampersand => "&",
                Token::Equal => "=",
                Token::NotEqual => "!=",
                Token::Less => "<",
                Token::LessEqual => "<=",
                Token::Greater => ">",
                Token::GreaterEqual => ">=",
                Token::Dot => ".",
                Token::LeftParen => "(",
                Token::RightParen => ")",
                Token::LeftBracket => "[",
                Token::RightBracket => "]",
                Token::LeftBrace => "{",
                Token::RightBrace => "}",
                Token::Comma => ",",
                Token::Colon => ":",
                _ => "?",
            }),
        }
    }
}

type TokenResult<'a> = IResult<Span<'a>, Token, JsonataError>;

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_xid_start()
}

fn is_name_char(c: char) -> bool {
    c == '_' || c.is_xid_continue()
}

/// Whitespace and `/* */` comments
fn trivia(input: Span<'_>) -> IResult<Span<'_>, (), JsonataError> {
    let (rest, _) = many0(alt((
        multispace1,
        recognize(delimited(tag("/*"), take_until("*/"), tag("*/"))),
    )))
    .parse(input)?;
    Ok((rest, ()))
}

fn number(input: Span<'_>) -> TokenResult<'_> {
    let (rest, text) = recognize((
        digit1,
        opt(pair(char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;
    let parsed = text.fragment().parse::<f64>().map_err(|_| {
        nom::Err::Failure(JsonataError::Syntax {
            position: input.location_offset(),
            message: format!("invalid number '{}'", text.fragment()),
        })
    })?;
    Ok((rest, Token::Number(parsed)))
}

fn string_literal(input: Span<'_>) -> TokenResult<'_> {
    let start = input.location_offset();
    let (body, quote) = one_of("\"'").parse(input)?;
    let mut text = String::new();
    let mut chars = body.fragment().char_indices();

    while let Some((offset, c)) = chars.next() {
        if c == quote {
            let (rest, _) = body.take_split(offset + c.len_utf8());
            return Ok((rest, Token::String(text)));
        }
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some((_, 'n')) => text.push('\n'),
            Some((_, 't')) => text.push('\t'),
            Some((_, 'r')) => text.push('\r'),
            Some((_, 'b')) => text.push('\u{0008}'),
            Some((_, 'f')) => text.push('\u{000C}'),
            Some((escape_offset, 'u')) => {
                let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
                let decoded = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                match decoded {
                    Some(decoded) => text.push(decoded),
                    None => {
                        return Err(nom::Err::Failure(JsonataError::Syntax {
                            position: body.location_offset() + escape_offset,
                            message: format!("invalid unicode escape '\\u{hex}'"),
                        }));
                    }
                }
            }
            Some((_, other)) => text.push(other),
            None => break,
        }
    }

    Err(nom::Err::Failure(JsonataError::UnclosedString { position: start }))
}

fn quoted_name(input: Span<'_>) -> TokenResult<'_> {
    let (rest, name) = delimited(char('`'), take_until("`"), char('`')).parse(input)?;
    Ok((rest, Token::Name(name.fragment().to_string())))
}

fn variable(input: Span<'_>) -> TokenResult<'_> {
    let (rest, (_, name)) =
        pair(char('$'), alt((tag("$"), take_while(is_name_char)))).parse(input)?;
    Ok((rest, Token::Variable(name.fragment().to_string())))
}

fn name_or_keyword(input: Span<'_>) -> TokenResult<'_> {
    let (rest, name) =
        recognize(pair(take_while1(is_name_start), take_while(is_name_char))).parse(input)?;
    let token = match *name.fragment() {
        "and" => Token::And,
        "or" => Token::Or,
        "in" => Token::In,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        other => Token::Name(other.to_string()),
    };
    Ok((rest, token))
}

fn operator(input: Span<'_>) -> TokenResult<'_> {
    alt((
        value(Token::NotEqual, tag("!=")),
        value(Token::LessEqual, tag("<=")),
        value(Token::GreaterEqual, tag(">=")),
        value(Token::Plus, char('+')),
        value(Token::Minus, char('-')),
        value(Token::Star, char('*')),
        value(Token::Slash, char('/')),
        value(Token::Percent, char('%')),
        value(Token::Ampersand, char('&')),
        value(Token::Equal, char('=')),
        value(Token::Less, char('<')),
        value(Token::Greater, char('>')),
        value(Token::Dot, char('.')),
        value(Token::Comma, char(',')),
        value(Token::Colon, char(':')),
        value(Token::Question, char('?')),
        alt((
            value(Token::LeftParen, char('(')),
            value(Token::RightParen, char(')')),
            value(Token::LeftBracket, char('[')),
            value(Token::RightBracket, char(']')),
            value(Token::LeftBrace, char('{')),
            value(Token::RightBrace, char('}')),
        )),
    ))
    .parse(input)
}

fn token(input: Span<'_>) -> TokenResult<'_> {
    alt((
        number,
        string_literal,
        quoted_name,
        variable,
        name_or_keyword,
        operator,
    ))
    .parse(input)
}

/// Split an expression into spanned tokens
pub fn tokenize(expression: &str) -> JsonataResult<Vec<Spanned<Token>>> {
    let mut input = Span::new(expression);
    let mut tokens = Vec::new();

    loop {
        let (rest, ()) = trivia(input).map_err(into_error)?;
        if rest.fragment().is_empty() {
            return Ok(tokens);
        }
        match token(rest) {
            Ok((next, token)) => {
                tokens.push(Spanned::between(&rest, &next, token));
                input = next;
            }
            Err(nom::Err::Failure(err)) => return Err(err),
            Err(_) => {
                return Err(JsonataError::InvalidCharacter {
                    character: rest.fragment().chars().next().unwrap_or_default(),
                    position: rest.location_offset(),
                });
            }
        }
    }
}

fn into_error(err: nom::Err<JsonataError>) -> JsonataError {
    match err {
        nom::Err::Error(err) | nom::Err::Failure(err) => err,
        nom::Err::Incomplete(_) => JsonataError::UnexpectedEof,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(expression: &str) -> Vec<Token> {
        tokenize(expression)
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn test_path_and_operators() {
        assert_eq!(
            kinds("data.age >= 18 and data.name != ''"),
            vec![
                Token::Name("data".into()),
                Token::Dot,
                Token::Name("age".into()),
                Token::GreaterEqual,
                Token::Number(18.0),
                Token::And,
                Token::Name("data".into()),
                Token::Dot,
                Token::Name("name".into()),
                Token::NotEqual,
                Token::String(String::new()),
            ]
        );
    }

    #[test]
    fn test_variables_and_functions() {
        assert_eq!(
            kinds("$count($$.items) + $"),
            vec![
                Token::Variable("count".into()),
                Token::LeftParen,
                Token::Variable("$".into()),
                Token::Dot,
                Token::Name("items".into()),
                Token::RightParen,
                Token::Plus,
                Token::Variable(String::new()),
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#"1.5e2 "a\"b\n" 'c' `first name` true null"#),
            vec![
                Token::Number(150.0),
                Token::String("a\"b\n".into()),
                Token::String("c".into()),
                Token::Name("first name".into()),
                Token::True,
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a /* note */ + 1"),
            vec![Token::Name("a".into()), Token::Plus, Token::Number(1.0)]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("ab + 'cd'").unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (0, 2));
        assert_eq!((tokens[2].start, tokens[2].end), (5, 9));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            tokenize("'open").unwrap_err(),
            JsonataError::UnclosedString { position: 0 }
        );
        assert_eq!(
            tokenize("a # b").unwrap_err(),
            JsonataError::InvalidCharacter {
                character: '#',
                position: 2
            }
        );
    }
}
