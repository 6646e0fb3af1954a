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

//! Logic-less mustache rendering
//!
//! Supported tags: `{{path}}`, `{{{path}}}`, `{{&path}}`, sections `{{#path}}`,
//! inverted sections `{{^path}}` and comments `{{! ...}}`. Output is never
//! HTML-escaped: the rendered values are data, not markup.

use super::is_truthy;
use super::registry::SyncTemplateLanguage;
use crate::error::{FormError, Result};
use crate::path::get_path;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_until},
    combinator::map,
    sequence::delimited,
};
use nom_locate::LocatedSpan;
use serde_json::Value;

type Span<'a> = LocatedSpan<&'a str>;

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Variable(&'a str),
    Open { path: &'a str, inverted: bool },
    Close(&'a str),
    Comment,
}

/// Parsed template node
#[derive(Debug, Clone, PartialEq)]
enum Node<'a> {
    Text(&'a str),
    Variable(&'a str),
    Section {
        path: &'a str,
        inverted: bool,
        children: Vec<Node<'a>>,
    },
}

fn classify(inner: &str) -> Token<'_> {
    let inner = inner.trim();
    let mut chars = inner.chars();
    match chars.next() {
        Some('#') => Token::Open {
            path: chars.as_str().trim(),
            inverted: false,
        },
        Some('^') => Token::Open {
            path: chars.as_str().trim(),
            inverted: true,
        },
        Some('/') => Token::Close(chars.as_str().trim()),
        Some('!') => Token::Comment,
        Some('&') => Token::Variable(chars.as_str().trim()),
        _ => Token::Variable(inner),
    }
}

fn tag_token<'a>(input: Span<'a>) -> IResult<Span<'a>, Token<'a>> {
    alt((
        map(
            delimited(tag("{{{"), take_until("}}}"), tag("}}}")),
            |inner: Span<'a>| Token::Variable(inner.into_fragment().trim()),
        ),
        map(
            delimited(tag("{{"), take_until("}}"), tag("}}")),
            |inner: Span<'a>| classify(inner.into_fragment()),
        ),
    ))
    .parse(input)
}

fn tokenize(template: &str) -> Result<Vec<(usize, Token<'_>)>> {
    let mut input = Span::new(template);
    let mut tokens = Vec::new();

    while !input.fragment().is_empty() {
        let position = input.location_offset();
        match take_until::<_, _, nom::error::Error<Span<'_>>>("{{").parse(input) {
            Ok((rest, text)) => {
                if !text.fragment().is_empty() {
                    tokens.push((position, Token::Text(text.into_fragment())));
                }
                let tag_position = rest.location_offset();
                let (rest, token) = tag_token(rest)
                    .map_err(|_| FormError::template_syntax(tag_position, "unclosed tag"))?;
                tokens.push((tag_position, token));
                input = rest;
            }
            Err(_) => {
                tokens.push((position, Token::Text(input.into_fragment())));
                break;
            }
        }
    }

    Ok(tokens)
}

fn parse(template: &str) -> Result<Vec<Node<'_>>> {
    struct OpenSection<'a> {
        path: &'a str,
        inverted: bool,
        position: usize,
        siblings: Vec<Node<'a>>,
    }

    let mut stack: Vec<OpenSection<'_>> = Vec::new();
    let mut current: Vec<Node<'_>> = Vec::new();

    for (position, token) in tokenize(template)? {
        match token {
            Token::Text(text) => current.push(Node::Text(text)),
            Token::Variable(path) => current.push(Node::Variable(path)),
            Token::Comment => {}
            Token::Open { path, inverted } => {
                stack.push(OpenSection {
                    path,
                    inverted,
                    position,
                    siblings: std::mem::take(&mut current),
                });
            }
            Token::Close(path) => {
                let Some(open) = stack.pop() else {
                    return Err(FormError::template_syntax(
                        position,
                        format!("closing tag '{path}' without an open section"),
                    ));
                };
                if open.path != path {
                    return Err(FormError::template_syntax(
                        position,
                        format!("section '{}' closed by '{path}'", open.path),
                    ));
                }
                let children = std::mem::replace(&mut current, open.siblings);
                current.push(Node::Section {
                    path: open.path,
                    inverted: open.inverted,
                    children,
                });
            }
        }
    }

    if let Some(open) = stack.pop() {
        return Err(FormError::template_syntax(
            open.position,
            format!("section '{}' is never closed", open.path),
        ));
    }
    Ok(current)
}

/// Resolve a name against the scope stack, innermost scope first
fn lookup<'v>(scopes: &[&'v Value], path: &str) -> Option<&'v Value> {
    if path == "." {
        return scopes.last().copied();
    }
    let head = path.split('.').next().unwrap_or_default();
    scopes
        .iter()
        .rev()
        .copied()
        .find(|scope| scope.get(head).is_some())
        .and_then(|scope| get_path(scope, path))
}

fn stringify(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(text) => out.push_str(text),
        Value::Bool(_) | Value::Number(_) => out.push_str(&value.to_string()),
        Value::Array(_) | Value::Object(_) => {
            out.push_str(&serde_json::to_string(value).unwrap_or_default())
        }
    }
}

fn render_nodes<'v>(nodes: &[Node<'_>], scopes: &mut Vec<&'v Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable(path) => {
                if let Some(value) = lookup(scopes, path) {
                    stringify(value, out);
                }
            }
            Node::Section {
                path,
                inverted,
                children,
            } => {
                let value = lookup(scopes, path);
                let truthy = is_truthy(value);
                match (inverted, value) {
                    (true, _) => {
                        if !truthy {
                            render_nodes(children, scopes, out);
                        }
                    }
                    (false, Some(Value::Array(items))) => {
                        for item in items {
                            scopes.push(item);
                            render_nodes(children, scopes, out);
                            scopes.pop();
                        }
                    }
                    (false, Some(value)) if truthy => {
                        scopes.push(value);
                        render_nodes(children, scopes, out);
                        scopes.pop();
                    }
                    (false, _) => {}
                }
            }
        }
    }
}

/// Render a template against a context
pub fn render(template: &str, context: &Value) -> Result<String> {
    let nodes = parse(template)?;
    let mut out = String::with_capacity(template.len());
    let mut scopes = vec![context];
    render_nodes(&nodes, &mut scopes, &mut out);
    Ok(out)
}

/// The default template language
#[derive(Debug, Clone, Copy, Default)]
pub struct MustacheLanguage;

impl SyncTemplateLanguage for MustacheLanguage {
    fn name(&self) -> &'static str {
        "mustache"
    }

    fn evaluate(&self, expression: &str, context: &Value) -> Result<Option<Value>> {
        render(expression, context).map(|text| Some(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn context() -> Value {
        json!({
            "name": "Sam",
            "html": "<b>bold</b>",
            "data": {"age": 30, "tags": ["a", "b"], "active": false, "empty": ""},
            "people": [{"name": "Ann"}, {"name": "Bo"}],
            "nothing": null
        })
    }

    #[rstest]
    #[case("Hello {{name}}", "Hello Sam")]
    #[case("Hello {{ name }}!", "Hello Sam!")]
    #[case("{{html}}", "<b>bold</b>")]
    #[case("{{{html}}}", "<b>bold</b>")]
    #[case("{{& html}}", "<b>bold</b>")]
    #[case("{{data.age}}", "30")]
    #[case("{{data.tags}}", "[\"a\",\"b\"]")]
    #[case("{{data.missing}}", "")]
    #[case("{{nothing}}", "")]
    #[case("a{{! a comment }}b", "ab")]
    #[case("{{#people}}{{name}},{{/people}}", "Ann,Bo,")]
    #[case("{{#data}}{{age}}{{/data}}", "30")]
    #[case("{{#data.active}}yes{{/data.active}}", "")]
    #[case("{{^data.active}}no{{/data.active}}", "no")]
    #[case("{{^data.empty}}blank{{/data.empty}}", "blank")]
    #[case("{{#data.tags}}{{.}}{{/data.tags}}", "ab")]
    #[case("{{#people}}{{name}}-{{data.age}} {{/people}}", "Ann-30 Bo-30 ")]
    #[case("no tags at all", "no tags at all")]
    #[case("", "")]
    fn test_render(#[case] template: &str, #[case] expected: &str) {
        assert_eq!(render(template, &context()).unwrap(), expected);
    }

    #[rstest]
    #[case("Hello {{name")]
    #[case("{{#a}}open")]
    #[case("{{/a}}")]
    #[case("{{#a}}{{/b}}")]
    fn test_syntax_errors(#[case] template: &str) {
        let err = render(template, &context()).unwrap_err();
        assert!(matches!(err, FormError::TemplateSyntax { .. }), "{err:?}");
    }

    #[test]
    fn test_error_position() {
        match render("abc {{#x}}", &json!({})).unwrap_err() {
            FormError::TemplateSyntax { position, .. } => assert_eq!(position, 4),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
