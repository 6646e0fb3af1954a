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

//! The `[[tag]]` prefix protocol

/// Split `[[tag]] body` into `(tag, body)`
///
/// The tag must open the string and consist of ASCII alphanumerics, `-` or `_`.
/// Leading whitespace of the body is dropped.
pub fn split_tag(template: &str) -> Option<(&str, &str)> {
    let rest = template.strip_prefix("[[")?;
    let end = rest.find("]]")?;
    let tag = &rest[..end];
    let valid = !tag.is_empty()
        && tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid {
        return None;
    }
    Some((tag, rest[end + 2..].trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[[jsonata]] a.b", Some(("jsonata", "a.b")))]
    #[case("[[jsonata]]a.b", Some(("jsonata", "a.b")))]
    #[case("[[my-lang_2]]\n  x", Some(("my-lang_2", "x")))]
    #[case("Hello {{name}}", None)]
    #[case(" [[jsonata]] a", None)]
    #[case("[[]] a", None)]
    #[case("[[a b]] c", None)]
    #[case("[[jsonata", None)]
    fn test_split_tag(#[case] template: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(split_tag(template), expected);
    }
}
