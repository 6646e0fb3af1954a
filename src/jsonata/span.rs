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

//! Source location tracking for the tokenizer

use nom_locate::LocatedSpan;

/// Located span over the expression text
pub type Span<'a> = LocatedSpan<&'a str>;

/// A value with its byte range in the expression
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// The value
    pub value: T,
    /// Start offset
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl<T> Spanned<T> {
    /// Create a new spanned value
    pub fn new(value: T, start: usize, end: usize) -> Self {
        Self { value, start, end }
    }

    /// Spanned value covering the text between two span positions
    pub fn between(start: &Span<'_>, end: &Span<'_>, value: T) -> Self {
        Self::new(value, start.location_offset(), end.location_offset())
    }
}
