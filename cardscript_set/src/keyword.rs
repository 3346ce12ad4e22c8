// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keywords.

/// A keyword: a word on cards that expands to reminder text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyword {
    /// The keyword as it appears in card text.
    pub keyword: String,
    /// The text explaining it.
    pub reminder: String,
}

impl Keyword {
    /// Creates a keyword.
    #[must_use]
    pub fn new(keyword: impl Into<String>, reminder: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            reminder: reminder.into(),
        }
    }
}
