// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use itertools::Itertools;
use regex::Regex;
use std::fmt;

/// A word-boundary pattern that matches one tag (or any of several tags) as a whole token.
///
/// The pattern for `tag` matches the word `tag` but not `atagb`. Tags are free-form, so regex
/// metacharacters in them are escaped.
///
/// `\b` only holds next to a word character, so an edge of the tag that is punctuation (as in
/// `c++` or `-x`) is bounded by `(^|\W)` or `(\W|$)` instead.
///
/// The `Display` form is what gets embedded in a query: every backslash is doubled, since the
/// query string is unescaped once more before the build tool compiles it. For example, the tag
/// `team:core` is displayed as `\\bteam:core\\b`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TagMatcher {
    source: String,
}

impl TagMatcher {
    /// Creates a matcher for a single tag.
    pub fn new(tag: &str) -> Self {
        Self {
            source: bounded(tag),
        }
    }

    /// Creates a matcher that matches any of the given tags, or `None` if there are no tags.
    ///
    /// A single tag produces the same pattern as [`TagMatcher::new`].
    pub fn any<'a>(tags: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let tags: Vec<_> = tags.into_iter().collect();
        match tags.as_slice() {
            [] => None,
            [tag] => Some(Self::new(tag)),
            tags if tags.iter().all(|tag| has_word_edges(tag)) => Some(Self {
                source: format!(
                    r"\b({})\b",
                    tags.iter().map(|tag| regex::escape(tag)).format("|")
                ),
            }),
            // Each alternative carries its own edges.
            tags => Some(Self {
                source: format!("({})", tags.iter().map(|tag| bounded(tag)).format("|")),
            }),
        }
    }

    /// Returns the regex source, with single backslashes.
    pub fn regex_source(&self) -> &str {
        &self.source
    }

    /// Compiles the regex source.
    pub fn to_regex(&self) -> Result<Regex, regex::Error> {
        Regex::new(&self.source)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn has_word_edges(tag: &str) -> bool {
    tag.chars().next().is_none_or(is_word_char) && tag.chars().next_back().is_none_or(is_word_char)
}

fn bounded(tag: &str) -> String {
    let start = match tag.chars().next() {
        Some(c) if !is_word_char(c) => r"(^|\W)",
        _ => r"\b",
    };
    let end = match tag.chars().next_back() {
        Some(c) if !is_word_char(c) => r"(\W|$)",
        _ => r"\b",
    };
    format!("{start}{}{end}", regex::escape(tag))
}

impl fmt::Display for TagMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.source.chars() {
            if c == '\\' {
                f.write_str(r"\\")?;
            } else {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}
