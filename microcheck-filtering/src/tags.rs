// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use itertools::Itertools;
use std::{collections::BTreeSet, convert::Infallible, fmt, str::FromStr};

/// The tag that is always excluded from selection.
pub const DEFAULT_EXCEPT_TAG: &str = "manual";

/// A comma-separated set of tags, e.g. `gpu,xcommit`.
///
/// Order doesn't matter and duplicates collapse. Surrounding whitespace is trimmed and empty
/// tokens are ignored, so `""` is the empty set. The `Display` form lists tags in sorted order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagSet {
    tags: BTreeSet<String>,
}

impl TagSet {
    /// Creates an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated tag expression.
    pub fn parse(input: &str) -> Self {
        input
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect()
    }

    /// Adds a tag, returning true if it wasn't already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    /// Returns true if the tag is present.
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns true if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Returns the number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Iterates over the tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.tags.iter().map(String::as_str)
    }
}

impl FromStr for TagSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            tags: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tags.iter().format(","))
    }
}

/// Adds [`DEFAULT_EXCEPT_TAG`] to a comma-separated list of excluded tags.
///
/// The result always contains `manual` exactly once. Applying this twice is the same as applying
/// it once.
pub fn add_default_except_tags(except_tags: &str) -> String {
    let mut tags = TagSet::parse(except_tags);
    tags.insert(DEFAULT_EXCEPT_TAG);
    tags.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test_case("", "" ; "empty")]
    #[test_case("tag", "tag" ; "single")]
    #[test_case("b,a,b", "a,b" ; "duplicates collapse")]
    #[test_case(" a , ,b,", "a,b" ; "whitespace and empty tokens")]
    fn tag_set_parse(input: &str, expected: &str) {
        assert_eq!(TagSet::parse(input).to_string(), expected);
    }

    #[test]
    fn default_except_tags() {
        let tags = add_default_except_tags("tag1,tag2");
        let expected: BTreeSet<_> = ["tag1", "tag2", "manual"].into_iter().collect();
        assert_eq!(tags.split(',').collect::<BTreeSet<_>>(), expected);
        assert_eq!(add_default_except_tags(""), "manual");
        assert_eq!(add_default_except_tags("manual"), "manual");
        assert_eq!(add_default_except_tags("manual,manual"), "manual");
    }

    #[proptest]
    fn default_except_tags_idempotent(#[strategy("[a-z,]{0,20}")] input: String) {
        let once = add_default_except_tags(&input);
        let twice = add_default_except_tags(&once);
        proptest::prop_assert!(TagSet::parse(&once).contains(DEFAULT_EXCEPT_TAG));
        proptest::prop_assert_eq!(TagSet::parse(&once), TagSet::parse(&twice));
        proptest::prop_assert_eq!(
            once.split(',').filter(|tag| *tag == DEFAULT_EXCEPT_TAG).count(),
            1
        );
    }
}
