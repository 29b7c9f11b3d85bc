// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::QueryComposeError;
use itertools::Itertools;
use std::fmt;

/// A quoted word in the query language.
///
/// Words are single-quoted unless they contain a single quote, in which case they are
/// double-quoted. The query language has no escapes inside quotes, so a word containing both kinds
/// of quote is rejected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuotedWord(String);

impl QuotedWord {
    /// Creates a new quoted word.
    pub fn new(word: impl Into<String>) -> Result<Self, QueryComposeError> {
        let word = word.into();
        if word.contains('\'') && word.contains('"') {
            Err(QueryComposeError::UnquotableWord { word })
        } else {
            Ok(Self(word))
        }
    }

    /// Returns the unquoted word.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuotedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.contains('\'') {
            write!(f, "\"{}\"", self.0)
        } else {
            write!(f, "'{}'", self.0)
        }
    }
}

/// A build-graph query expression.
///
/// The binary set operators (`union`, `intersect`, `except`) share one precedence level and
/// associate to the left, so compound right-hand operands must be wrapped in
/// [`QueryExpr::Group`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryExpr {
    /// A target pattern, written verbatim, e.g. `//python/ray/...`.
    Pattern(String),

    /// A quoted word.
    Word(QuotedWord),

    /// `tests(<expr>)`: the test targets in an expression.
    Tests(Box<QueryExpr>),

    /// `attr(<attribute>, <pattern>, <expr>)`: targets whose attribute matches a pattern.
    Attr {
        /// The attribute name, e.g. `tags`.
        attribute: String,

        /// The pattern the attribute must match.
        pattern: QuotedWord,

        /// The input set.
        expr: Box<QueryExpr>,
    },

    /// `rdeps(<universe>, <expr>[, <depth>])`: reverse dependencies within a universe.
    Rdeps {
        /// The universe to search.
        universe: Box<QueryExpr>,

        /// The set whose reverse dependencies are computed.
        expr: Box<QueryExpr>,

        /// The maximum depth, or unbounded if `None`.
        depth: Option<u32>,
    },

    /// `a union b union ...`
    Union(Vec<QueryExpr>),

    /// `a intersect b`
    Intersect(Box<QueryExpr>, Box<QueryExpr>),

    /// `a except b`
    Except(Box<QueryExpr>, Box<QueryExpr>),

    /// `(<expr>)`
    Group(Box<QueryExpr>),
}

impl QueryExpr {
    /// Creates a target pattern expression.
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern(pattern.into())
    }

    /// Creates an `attr` filter over `expr`.
    pub fn attr(attribute: impl Into<String>, pattern: QuotedWord, expr: QueryExpr) -> Self {
        Self::Attr {
            attribute: attribute.into(),
            pattern,
            expr: Box::new(expr),
        }
    }

    /// Creates the union of several expressions.
    ///
    /// A union of a single expression is that expression.
    pub fn union(exprs: impl IntoIterator<Item = QueryExpr>) -> Self {
        let mut exprs: Vec<_> = exprs.into_iter().collect();
        if exprs.len() == 1 {
            exprs.swap_remove(0)
        } else {
            Self::Union(exprs)
        }
    }

    /// Wraps this expression in `tests(...)`.
    pub fn tests(self) -> Self {
        Self::Tests(Box::new(self))
    }

    /// Wraps this expression in parentheses.
    pub fn group(self) -> Self {
        Self::Group(Box::new(self))
    }

    /// Returns `self intersect other`.
    pub fn intersect(self, other: QueryExpr) -> Self {
        Self::Intersect(Box::new(self), Box::new(other))
    }

    /// Returns `self except other`.
    pub fn except(self, other: QueryExpr) -> Self {
        Self::Except(Box::new(self), Box::new(other))
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(pattern) => f.write_str(pattern),
            Self::Word(word) => write!(f, "{word}"),
            Self::Tests(expr) => write!(f, "tests({expr})"),
            Self::Attr {
                attribute,
                pattern,
                expr,
            } => write!(f, "attr({attribute}, {pattern}, {expr})"),
            Self::Rdeps {
                universe,
                expr,
                depth: Some(depth),
            } => write!(f, "rdeps({universe}, {expr}, {depth})"),
            Self::Rdeps {
                universe,
                expr,
                depth: None,
            } => write!(f, "rdeps({universe}, {expr})"),
            Self::Union(exprs) => write!(f, "{}", exprs.iter().format(" union ")),
            Self::Intersect(expr_1, expr_2) => write!(f, "{expr_1} intersect {expr_2}"),
            Self::Except(expr_1, expr_2) => write!(f, "{expr_1} except {expr_2}"),
            Self::Group(expr) => write!(f, "({expr})"),
        }
    }
}
