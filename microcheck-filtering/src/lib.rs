// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Building blocks for the queries microcheck hands to the build-graph tool.
//!
//! Queries are assembled as a typed [`QueryExpr`] tree and only turned into text at the boundary,
//! through `Display`. The text form is a wire contract: golden tests compare it byte for byte.
//!
//! * [`TagMatcher`] builds word-boundary patterns for tags.
//! * [`TagSet`] is an order-insensitive, comma-separated set of tags.
//! * [`TestQueryBuilder`] composes the team/tag query for a set of target patterns.

mod compose;
pub mod errors;
mod expression;
mod tag_matcher;
mod tags;

pub use compose::{TestQueryBuilder, compose_test_query, rdeps_tests_query};
pub use expression::{QueryExpr, QuotedWord};
pub use tag_matcher::TagMatcher;
pub use tags::{DEFAULT_EXCEPT_TAG, TagSet, add_default_except_tags};
