// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while composing queries.

use thiserror::Error;

/// An error that occurred while composing a build-graph query.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum QueryComposeError {
    /// No target patterns were provided.
    #[error("at least one target pattern is required")]
    NoTargets,

    /// A target pattern can't be embedded in a query.
    #[error("target pattern `{target}` is invalid: {reason}")]
    InvalidTarget {
        /// The target pattern.
        target: String,

        /// Why the pattern was rejected.
        reason: &'static str,
    },

    /// The team name was empty.
    #[error("team name must not be empty")]
    EmptyTeam,

    /// A word contains both kinds of quotes, so it can't be quoted in the query language.
    #[error("`{word}` contains both single and double quotes and can't be quoted")]
    UnquotableWord {
        /// The word that couldn't be quoted.
        word: String,
    },
}
