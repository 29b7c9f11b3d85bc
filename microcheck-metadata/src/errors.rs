// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An operating system name was not recognized.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error(
    "unknown operating system `{input}` (known values: {})",
    crate::OperatingSystem::variants().join(", "),
)]
pub struct UnknownOperatingSystem {
    input: String,
}

impl UnknownOperatingSystem {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}
