// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for microcheck.
//!
//! There are two kinds of configuration:
//!
//! * The tool configuration in `.config/microcheck.toml`, layered over built-in defaults. See
//!   [`MicrocheckConfig`].
//! * Per-team test configuration in `<yaml-dir>/<team>.tests.yml`, which lists each team's flaky
//!   tests. See [`TeamTestConfig`].

mod team_config;
mod tool_config;

pub use team_config::*;
pub use tool_config::*;
