// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Select, filter and shard CI test targets.
//!
//! `microcheck select` prints the targets one CI worker runs. Selection combines a team/tag query
//! against the build graph with flaky and high-impact test information from per-team YAML files,
//! the test metadata store, version control and `@microcheck` pragmas. The result is split into
//! deterministic shards, so that every worker in the fleet agrees on who runs what.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, StderrStyles};
