// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for microcheck: deciding which test targets a CI worker runs.
//!
//! The basic flow for a selection run is:
//!
//! 1. Build an [`Executor`](executor::Executor) for the worker from a
//!    [`ShardSpec`](partition::ShardSpec).
//! 2. Query the build graph for the team's candidate targets, then apply the selection mode with
//!    a [`TargetSelector`](select::TargetSelector). Flaky and high-impact targets are resolved
//!    from the per-team YAML file, the test metadata store, version control and `@microcheck`
//!    pragmas.
//! 3. Slice the sorted result into the worker's shards with
//!    [`Executor::worker_targets`](executor::Executor::worker_targets).
//!
//! External systems (version control, the build-graph tool, the metadata store, the container
//! runtime) sit behind traits so that selection can be driven entirely from in-memory data.

pub mod build_graph;
mod command;
pub mod config;
pub mod errors;
pub mod executor;
pub mod flaky;
pub mod high_impact;
pub mod impact;
pub mod partition;
pub mod select;
pub mod store;
pub mod vcs;
