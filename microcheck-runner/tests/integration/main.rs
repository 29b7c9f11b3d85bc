// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end selection tests, driven by in-memory collaborators.

mod fixtures;
mod flaky;
mod selection;
mod sharding;
