// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `microcheck` failures.
///
/// A selection run may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum MicrocheckExitCode {}

impl MicrocheckExitCode {
    /// No errors occurred and microcheck exited normally.
    pub const OK: i32 = 0;

    /// The selection produced no targets for this worker and `--fail-on-empty` was passed.
    pub const NO_TARGETS_SELECTED: i32 = 4;

    /// The version-control context (base branch or commit) was missing.
    pub const ENVIRONMENT_MISSING: i32 = 91;

    /// The team, operating system or shard layout could not be mapped to an executor.
    pub const CONFIGURATION_ERROR: i32 = 92;

    /// A user issue happened while setting up a microcheck invocation, for example a malformed
    /// config file.
    pub const SETUP_ERROR: i32 = 96;

    /// The build-graph query tool failed.
    pub const QUERY_FAILED: i32 = 102;

    /// The test metadata store could not be read.
    pub const METADATA_STORE_FAILED: i32 = 103;

    /// A version-control command failed.
    pub const VCS_FAILED: i32 = 104;

    /// Installing the executor's runtime image failed.
    pub const INSTALL_FAILED: i32 = 105;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
