// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Data model shared across the microcheck crates.
//!
//! This crate describes the records fetched from the test metadata store ([`TestRecord`]), the
//! build-system identifiers that are ultimately scheduled ([`Target`]), the operating systems
//! that tests run on ([`OperatingSystem`]), and the documented exit codes of the `microcheck`
//! binary ([`MicrocheckExitCode`]).

mod errors;
mod exit_codes;
mod record;

pub use errors::*;
pub use exit_codes::*;
pub use record::*;
