// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests affected by a change: tests that depend on changed files, and tests pinned by a
//! `@microcheck` pragma in the change description.

use crate::{
    build_graph::BuildGraph,
    errors::SelectionError,
    vcs::{ChangeContext, VersionControl},
};
use camino::Utf8PathBuf;
use microcheck_metadata::Target;
use std::collections::BTreeSet;
use tracing::debug;

/// The pragma that pins tests from a change description.
pub const PRAGMA: &str = "@microcheck";

/// Resolves the files a change touches into the test targets that depend on them.
#[derive(Clone, Copy)]
pub struct ChangeImpactResolver<'a> {
    vcs: &'a dyn VersionControl,
    build_graph: &'a dyn BuildGraph,
    change_context: &'a ChangeContext,
}

impl<'a> ChangeImpactResolver<'a> {
    /// Creates a new resolver.
    pub fn new(
        vcs: &'a dyn VersionControl,
        build_graph: &'a dyn BuildGraph,
        change_context: &'a ChangeContext,
    ) -> Self {
        Self {
            vcs,
            build_graph,
            change_context,
        }
    }

    /// Returns the files changed between the base branch and the commit.
    pub fn changed_files(&self) -> Result<BTreeSet<Utf8PathBuf>, SelectionError> {
        let cx = self.change_context.resolve()?;
        Ok(self.vcs.changed_files(cx)?)
    }

    /// Returns the test targets that depend on any changed file.
    pub fn changed_tests(&self) -> Result<BTreeSet<Target>, SelectionError> {
        let mut tests = BTreeSet::new();
        for file in self.changed_files()? {
            let dependents = self.build_graph.targets_depending_on(&file)?;
            debug!("{} test(s) depend on `{file}`", dependents.len());
            tests.extend(dependents);
        }
        Ok(tests)
    }
}

/// Reads the tests a developer pinned with a `@microcheck` pragma.
#[derive(Clone, Copy)]
pub struct PragmaResolver<'a> {
    vcs: &'a dyn VersionControl,
    change_context: &'a ChangeContext,
}

impl<'a> PragmaResolver<'a> {
    /// Creates a new resolver.
    pub fn new(vcs: &'a dyn VersionControl, change_context: &'a ChangeContext) -> Self {
        Self {
            vcs,
            change_context,
        }
    }

    /// Returns the targets named by the first pragma line in the change description.
    pub fn human_specified_tests(&self) -> Result<BTreeSet<Target>, SelectionError> {
        let cx = self.change_context.resolve()?;
        let description = self.vcs.change_description(cx)?;
        Ok(parse_pragma(&description).unwrap_or_default())
    }
}

/// Finds the first `@microcheck` line in `text` and returns the targets listed on it.
///
/// The pragma must start the line and be followed by whitespace or the end of the line. Returns
/// `None` if there is no such line.
pub fn parse_pragma(text: &str) -> Option<BTreeSet<Target>> {
    text.lines().find_map(|line| {
        let rest = line.strip_prefix(PRAGMA)?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some(rest.split_whitespace().map(Target::from).collect())
    })
}
