// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queries against the build graph.

use crate::{
    command::{ToolCli, output_lines},
    errors::BuildGraphError,
};
use camino::{Utf8Path, Utf8PathBuf};
use microcheck_filtering::rdeps_tests_query;
use microcheck_metadata::Target;
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};
use tracing::debug;

/// The build graph, as seen by microcheck.
pub trait BuildGraph {
    /// Evaluates a query and returns the matching targets, in the order the tool reports them.
    fn query(&self, query: &str) -> Result<Vec<Target>, BuildGraphError>;

    /// Returns the test targets that depend on a source file.
    ///
    /// Files that aren't part of the build graph have no dependents.
    fn targets_depending_on(&self, path: &Utf8Path) -> Result<BTreeSet<Target>, BuildGraphError>;
}

/// [`BuildGraph`] backed by `bazel query`.
#[derive(Clone, Debug)]
pub struct BazelCli {
    bazel_path: String,
    workspace_root: Utf8PathBuf,
}

impl BazelCli {
    /// Creates a new `BazelCli` that runs `bazel_path` inside `workspace_root`.
    pub fn new(bazel_path: impl Into<String>, workspace_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            bazel_path: bazel_path.into(),
            workspace_root: workspace_root.into(),
        }
    }

    fn query_cli<'a>(&'a self, query: &'a str) -> ToolCli<'a> {
        let mut cli = ToolCli::new(&self.bazel_path);
        cli.current_dir(&self.workspace_root)
            .add_args(["query", query, "--output=label"]);
        cli
    }
}

impl BuildGraph for BazelCli {
    fn query(&self, query: &str) -> Result<Vec<Target>, BuildGraphError> {
        debug!("running build graph query: {query}");
        let output = self
            .query_cli(query)
            .read()
            .map_err(|err| BuildGraphError::QueryFailed {
                query: query.to_owned(),
                err,
            })?;
        Ok(output_lines(&output).map(Target::from).collect())
    }

    fn targets_depending_on(&self, path: &Utf8Path) -> Result<BTreeSet<Target>, BuildGraphError> {
        let query = rdeps_tests_query(path.as_str())?.to_string();
        let result = self.query_cli(&query).read();
        match result {
            Ok(output) => Ok(output_lines(&output).map(Target::from).collect()),
            Err(err) if err.is_failed_exit() => {
                // Typically the file isn't a source of any target.
                debug!("no dependents for `{path}`: {err}");
                Ok(BTreeSet::new())
            }
            Err(err) => Err(BuildGraphError::QueryFailed { query, err }),
        }
    }
}

/// In-memory [`BuildGraph`].
///
/// Every query returns the same list of targets. The queries that were run are recorded, and can
/// be inspected with [`StaticBuildGraph::queries`].
#[derive(Debug, Default)]
pub struct StaticBuildGraph {
    targets: Vec<Target>,
    dependents: BTreeMap<Utf8PathBuf, BTreeSet<Target>>,
    queries: RefCell<Vec<String>>,
}

impl StaticBuildGraph {
    /// Creates a new `StaticBuildGraph` whose queries all return `targets`.
    pub fn new<I, T>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Registers the targets that depend on a file.
    pub fn with_dependents<I, T>(mut self, path: impl Into<Utf8PathBuf>, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        self.dependents
            .entry(path.into())
            .or_default()
            .extend(targets.into_iter().map(Into::into));
        self
    }

    /// Returns the queries run so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }
}

impl BuildGraph for StaticBuildGraph {
    fn query(&self, query: &str) -> Result<Vec<Target>, BuildGraphError> {
        self.queries.borrow_mut().push(query.to_owned());
        Ok(self.targets.clone())
    }

    fn targets_depending_on(&self, path: &Utf8Path) -> Result<BTreeSet<Target>, BuildGraphError> {
        Ok(self.dependents.get(path).cloned().unwrap_or_default())
    }
}
