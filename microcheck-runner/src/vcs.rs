// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access to version control: changed files and change descriptions.

use crate::{
    command::{ToolCli, output_lines},
    errors::{EnvironmentError, VcsError},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use tracing::debug;

/// The branch and commit a change is compared between.
///
/// Both fields are optional here. They are required by the operations that look at changes, and
/// checked by [`ChangeContext::resolve`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeContext {
    base_branch: Option<String>,
    commit: Option<String>,
}

impl ChangeContext {
    /// The environment variable that usually provides the base branch.
    pub const BASE_BRANCH_ENV: &'static str = "PULL_REQUEST_BASE_BRANCH";

    /// The environment variable that usually provides the commit.
    pub const COMMIT_ENV: &'static str = "COMMIT";

    /// Creates a new change context. Empty strings are treated as missing.
    pub fn new(base_branch: Option<String>, commit: Option<String>) -> Self {
        Self {
            base_branch: base_branch.filter(|s| !s.is_empty()),
            commit: commit.filter(|s| !s.is_empty()),
        }
    }

    /// Returns the base branch, if set.
    pub fn base_branch(&self) -> Option<&str> {
        self.base_branch.as_deref()
    }

    /// Returns the commit, if set.
    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    /// Checks that both the base branch and the commit are set.
    pub fn resolve(&self) -> Result<ResolvedChangeContext<'_>, EnvironmentError> {
        let base_branch = self
            .base_branch
            .as_deref()
            .ok_or(EnvironmentError::MissingField {
                field: "base branch",
                env_var: Self::BASE_BRANCH_ENV,
            })?;
        let commit = self
            .commit
            .as_deref()
            .ok_or(EnvironmentError::MissingField {
                field: "commit",
                env_var: Self::COMMIT_ENV,
            })?;
        Ok(ResolvedChangeContext {
            base_branch,
            commit,
        })
    }
}

/// A [`ChangeContext`] with every field present.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResolvedChangeContext<'a> {
    /// The branch the change will be merged into.
    pub base_branch: &'a str,

    /// The commit under test.
    pub commit: &'a str,
}

/// Version control, as seen by microcheck.
pub trait VersionControl {
    /// Returns the files changed between the base branch and the commit.
    fn changed_files(
        &self,
        cx: ResolvedChangeContext<'_>,
    ) -> Result<BTreeSet<Utf8PathBuf>, VcsError>;

    /// Returns the description of the change: the messages of every commit between the base
    /// branch and the commit.
    fn change_description(&self, cx: ResolvedChangeContext<'_>) -> Result<String, VcsError>;
}

/// [`VersionControl`] backed by the `git` command-line tool.
#[derive(Clone, Debug)]
pub struct GitCli {
    git_path: String,
    remote: String,
    workspace_root: Utf8PathBuf,
}

impl GitCli {
    /// Creates a new `GitCli` that runs `git_path` inside `workspace_root`.
    pub fn new(
        git_path: impl Into<String>,
        remote: impl Into<String>,
        workspace_root: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            git_path: git_path.into(),
            remote: remote.into(),
            workspace_root: workspace_root.into(),
        }
    }

    fn cli(&self) -> ToolCli<'_> {
        let mut cli = ToolCli::new(&self.git_path);
        cli.current_dir(&self.workspace_root);
        cli
    }

    fn fetch(&self, cx: ResolvedChangeContext<'_>) -> Result<(), VcsError> {
        let mut cli = self.cli();
        cli.add_args(["fetch", self.remote.as_str(), cx.base_branch]);
        cli.read()
            .map_err(|err| VcsError::new("fetch the base branch", err))?;
        Ok(())
    }

    fn remote_base(&self, cx: ResolvedChangeContext<'_>) -> String {
        format!("{}/{}", self.remote, cx.base_branch)
    }

    /// Returns the workspace root git runs in.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }
}

impl VersionControl for GitCli {
    fn changed_files(
        &self,
        cx: ResolvedChangeContext<'_>,
    ) -> Result<BTreeSet<Utf8PathBuf>, VcsError> {
        self.fetch(cx)?;
        let range = format!("{}...{}", self.remote_base(cx), cx.commit);
        let mut cli = self.cli();
        cli.add_args(["diff", "--name-only", range.as_str()]);
        let output = cli
            .read()
            .map_err(|err| VcsError::new("list changed files", err))?;
        let files: BTreeSet<_> = output_lines(&output).map(Utf8PathBuf::from).collect();
        debug!("{} file(s) changed in {range}", files.len());
        Ok(files)
    }

    fn change_description(&self, cx: ResolvedChangeContext<'_>) -> Result<String, VcsError> {
        self.fetch(cx)?;
        let range = format!("{}..{}", self.remote_base(cx), cx.commit);
        let mut cli = self.cli();
        cli.add_args(["log", "--format=%B", range.as_str()]);
        cli.read()
            .map_err(|err| VcsError::new("read commit messages", err))
    }
}

/// In-memory [`VersionControl`] with a fixed set of changed files and a fixed description.
#[derive(Clone, Debug, Default)]
pub struct StaticVersionControl {
    changed_files: BTreeSet<Utf8PathBuf>,
    description: String,
}

impl StaticVersionControl {
    /// Creates a new `StaticVersionControl`.
    pub fn new<I, P>(changed_files: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        Self {
            changed_files: changed_files.into_iter().map(Into::into).collect(),
            description: description.into(),
        }
    }
}

impl VersionControl for StaticVersionControl {
    fn changed_files(
        &self,
        _cx: ResolvedChangeContext<'_>,
    ) -> Result<BTreeSet<Utf8PathBuf>, VcsError> {
        Ok(self.changed_files.clone())
    }

    fn change_description(&self, _cx: ResolvedChangeContext<'_>) -> Result<String, VcsError> {
        Ok(self.description.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(None, Some("abc"), "base branch", "PULL_REQUEST_BASE_BRANCH" ; "missing base branch")]
    #[test_case(Some("master"), None, "commit", "COMMIT" ; "missing commit")]
    #[test_case(Some(""), Some("abc"), "base branch", "PULL_REQUEST_BASE_BRANCH" ; "empty base branch")]
    #[test_case(None, None, "base branch", "PULL_REQUEST_BASE_BRANCH" ; "both missing")]
    fn resolve_missing(
        base_branch: Option<&str>,
        commit: Option<&str>,
        field: &'static str,
        env_var: &'static str,
    ) {
        let cx = ChangeContext::new(base_branch.map(str::to_owned), commit.map(str::to_owned));
        assert_eq!(
            cx.resolve().unwrap_err(),
            EnvironmentError::MissingField { field, env_var }
        );
    }

    #[test]
    fn resolve_complete() {
        let cx = ChangeContext::new(Some("master".to_owned()), Some("abc123".to_owned()));
        assert_eq!(
            cx.resolve().unwrap(),
            ResolvedChangeContext {
                base_branch: "master",
                commit: "abc123",
            }
        );
    }

    #[test]
    fn git_cli_missing_binary() {
        let git = GitCli::new("microcheck-no-such-git", "origin", ".");
        let cx = ChangeContext::new(Some("master".to_owned()), Some("abc".to_owned()));
        let err = git.changed_files(cx.resolve().unwrap()).unwrap_err();
        assert_eq!(err.action(), "fetch the base branch");
    }
}
