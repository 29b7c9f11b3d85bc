// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selecting the targets a worker runs.
//!
//! Selection starts from the candidates returned by the team/tag query, then applies the
//! [`SelectionMode`]:
//!
//! * [`SelectionMode::All`]: every candidate that isn't flaky.
//! * [`SelectionMode::HighImpact`]: the non-flaky candidates that are also high impact.
//! * [`SelectionMode::Flaky`] and [`SelectionMode::FlakyAndHighImpact`]: the flaky targets,
//!   regardless of the candidates.

use crate::{
    build_graph::BuildGraph,
    errors::SelectionError,
    executor::Executor,
    flaky::FlakyTargetResolver,
    high_impact::HighImpactTargetResolver,
    impact::{ChangeImpactResolver, PragmaResolver},
    store::TestMetadataStore,
    vcs::{ChangeContext, VersionControl},
};
use camino::Utf8Path;
use indexmap::IndexSet;
use microcheck_filtering::{TagSet, TestQueryBuilder, add_default_except_tags};
use microcheck_metadata::{OperatingSystem, Target};
use std::{collections::BTreeSet, fmt};
use tracing::{debug, info};

/// The collaborators a selection run reads from.
#[derive(Clone, Copy)]
pub struct SelectionContext<'a> {
    /// Version control.
    pub vcs: &'a dyn VersionControl,

    /// The build graph.
    pub build_graph: &'a dyn BuildGraph,

    /// The test metadata store, or `None` to skip it.
    pub store: Option<&'a dyn TestMetadataStore>,

    /// The change being tested.
    pub change_context: &'a ChangeContext,

    /// The directory holding `<team>.tests.yml` files.
    pub yaml_dir: &'a Utf8Path,
}

impl<'a> SelectionContext<'a> {
    /// Returns a resolver for tests affected by changed files.
    pub fn change_impact(&self) -> ChangeImpactResolver<'a> {
        ChangeImpactResolver::new(self.vcs, self.build_graph, self.change_context)
    }

    /// Returns a resolver for tests pinned by pragma.
    pub fn pragma(&self) -> PragmaResolver<'a> {
        PragmaResolver::new(self.vcs, self.change_context)
    }

    /// Returns a resolver for flaky targets.
    pub fn flaky(&self) -> FlakyTargetResolver<'a> {
        FlakyTargetResolver::new(self.yaml_dir, self.store)
    }

    /// Returns a resolver for high-impact targets.
    pub fn high_impact(&self) -> HighImpactTargetResolver<'a> {
        HighImpactTargetResolver::new(self.store, self.change_impact(), self.pragma())
    }
}

/// Which targets a run selects.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SelectionMode {
    /// All candidates, minus flaky targets.
    #[default]
    All,

    /// High-impact candidates, minus flaky targets.
    HighImpact,

    /// Flaky targets only.
    Flaky,

    /// Flaky targets only. The high-impact flag has no effect when running flaky targets.
    FlakyAndHighImpact,
}

impl SelectionMode {
    /// Combines the `flaky` and `high_impact` flags into a mode.
    pub fn from_flags(flaky: bool, high_impact: bool) -> Self {
        match (flaky, high_impact) {
            (false, false) => Self::All,
            (false, true) => Self::HighImpact,
            (true, false) => Self::Flaky,
            (true, true) => Self::FlakyAndHighImpact,
        }
    }

    /// Returns true if this mode runs flaky targets.
    pub fn is_flaky(self) -> bool {
        matches!(self, Self::Flaky | Self::FlakyAndHighImpact)
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::HighImpact => f.write_str("high-impact"),
            Self::Flaky => f.write_str("flaky"),
            Self::FlakyAndHighImpact => f.write_str("flaky+high-impact"),
        }
    }
}

/// A request to select targets, starting from a team/tag query.
#[derive(Clone, Debug)]
pub struct SelectionRequest {
    /// The target patterns to query, e.g. `//python/ray/tests/...`.
    pub targets: Vec<String>,

    /// The team whose tests are selected.
    pub team: String,

    /// The operating system the tests run on.
    pub os: OperatingSystem,

    /// Only select tests with at least one of these tags.
    pub only_tags: TagSet,

    /// Never select tests with any of these tags. `manual` is always added.
    pub except_tags: TagSet,

    /// The selection mode.
    pub mode: SelectionMode,
}

impl SelectionRequest {
    /// Creates a new request with no tag filters, in [`SelectionMode::All`].
    pub fn new<I, S>(targets: I, team: impl Into<String>, os: OperatingSystem) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            team: team.into(),
            os,
            only_tags: TagSet::new(),
            except_tags: TagSet::new(),
            mode: SelectionMode::All,
        }
    }

    /// Sets the only-tags filter.
    pub fn only_tags(mut self, tags: TagSet) -> Self {
        self.only_tags = tags;
        self
    }

    /// Sets the except-tags filter.
    pub fn except_tags(mut self, tags: TagSet) -> Self {
        self.except_tags = tags;
        self
    }

    /// Sets the selection mode.
    pub fn mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the query that lists this request's candidates.
    ///
    /// `manual` tests are always excluded.
    pub fn candidate_query(&self) -> Result<String, SelectionError> {
        let except_tags = TagSet::parse(&add_default_except_tags(&self.except_tags.to_string()));
        let expr = TestQueryBuilder::new(self.targets.iter().map(String::as_str), &*self.team)
            .only_tags(self.only_tags.clone())
            .except_tags(except_tags)
            .build()?;
        Ok(expr.to_string())
    }
}

/// Applies a [`SelectionMode`] to candidate targets.
#[derive(Clone, Copy)]
pub struct TargetSelector<'a> {
    cx: SelectionContext<'a>,
}

impl<'a> TargetSelector<'a> {
    /// Creates a new selector.
    pub fn new(cx: SelectionContext<'a>) -> Self {
        Self { cx }
    }

    /// Returns the context this selector reads from.
    pub fn context(&self) -> &SelectionContext<'a> {
        &self.cx
    }

    /// Selects targets out of `query_result`, the candidates for `team`.
    ///
    /// In the non-flaky modes the result keeps the order of `query_result`, without duplicates.
    /// In the flaky modes the result is the sorted list of flaky targets.
    pub fn select(
        &self,
        executor: &Executor,
        query_result: &[Target],
        team: &str,
        os: OperatingSystem,
        mode: SelectionMode,
    ) -> Result<Vec<Target>, SelectionError> {
        let flaky = self.cx.flaky().flaky_targets(team, os)?;
        let high_impact = match mode {
            SelectionMode::Flaky | SelectionMode::FlakyAndHighImpact => {
                info!("selected {} flaky target(s) for {team} on {os}", flaky.len());
                return Ok(flaky);
            }
            SelectionMode::All => None,
            SelectionMode::HighImpact => {
                Some(self.cx.high_impact().high_impact_targets(team, os, executor)?)
            }
        };

        let flaky: BTreeSet<_> = flaky.into_iter().collect();
        let selected: IndexSet<Target> = query_result
            .iter()
            .filter(|target| !flaky.contains(*target))
            .filter(|target| {
                high_impact
                    .as_ref()
                    .is_none_or(|high_impact| high_impact.contains(*target))
            })
            .cloned()
            .collect();

        info!(
            "selected {} of {} candidate target(s) for {team} on {os} (mode: {mode}, {} flaky)",
            selected.len(),
            query_result.len(),
            flaky.len(),
        );
        Ok(selected.into_iter().collect())
    }

    /// Runs the candidate query for `request`.
    pub fn query_candidates(
        &self,
        request: &SelectionRequest,
    ) -> Result<Vec<Target>, SelectionError> {
        let query = request.candidate_query()?;
        debug!("candidate query: {query}");
        Ok(self.cx.build_graph.query(&query)?)
    }

    /// Runs the candidate query for `request`, then selects from its result.
    pub fn select_with_query(
        &self,
        executor: &Executor,
        request: &SelectionRequest,
    ) -> Result<Vec<Target>, SelectionError> {
        let candidates = if request.mode.is_flaky() {
            // Flaky modes don't look at the candidates.
            Vec::new()
        } else {
            self.query_candidates(request)?
        };
        self.select(
            executor,
            &candidates,
            &request.team,
            request.os,
            request.mode,
        )
    }
}
