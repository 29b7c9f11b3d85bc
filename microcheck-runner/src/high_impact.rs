// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! High-impact targets: the store's high-impact tests plus the tests a change affects.

use crate::{
    errors::SelectionError,
    executor::Executor,
    impact::{ChangeImpactResolver, PragmaResolver},
    store::TestMetadataStore,
};
use microcheck_metadata::{OperatingSystem, Target};
use std::collections::BTreeSet;
use tracing::debug;

/// Resolves the high-impact targets of a team on an operating system.
#[derive(Clone, Copy)]
pub struct HighImpactTargetResolver<'a> {
    store: Option<&'a dyn TestMetadataStore>,
    change_impact: ChangeImpactResolver<'a>,
    pragma: PragmaResolver<'a>,
}

impl<'a> HighImpactTargetResolver<'a> {
    /// Creates a new resolver. Without a store only the change contributes targets.
    pub fn new(
        store: Option<&'a dyn TestMetadataStore>,
        change_impact: ChangeImpactResolver<'a>,
        pragma: PragmaResolver<'a>,
    ) -> Self {
        Self {
            store,
            change_impact,
            pragma,
        }
    }

    /// Returns the high-impact targets.
    ///
    /// This is the union of:
    ///
    /// * the store's high-impact records for the operating system's step, owned by `team`;
    /// * the tests that depend on changed files;
    /// * the tests pinned with a `@microcheck` pragma.
    pub fn high_impact_targets(
        &self,
        team: &str,
        os: OperatingSystem,
        executor: &Executor,
    ) -> Result<BTreeSet<Target>, SelectionError> {
        debug!(
            "resolving high-impact targets for {team} on {os} ({} executor `{}`)",
            executor.kind(),
            executor.image_tag(),
        );
        let mut targets = BTreeSet::new();

        if let Some(store) = self.store {
            let steps = store.fetch_high_impact(high_impact_step(os))?;
            targets.extend(
                steps
                    .values()
                    .flatten()
                    .filter(|record| record.team == team)
                    .map(|record| record.target()),
            );
            debug!("{} high-impact target(s) from the store", targets.len());
        }

        let changed = self.change_impact.changed_tests()?;
        debug!("{} target(s) affected by changed files", changed.len());
        targets.extend(changed);

        let pinned = self.pragma.human_specified_tests()?;
        debug!("{} target(s) pinned by pragma", pinned.len());
        targets.extend(pinned);

        Ok(targets)
    }
}

/// Returns the store step that holds an operating system's high-impact tests.
pub fn high_impact_step(os: OperatingSystem) -> &'static str {
    os.scheme()
}
