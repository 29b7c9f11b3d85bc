// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flaky targets, from the per-team YAML file and the metadata store.

use crate::{config::TeamTestConfig, errors::SelectionError, store::TestMetadataStore};
use camino::Utf8Path;
use microcheck_metadata::{OperatingSystem, Target, TestState};
use std::collections::BTreeSet;
use tracing::debug;

/// Resolves the flaky targets of a team on an operating system.
#[derive(Clone, Copy)]
pub struct FlakyTargetResolver<'a> {
    yaml_dir: &'a Utf8Path,
    store: Option<&'a dyn TestMetadataStore>,
}

impl<'a> FlakyTargetResolver<'a> {
    /// Creates a new resolver. Without a store only the YAML files are consulted.
    pub fn new(yaml_dir: &'a Utf8Path, store: Option<&'a dyn TestMetadataStore>) -> Self {
        Self { yaml_dir, store }
    }

    /// Returns the flaky targets, sorted and without duplicates.
    ///
    /// This is the union of the `flaky_tests` listed in the team's YAML file for `os`, and the
    /// store's records owned by `team` that are flaky on `os`.
    pub fn flaky_targets(
        &self,
        team: &str,
        os: OperatingSystem,
    ) -> Result<Vec<Target>, SelectionError> {
        let config = TeamTestConfig::load(self.yaml_dir, team)?;
        let mut targets: BTreeSet<_> = config.flaky_targets_for(os)?.into_iter().collect();
        let from_yaml = targets.len();

        if let Some(store) = self.store {
            targets.extend(
                store
                    .fetch_all()?
                    .iter()
                    .filter(|record| {
                        record.team == team
                            && record.state == TestState::Flaky
                            && record.scoped_name().is_on(os)
                    })
                    .map(|record| record.target()),
            );
        }

        debug!(
            "{team} has {} flaky target(s) on {os} ({from_yaml} from {})",
            targets.len(),
            config.path(),
        );
        Ok(targets.into_iter().collect())
    }
}
