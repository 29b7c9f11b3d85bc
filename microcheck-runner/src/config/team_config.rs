// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::TeamConfigError;
use camino::{Utf8Path, Utf8PathBuf};
use microcheck_metadata::{OperatingSystem, ScopedName, Target};
use serde::Deserialize;
use std::io;
use tracing::debug;

/// A team's test configuration, read from `<yaml-dir>/<team>.tests.yml`.
///
/// Only the `flaky_tests` key is interpreted. Entries are either bare targets, which belong to
/// the default operating system, or targets scoped to an operating system such as
/// `windows://python/ray/tests:test_basic`.
#[derive(Clone, Debug, Default)]
pub struct TeamTestConfig {
    path: Utf8PathBuf,
    flaky_tests: Vec<String>,
}

#[derive(Deserialize)]
struct TeamTestConfigDeserialize {
    #[serde(default)]
    flaky_tests: Option<Vec<String>>,
}

impl TeamTestConfig {
    /// Returns the path of a team's test config within `yaml_dir`.
    pub fn path_for(yaml_dir: &Utf8Path, team: &str) -> Utf8PathBuf {
        yaml_dir.join(format!("{team}.tests.yml"))
    }

    /// Loads a team's test config.
    ///
    /// A missing file is the same as an empty one.
    pub fn load(yaml_dir: &Utf8Path, team: &str) -> Result<Self, TeamConfigError> {
        let path = Self::path_for(yaml_dir, team);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::parse(path, &contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no team test config at `{path}`");
                Ok(Self {
                    path,
                    flaky_tests: Vec::new(),
                })
            }
            Err(err) => Err(TeamConfigError::Read { path, err }),
        }
    }

    /// Parses a team's test config. `path` is used for error messages.
    pub fn parse(path: impl Into<Utf8PathBuf>, contents: &str) -> Result<Self, TeamConfigError> {
        let path = path.into();
        if contents.trim().is_empty() {
            return Ok(Self {
                path,
                flaky_tests: Vec::new(),
            });
        }
        match serde_yaml::from_str::<Option<TeamTestConfigDeserialize>>(contents) {
            Ok(config) => Ok(Self {
                path,
                flaky_tests: config.and_then(|c| c.flaky_tests).unwrap_or_default(),
            }),
            Err(err) => Err(TeamConfigError::Parse { path, err }),
        }
    }

    /// Returns the path this config was read from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the raw `flaky_tests` entries, in file order.
    pub fn flaky_tests(&self) -> &[String] {
        &self.flaky_tests
    }

    /// Returns the flaky targets for an operating system, with schemes stripped.
    pub fn flaky_targets_for(&self, os: OperatingSystem) -> Result<Vec<Target>, TeamConfigError> {
        let mut targets = Vec::new();
        for entry in &self.flaky_tests {
            let name = ScopedName::parse(entry);
            let entry_os = name
                .operating_system()
                .map_err(|err| TeamConfigError::UnknownScope {
                    path: self.path.clone(),
                    entry: entry.clone(),
                    err,
                })?;
            if entry_os == os {
                targets.push(name.target());
            }
        }
        Ok(targets)
    }
}
