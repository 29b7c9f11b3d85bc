// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use microcheck_metadata::{Target, TestRecord, TestState};
use microcheck_runner::{
    errors::MetadataStoreError,
    executor::{Executor, ExecutorOptions},
    partition::ShardSpec,
    store::TestMetadataStore,
};
use std::collections::BTreeMap;

pub(crate) fn targets(names: &[&str]) -> Vec<Target> {
    names.iter().copied().map(Target::from).collect()
}

pub(crate) fn record(name: &str, team: &str, state: TestState) -> TestRecord {
    TestRecord::new(name, team, state)
}

/// Creates a YAML directory containing `<team>.tests.yml`.
pub(crate) fn yaml_dir(team: &str, contents: &str) -> Utf8TempDir {
    let dir = Utf8TempDir::new().expect("created temp dir");
    write_team_yaml(dir.path(), team, contents);
    dir
}

pub(crate) fn write_team_yaml(dir: &Utf8Path, team: &str, contents: &str) {
    std::fs::write(dir.join(format!("{team}.tests.yml")), contents).expect("wrote team yaml");
}

pub(crate) fn linux_executor(team: &str) -> Executor {
    let spec = ShardSpec::new(team, microcheck_metadata::OperatingSystem::Linux, 1, 0, 1)
        .expect("valid shard spec");
    let options = ExecutorOptions {
        skip_installation: true,
        ..Default::default()
    };
    Executor::assign(&spec, options).expect("valid executor")
}

/// A store that returns the same records for every request, under a fixed step name.
///
/// Unlike the in-memory store, high-impact records don't need to carry the high-impact flag.
#[derive(Debug, Default)]
pub(crate) struct FixedStore {
    pub(crate) all: Vec<TestRecord>,
    pub(crate) high_impact: Vec<TestRecord>,
}

impl TestMetadataStore for FixedStore {
    fn fetch_all(&self) -> Result<Vec<TestRecord>, MetadataStoreError> {
        Ok(self.all.clone())
    }

    fn fetch_high_impact(
        &self,
        _step: &str,
    ) -> Result<BTreeMap<String, Vec<TestRecord>>, MetadataStoreError> {
        let mut steps = BTreeMap::new();
        steps.insert("step".to_owned(), self.high_impact.clone());
        Ok(steps)
    }
}
