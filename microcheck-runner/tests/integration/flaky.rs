// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{FixedStore, record, targets, yaml_dir};
use microcheck_metadata::{OperatingSystem, TestRecord, TestState};
use microcheck_runner::flaky::FlakyTargetResolver;
use pretty_assertions::assert_eq;
use test_case::test_case;

fn store_records() -> Vec<TestRecord> {
    vec![
        record("windows://t1_s3", "core", TestState::Flaky),
        record("linux://t2_s3", "ci", TestState::Flaky),
        record("linux://t3_s3", "core", TestState::Flaky),
        record("linux://t4_s3", "core", TestState::Passing),
    ]
}

#[test_case(
    "flaky_tests: [//t1, windows://t2]", true,
    &["//t1", "//t3_s3"], &["//t1_s3", "//t2"]
    ; "yaml and store"
)]
#[test_case(
    "flaky_tests: [//t1, windows://t2]", false,
    &["//t1"], &["//t2"]
    ; "yaml only"
)]
#[test_case(
    "flaky_tests: []", true,
    &["//t3_s3"], &["//t1_s3"]
    ; "store only"
)]
#[test_case("flaky_tests: []", false, &[], &[] ; "nothing flaky")]
fn flaky_targets_per_os(yaml: &str, with_store_records: bool, linux: &[&str], windows: &[&str]) {
    let dir = yaml_dir("core", yaml);
    let store = FixedStore {
        all: if with_store_records {
            store_records()
        } else {
            Vec::new()
        },
        ..Default::default()
    };
    let resolver = FlakyTargetResolver::new(dir.path(), Some(&store));

    assert_eq!(
        resolver
            .flaky_targets("core", OperatingSystem::Linux)
            .unwrap(),
        targets(linux),
    );
    assert_eq!(
        resolver
            .flaky_targets("core", OperatingSystem::Windows)
            .unwrap(),
        targets(windows),
    );
}

#[test]
fn flaky_targets_are_stable() {
    let dir = yaml_dir("core", "flaky_tests: [//z, //a, //m, //a]");
    let store = FixedStore {
        all: store_records(),
        ..Default::default()
    };
    let resolver = FlakyTargetResolver::new(dir.path(), Some(&store));
    let first = resolver
        .flaky_targets("core", OperatingSystem::Linux)
        .unwrap();
    let second = resolver
        .flaky_targets("core", OperatingSystem::Linux)
        .unwrap();
    assert_eq!(first, targets(&["//a", "//m", "//t3_s3", "//z"]));
    assert_eq!(first, second);
}
