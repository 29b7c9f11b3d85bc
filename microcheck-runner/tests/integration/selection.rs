// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{FixedStore, linux_executor, record, targets, yaml_dir};
use camino::Utf8PathBuf;
use maplit::btreeset;
use microcheck_metadata::{OperatingSystem, Target, TestRecord, TestState};
use microcheck_runner::{
    build_graph::StaticBuildGraph,
    select::{SelectionContext, SelectionMode, SelectionRequest, TargetSelector},
    vcs::{ChangeContext, StaticVersionControl},
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use test_case::test_case;

const QUERY_RESULT: &[&str] = &[
    "//python/ray/tests:high_impact_test_01",
    "//python/ray/tests:good_test_01",
    "//python/ray/tests:good_test_02",
    "//python/ray/tests:good_test_03",
    "//python/ray/tests:flaky_test_01",
];

fn store_records() -> Vec<TestRecord> {
    vec![
        record(
            "linux://python/ray/tests:high_impact_test_01",
            "core",
            TestState::Passing,
        )
        .with_property(TestRecord::IS_HIGH_IMPACT, "true"),
        record(
            "linux://python/ray/tests:flaky_test_01",
            "core",
            TestState::Flaky,
        )
        .with_property(TestRecord::IS_HIGH_IMPACT, "true"),
    ]
}

fn change_context() -> ChangeContext {
    ChangeContext::new(Some("base".to_owned()), Some("commit".to_owned()))
}

#[test_case(
    SelectionMode::All,
    &[
        "//python/ray/tests:high_impact_test_01",
        "//python/ray/tests:good_test_01",
        "//python/ray/tests:good_test_02",
        "//python/ray/tests:good_test_03",
    ]
    ; "all"
)]
#[test_case(SelectionMode::Flaky, &["//python/ray/tests:flaky_test_01"] ; "flaky")]
#[test_case(
    SelectionMode::HighImpact,
    &["//python/ray/tests:high_impact_test_01"]
    ; "high impact"
)]
#[test_case(
    SelectionMode::FlakyAndHighImpact,
    &["//python/ray/tests:flaky_test_01"]
    ; "flaky takes precedence"
)]
fn select_by_mode(mode: SelectionMode, expected: &[&str]) {
    let dir = yaml_dir("core", "flaky_tests: [//python/ray/tests:flaky_test_01]");
    let records = store_records();
    let store = FixedStore {
        all: records.clone(),
        high_impact: records,
    };
    let vcs = StaticVersionControl::default();
    let graph = StaticBuildGraph::new(QUERY_RESULT.iter().copied());
    let change_context = change_context();
    let selector = TargetSelector::new(SelectionContext {
        vcs: &vcs,
        build_graph: &graph,
        store: Some(&store),
        change_context: &change_context,
        yaml_dir: dir.path(),
    });

    let request =
        SelectionRequest::new(["//python/ray/tests/..."], "core", OperatingSystem::Linux)
            .mode(mode);
    let selected = selector
        .select_with_query(&linux_executor("core"), &request)
        .unwrap();
    assert_eq!(selected, targets(expected));

    // Selection is a pure function of its inputs.
    let again = selector
        .select_with_query(&linux_executor("core"), &request)
        .unwrap();
    assert_eq!(selected, again);
}

#[test_case(&[], &[], None, &[] ; "empty")]
#[test_case(
    &[("linux://core_good", "core"), ("linux://serve_good", "serve")],
    &["//core_new"],
    Some("//human_test"),
    &["//core_good", "//core_new", "//human_test"]
    ; "store, changes and pragma"
)]
fn high_impact_targets(
    store: &[(&str, &str)],
    new_tests: &[&str],
    human_test: Option<&str>,
    expected: &[&str],
) {
    let dir = yaml_dir("core", "");
    let store = FixedStore {
        high_impact: store
            .iter()
            .map(|(name, team)| record(name, team, TestState::Passing))
            .collect(),
        ..Default::default()
    };
    let description = match human_test {
        Some(test) => format!("[core] change\n\n@microcheck {test}\n"),
        None => "[core] change\n".to_owned(),
    };
    let changed_files: Vec<&str> = if new_tests.is_empty() {
        vec![]
    } else {
        vec!["src/ray/core_worker.cc"]
    };
    let vcs = StaticVersionControl::new(changed_files, description);
    let graph = StaticBuildGraph::default().with_dependents(
        "src/ray/core_worker.cc",
        new_tests.iter().copied(),
    );
    let change_context = change_context();
    let cx = SelectionContext {
        vcs: &vcs,
        build_graph: &graph,
        store: Some(&store),
        change_context: &change_context,
        yaml_dir: dir.path(),
    };

    let high_impact = cx
        .high_impact()
        .high_impact_targets("core", OperatingSystem::Linux, &linux_executor("test"))
        .unwrap();
    let expected: BTreeSet<Target> = expected.iter().copied().map(Target::from).collect();
    assert_eq!(high_impact, expected);
}

#[test]
fn changed_tests_skip_files_outside_the_graph() {
    let vcs = StaticVersionControl::new(["test_src", "build_src"], "");
    let graph = StaticBuildGraph::default().with_dependents("test_src", ["//t1", "//t2"]);
    let change_context = change_context();
    let dir = yaml_dir("core", "");
    let cx = SelectionContext {
        vcs: &vcs,
        build_graph: &graph,
        store: None,
        change_context: &change_context,
        yaml_dir: dir.path(),
    };

    let change_impact = cx.change_impact();
    assert_eq!(
        change_impact.changed_files().unwrap(),
        btreeset! {Utf8PathBuf::from("build_src"), Utf8PathBuf::from("test_src")}
    );
    assert_eq!(
        change_impact.changed_tests().unwrap(),
        btreeset! {Target::new("//t1"), Target::new("//t2")}
    );
}

#[test]
fn human_specified_tests() {
    let vcs = StaticVersionControl::new(
        Vec::<&str>::new(),
        "hi\n@microcheck //test01 //test02\nthere",
    );
    let graph = StaticBuildGraph::default();
    let change_context = change_context();
    let dir = yaml_dir("core", "");
    let cx = SelectionContext {
        vcs: &vcs,
        build_graph: &graph,
        store: None,
        change_context: &change_context,
        yaml_dir: dir.path(),
    };
    assert_eq!(
        cx.pragma().human_specified_tests().unwrap(),
        btreeset! {Target::new("//test01"), Target::new("//test02")}
    );
}

#[test]
fn default_mode_ignores_changed_tests() {
    let dir = yaml_dir("core", "");
    let vcs = StaticVersionControl::new(["src/a.cc"], "@microcheck //pinned");
    let graph = StaticBuildGraph::new(["//t1", "//t2"]).with_dependents("src/a.cc", ["//t9"]);
    // All mode doesn't need a change context at all.
    let change_context = ChangeContext::default();
    let selector = TargetSelector::new(SelectionContext {
        vcs: &vcs,
        build_graph: &graph,
        store: None,
        change_context: &change_context,
        yaml_dir: dir.path(),
    });
    let request = SelectionRequest::new(["//..."], "core", OperatingSystem::Linux);
    assert_eq!(
        selector
            .select_with_query(&linux_executor("core"), &request)
            .unwrap(),
        targets(&["//t1", "//t2"])
    );
}
