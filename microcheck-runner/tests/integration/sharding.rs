// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use microcheck_metadata::{OperatingSystem, Target};
use microcheck_runner::{
    executor::{Executor, ExecutorKind, ExecutorOptions},
    partition::ShardSpec,
};
use pretty_assertions::assert_eq;
use proptest::collection::vec;
use std::collections::BTreeSet;
use test_strategy::proptest;

#[test]
fn container_for_team_and_os() {
    let spec = ShardSpec::new("core", OperatingSystem::Linux, 3, 1, 2).unwrap();
    let executor = Executor::assign(&spec, ExecutorOptions::default()).unwrap();
    assert_eq!(executor.kind(), ExecutorKind::Linux);
    assert_eq!(executor.image_tag(), "corebuild");
    assert_eq!(executor.shard_count(), 6);
    assert_eq!(executor.shard_ids().collect::<Vec<_>>(), vec![2, 3]);

    let spec = ShardSpec::new("serve", OperatingSystem::Windows, 3, 1, 2).unwrap();
    let executor = Executor::assign(&spec, ExecutorOptions::default()).unwrap();
    assert_eq!(executor.kind(), ExecutorKind::Windows);
}

#[proptest]
fn workers_cover_every_target_once(
    #[strategy(vec("//[a-z]{1,4}:[a-z_]{1,6}", 0..60))] names: Vec<String>,
    #[strategy(1u64..6)] worker_count: u64,
    #[strategy(1u64..4)] shards_per_worker: u64,
) {
    let targets: Vec<Target> = names.into_iter().map(Target::from).collect();
    let expected: BTreeSet<_> = targets.iter().cloned().collect();

    let mut seen = Vec::new();
    for worker_id in 0..worker_count {
        let spec = ShardSpec::new(
            "core",
            OperatingSystem::Linux,
            worker_count,
            worker_id,
            shards_per_worker,
        )
        .unwrap();
        let executor = Executor::assign(&spec, ExecutorOptions::default()).unwrap();
        for assignment in executor.worker_targets(&targets) {
            proptest::prop_assert!(executor.shard_ids().contains(&assignment.shard_id));
            seen.extend(assignment.targets);
        }
    }

    let seen_set: BTreeSet<_> = seen.iter().cloned().collect();
    proptest::prop_assert_eq!(seen.len(), seen_set.len());
    proptest::prop_assert_eq!(seen_set, expected);
}
