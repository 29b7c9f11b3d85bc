// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for partitioning selected targets across CI workers.
//!
//! Each worker runs several shards ("sub-shards per worker"). Shards are numbered globally, and a
//! worker owns a contiguous range of shard IDs. Targets are sorted before slicing, so the
//! assignment only depends on the set of targets.

use crate::errors::ShardSpecError;
use microcheck_metadata::{OperatingSystem, Target};
use std::ops::Range;

/// The layout of one CI worker's share of a test run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShardSpec {
    team: String,
    operating_system: OperatingSystem,
    worker_count: u64,
    worker_id: u64,
    shards_per_worker: u64,
}

impl ShardSpec {
    /// Creates a new `ShardSpec`.
    ///
    /// `worker_count` and `shards_per_worker` must be at least 1, and `worker_id` must be less
    /// than `worker_count`.
    pub fn new(
        team: impl Into<String>,
        operating_system: OperatingSystem,
        worker_count: u64,
        worker_id: u64,
        shards_per_worker: u64,
    ) -> Result<Self, ShardSpecError> {
        if worker_count == 0 {
            return Err(ShardSpecError::NoWorkers);
        }
        if shards_per_worker == 0 {
            return Err(ShardSpecError::NoShardsPerWorker);
        }
        if worker_id >= worker_count {
            return Err(ShardSpecError::WorkerIdOutOfRange {
                worker_id,
                worker_count,
            });
        }
        if worker_count.checked_mul(shards_per_worker).is_none() {
            return Err(ShardSpecError::Overflow {
                worker_count,
                shards_per_worker,
            });
        }

        Ok(Self {
            team: team.into(),
            operating_system,
            worker_count,
            worker_id,
            shards_per_worker,
        })
    }

    /// Returns the team whose tests are run.
    pub fn team(&self) -> &str {
        &self.team
    }

    /// Returns the operating system the tests are run on.
    pub fn operating_system(&self) -> OperatingSystem {
        self.operating_system
    }

    /// Returns the number of workers.
    pub fn worker_count(&self) -> u64 {
        self.worker_count
    }

    /// Returns this worker's ID, counting up from 0.
    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    /// Returns the number of shards each worker runs.
    pub fn shards_per_worker(&self) -> u64 {
        self.shards_per_worker
    }

    /// Returns the total number of shards across all workers.
    pub fn shard_count(&self) -> u64 {
        // Checked in the constructor.
        self.worker_count * self.shards_per_worker
    }

    /// Returns the IDs of the shards this worker owns.
    pub fn shard_ids(&self) -> Range<u64> {
        let start = self.worker_id * self.shards_per_worker;
        start..start + self.shards_per_worker
    }
}

/// Returns the targets in shard `shard_id` out of `shard_count`.
///
/// Targets are sorted and deduplicated, then cut into `shard_count` chunks of
/// `ceil(len / shard_count)` targets each. Trailing shards may be short or empty. A `shard_id`
/// outside `0..shard_count` gets no targets.
pub fn shard_targets(targets: &[Target], shard_count: u64, shard_id: u64) -> Vec<Target> {
    if shard_id >= shard_count {
        return Vec::new();
    }
    let mut sorted = targets.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let len = sorted.len() as u64;
    let chunk_size = len.div_ceil(shard_count);
    let start = shard_id.saturating_mul(chunk_size).min(len);
    let end = start.saturating_add(chunk_size).min(len);
    sorted.drain(start as usize..end as usize).collect()
}
