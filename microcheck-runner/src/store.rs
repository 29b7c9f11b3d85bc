// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test metadata store: per-test state, ownership and properties.

use crate::errors::MetadataStoreError;
use camino::{Utf8Path, Utf8PathBuf};
use microcheck_metadata::TestRecord;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A source of [`TestRecord`]s.
pub trait TestMetadataStore {
    /// Returns every record in the store.
    fn fetch_all(&self) -> Result<Vec<TestRecord>, MetadataStoreError>;

    /// Returns the high-impact records for a CI step, keyed by step name.
    ///
    /// Steps are operating-system schemes such as `linux://`.
    fn fetch_high_impact(
        &self,
        step: &str,
    ) -> Result<BTreeMap<String, Vec<TestRecord>>, MetadataStoreError>;
}

/// A [`TestMetadataStore`] over a fixed list of records.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    records: Vec<TestRecord>,
}

impl InMemoryStore {
    /// Creates a new store with the given records.
    pub fn new(records: impl IntoIterator<Item = TestRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    /// Returns the records in this store.
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }
}

impl TestMetadataStore for InMemoryStore {
    fn fetch_all(&self) -> Result<Vec<TestRecord>, MetadataStoreError> {
        Ok(self.records.clone())
    }

    fn fetch_high_impact(
        &self,
        step: &str,
    ) -> Result<BTreeMap<String, Vec<TestRecord>>, MetadataStoreError> {
        let records: Vec<_> = self
            .records
            .iter()
            .filter(|record| record.is_high_impact() && record.name.starts_with(step))
            .cloned()
            .collect();
        let mut steps = BTreeMap::new();
        if !records.is_empty() {
            steps.insert(step.to_owned(), records);
        }
        Ok(steps)
    }
}

/// A [`TestMetadataStore`] read from a JSON snapshot file.
///
/// The snapshot is either an array of records, or an object with a `tests` array.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: Utf8PathBuf,
    inner: InMemoryStore,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Records(Vec<TestRecord>),
    Document { tests: Vec<TestRecord> },
}

impl JsonFileStore {
    /// Reads a snapshot from disk.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, MetadataStoreError> {
        let path = path.into();
        let contents =
            std::fs::read_to_string(&path).map_err(|err| MetadataStoreError::Read {
                path: path.clone(),
                err,
            })?;
        let snapshot: SnapshotFile =
            serde_json::from_str(&contents).map_err(|err| MetadataStoreError::Parse {
                path: path.clone(),
                err,
            })?;
        let records = match snapshot {
            SnapshotFile::Records(records) | SnapshotFile::Document { tests: records } => records,
        };
        debug!("read {} test record(s) from `{path}`", records.len());
        Ok(Self {
            path,
            inner: InMemoryStore::new(records),
        })
    }

    /// Returns the path the snapshot was read from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl TestMetadataStore for JsonFileStore {
    fn fetch_all(&self) -> Result<Vec<TestRecord>, MetadataStoreError> {
        self.inner.fetch_all()
    }

    fn fetch_high_impact(
        &self,
        step: &str,
    ) -> Result<BTreeMap<String, Vec<TestRecord>>, MetadataStoreError> {
        self.inner.fetch_high_impact(step)
    }
}
