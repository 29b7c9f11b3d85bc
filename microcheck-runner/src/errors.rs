// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by microcheck.

use camino::Utf8PathBuf;
use config::ConfigError;
use microcheck_filtering::errors::QueryComposeError;
use microcheck_metadata::{OperatingSystem, UnknownOperatingSystem};
use std::{fmt, io, string::FromUtf8Error};
use thiserror::Error;

/// An error that occurred while parsing the microcheck config file.
#[derive(Debug, Error)]
#[error("failed to parse microcheck config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// A required piece of change context was not provided.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum EnvironmentError {
    /// The field is required for change-based selection but was not set.
    #[error("{field} is required for change-based selection (set the `{env_var}` environment variable)")]
    MissingField {
        /// The name of the missing field.
        field: &'static str,

        /// The environment variable that usually provides it.
        env_var: &'static str,
    },
}

/// The worker layout passed in was invalid.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum ShardSpecError {
    /// The worker count was zero.
    #[error("worker count must be at least 1")]
    NoWorkers,

    /// The number of shards per worker was zero.
    #[error("shards per worker must be at least 1")]
    NoShardsPerWorker,

    /// The worker ID was not less than the worker count.
    #[error("worker ID {worker_id} is out of range (worker count is {worker_count})")]
    WorkerIdOutOfRange {
        /// The worker ID.
        worker_id: u64,

        /// The worker count.
        worker_count: u64,
    },

    /// The total shard count doesn't fit in a `u64`.
    #[error("{worker_count} workers × {shards_per_worker} shards per worker overflows")]
    Overflow {
        /// The worker count.
        worker_count: u64,

        /// The number of shards per worker.
        shards_per_worker: u64,
    },
}

/// An executor could not be configured for the requested worker.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The operating system name was not recognized.
    #[error(transparent)]
    UnknownOperatingSystem(#[from] UnknownOperatingSystem),

    /// The team name can't be used to name a container image.
    #[error("invalid team name `{team}`: {reason}")]
    InvalidTeam {
        /// The team name.
        team: String,

        /// Why the name is invalid.
        reason: &'static str,
    },

    /// An executor option is not supported on the target operating system.
    #[error("option `{option}` is not supported on {os}")]
    UnsupportedOption {
        /// The option name.
        option: &'static str,

        /// The operating system the option was requested for.
        os: OperatingSystem,
    },

    /// An executor option has an unsupported value.
    #[error("invalid value `{value}` for option `{option}`: expected {expected}")]
    InvalidOptionValue {
        /// The option name.
        option: &'static str,

        /// The value that was passed in.
        value: String,

        /// A description of the accepted values.
        expected: &'static str,
    },

    /// The worker layout was invalid.
    #[error("invalid worker layout")]
    ShardSpec(#[from] ShardSpecError),

    /// The metadata store is enabled, but no snapshot path is configured.
    #[error(
        "the test metadata store is enabled but `store.path` is not set \
         (pass --no-store to select without it)"
    )]
    StorePathMissing,
}

/// An external command could not be run, or exited unsuccessfully.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// The command could not be spawned.
    #[error("failed to execute `{command}`")]
    Exec {
        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The command exited with a failure status.
    #[error("`{command}` {}\n--- stderr:\n{stderr}", DisplayExitCode(*exit_code))]
    Failed {
        /// The command line.
        command: String,

        /// The exit code, or `None` if the command was terminated by a signal.
        exit_code: Option<i32>,

        /// Standard error, lossily decoded.
        stderr: String,
    },

    /// The command's standard output was not valid UTF-8.
    #[error("`{command}` produced output that isn't valid UTF-8")]
    NonUtf8Output {
        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        err: FromUtf8Error,
    },
}

impl CommandError {
    /// Returns true if the command ran to completion but reported failure.
    pub fn is_failed_exit(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

struct DisplayExitCode(Option<i32>);

impl fmt::Display for DisplayExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exited with code {code}"),
            None => write!(f, "was terminated by a signal"),
        }
    }
}

/// A build-graph query failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildGraphError {
    /// The query could not be composed.
    #[error("failed to compose query")]
    Compose(#[from] QueryComposeError),

    /// The build tool could not run the query.
    #[error("build graph query `{query}` failed")]
    QueryFailed {
        /// The query text.
        query: String,

        /// The underlying error.
        #[source]
        err: CommandError,
    },
}

/// A version-control operation failed.
#[derive(Debug, Error)]
#[error("failed to {action}")]
pub struct VcsError {
    action: &'static str,
    #[source]
    err: CommandError,
}

impl VcsError {
    pub(crate) fn new(action: &'static str, err: CommandError) -> Self {
        Self { action, err }
    }

    /// Returns a short description of the operation that failed.
    pub fn action(&self) -> &'static str {
        self.action
    }
}

/// The test metadata store could not be read.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MetadataStoreError {
    /// The snapshot file could not be read.
    #[error("failed to read test metadata from `{path}`")]
    Read {
        /// The snapshot path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The snapshot file is not valid JSON, or has the wrong shape.
    #[error("failed to parse test metadata from `{path}`")]
    Parse {
        /// The snapshot path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: serde_json::Error,
    },
}

/// A per-team test config file could not be loaded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TeamConfigError {
    /// The file exists but could not be read.
    #[error("failed to read team test config `{path}`")]
    Read {
        /// The file path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The file is not valid YAML, or has the wrong shape.
    #[error("failed to parse team test config `{path}`")]
    Parse {
        /// The file path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: serde_yaml::Error,
    },

    /// A flaky test entry is scoped to an unknown operating system.
    #[error("in team test config `{path}`, flaky test `{entry}` has an unknown scope")]
    UnknownScope {
        /// The file path.
        path: Utf8PathBuf,

        /// The offending entry.
        entry: String,

        /// The underlying error.
        #[source]
        err: UnknownOperatingSystem,
    },
}

/// The container runtime could not prepare an executor's image.
#[derive(Debug, Error)]
#[error("failed to install image `{image}`")]
pub struct InstallError {
    image: String,
    #[source]
    err: CommandError,
}

impl InstallError {
    pub(crate) fn new(image: impl Into<String>, err: CommandError) -> Self {
        Self {
            image: image.into(),
            err,
        }
    }

    /// Returns the image that failed to install.
    pub fn image(&self) -> &str {
        &self.image
    }
}

/// An error that occurred while selecting targets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectionError {
    /// Required change context was missing.
    #[error("change context is incomplete")]
    Environment(#[from] EnvironmentError),

    /// Version control failed.
    #[error("version control error")]
    Vcs(#[from] VcsError),

    /// The build graph could not be queried.
    #[error("build graph error")]
    BuildGraph(#[from] BuildGraphError),

    /// The test metadata store could not be read.
    #[error("test metadata store error")]
    MetadataStore(#[from] MetadataStoreError),

    /// A team test config could not be loaded.
    #[error("team test config error")]
    TeamConfig(#[from] TeamConfigError),

    /// The candidate query could not be composed.
    #[error("failed to compose candidate query")]
    QueryCompose(#[from] QueryComposeError),
}
