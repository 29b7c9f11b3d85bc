// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executors: the container environment a worker runs its shards in.
//!
//! An executor is chosen from the team (which picks the image) and the operating system (which
//! picks the kind of container). Building one never runs anything. The image is installed on
//! first use through a [`ContainerRuntime`].

use crate::{
    command::ToolCli,
    errors::{ConfigurationError, InstallError},
    partition::{ShardSpec, shard_targets},
};
use microcheck_metadata::{OperatingSystem, Target};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::{fmt, ops::Range};
use tracing::{debug, info};

/// The kind of container an executor runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// A Linux container.
    Linux,

    /// A Windows container.
    Windows,
}

impl ExecutorKind {
    /// Returns the executor kind for an operating system.
    pub fn for_os(os: OperatingSystem) -> Self {
        match os {
            OperatingSystem::Linux => Self::Linux,
            OperatingSystem::Windows => Self::Windows,
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => f.write_str("linux"),
            Self::Windows => f.write_str("windows"),
        }
    }
}

/// Options passed through to the container that runs tests.
///
/// The serialized form carries only what the container is started with. The image tag is
/// reported on its own.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ExecutorOptions {
    /// Overrides the image tag, which otherwise is `<team>build`.
    #[serde(skip)]
    pub image_tag: Option<String>,

    /// The container network to attach to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// The number of GPUs to expose. Linux only.
    pub gpus: u32,

    /// A temporary filesystem to mount. Linux only, and only `tmpfs` is supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmp_filesystem: Option<String>,

    /// The build type the image was built with, e.g. `debug` or `asan`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_type: Option<String>,

    /// Extra environment variables for the tests, as `KEY=VALUE` or `KEY`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_envs: Vec<String>,

    /// Assume the image is already present, and never install it.
    #[serde(skip)]
    pub skip_installation: bool,
}

/// The executor for one worker: the image to run, and the shards to run in it.
#[derive(Debug)]
pub struct Executor {
    kind: ExecutorKind,
    team: String,
    image_tag: String,
    shard_count: u64,
    shard_ids: Range<u64>,
    options: ExecutorOptions,
    installed: OnceCell<()>,
}

impl Executor {
    /// Chooses the executor for a worker.
    pub fn assign(spec: &ShardSpec, options: ExecutorOptions) -> Result<Self, ConfigurationError> {
        validate_team(spec.team())?;
        let os = spec.operating_system();
        if os == OperatingSystem::Windows {
            if options.gpus > 0 {
                return Err(ConfigurationError::UnsupportedOption { option: "gpus", os });
            }
            if options.tmp_filesystem.is_some() {
                return Err(ConfigurationError::UnsupportedOption {
                    option: "tmp-filesystem",
                    os,
                });
            }
        }
        if let Some(tmp_filesystem) = &options.tmp_filesystem
            && tmp_filesystem != "tmpfs"
        {
            return Err(ConfigurationError::InvalidOptionValue {
                option: "tmp-filesystem",
                value: tmp_filesystem.clone(),
                expected: "`tmpfs`",
            });
        }

        let image_tag = options
            .image_tag
            .clone()
            .unwrap_or_else(|| format!("{}build", spec.team()));
        let executor = Self {
            kind: ExecutorKind::for_os(os),
            team: spec.team().to_owned(),
            image_tag,
            shard_count: spec.shard_count(),
            shard_ids: spec.shard_ids(),
            options,
            installed: OnceCell::new(),
        };
        debug!(
            "assigned {} executor `{}` for shards {:?} of {}",
            executor.kind, executor.image_tag, executor.shard_ids, executor.shard_count,
        );
        Ok(executor)
    }

    /// Returns the kind of container.
    pub fn kind(&self) -> ExecutorKind {
        self.kind
    }

    /// Returns the team this executor runs tests for.
    pub fn team(&self) -> &str {
        &self.team
    }

    /// Returns the image tag, e.g. `corebuild`.
    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }

    /// Returns the total number of shards across all workers.
    pub fn shard_count(&self) -> u64 {
        self.shard_count
    }

    /// Returns the IDs of the shards this executor runs.
    pub fn shard_ids(&self) -> Range<u64> {
        self.shard_ids.clone()
    }

    /// Returns the container options.
    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Returns the targets for each of this executor's shards.
    pub fn worker_targets(&self, targets: &[Target]) -> Vec<ShardAssignment> {
        self.shard_ids
            .clone()
            .map(|shard_id| ShardAssignment {
                shard_id,
                targets: shard_targets(targets, self.shard_count, shard_id),
            })
            .collect()
    }

    /// Installs the image through `runtime`, unless it was installed already.
    ///
    /// Does nothing if [`ExecutorOptions::skip_installation`] is set.
    pub fn ensure_installed(&self, runtime: &dyn ContainerRuntime) -> Result<(), InstallError> {
        if self.options.skip_installation {
            debug!("skipping installation of `{}`", self.image_tag);
            return Ok(());
        }
        // Other callers block until the first install finishes. A failed install leaves the
        // cell empty, so the next call tries again.
        self.installed.get_or_try_init(|| {
            runtime.install(self.kind, &self.image_tag)?;
            info!("installed {} image `{}`", self.kind, self.image_tag);
            Ok(())
        })?;
        Ok(())
    }

    /// Returns true if the image was installed through [`Self::ensure_installed`].
    pub fn is_installed(&self) -> bool {
        self.installed.get().is_some()
    }
}

fn validate_team(team: &str) -> Result<(), ConfigurationError> {
    let reason = if team.is_empty() {
        "team name is empty"
    } else if !team
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        "team names may only contain ASCII letters, digits, `_` and `-`"
    } else {
        return Ok(());
    };
    Err(ConfigurationError::InvalidTeam {
        team: team.to_owned(),
        reason,
    })
}

/// The targets one shard runs.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ShardAssignment {
    /// The global shard ID.
    pub shard_id: u64,

    /// The targets in this shard, sorted.
    pub targets: Vec<Target>,
}

/// Installs executor images.
pub trait ContainerRuntime {
    /// Makes the image available locally.
    fn install(&self, kind: ExecutorKind, image_tag: &str) -> Result<(), InstallError>;
}

/// [`ContainerRuntime`] backed by the `docker` command-line tool.
#[derive(Clone, Debug)]
pub struct DockerCli {
    docker_path: String,
    repository: String,
}

impl DockerCli {
    /// Creates a new `DockerCli` that pulls images from `repository`.
    pub fn new(docker_path: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            docker_path: docker_path.into(),
            repository: repository.into(),
        }
    }

    /// Returns the full image name for a tag, e.g. `microcheck/ci:corebuild`.
    pub fn image_name(&self, image_tag: &str) -> String {
        format!("{}:{image_tag}", self.repository)
    }
}

impl ContainerRuntime for DockerCli {
    fn install(&self, kind: ExecutorKind, image_tag: &str) -> Result<(), InstallError> {
        let image = self.image_name(image_tag);
        let mut cli = ToolCli::new(&self.docker_path);
        cli.add_arg("pull");
        if kind == ExecutorKind::Windows {
            cli.add_args(["--platform", "windows"]);
        }
        cli.add_arg(image.as_str());
        cli.read()
            .map_err(|err| InstallError::new(image.clone(), err))?;
        Ok(())
    }
}
