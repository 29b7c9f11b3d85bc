// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{ConfigParseError, ConfigParseErrorKind, ConfigurationError};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Trait for handling configuration warnings.
///
/// This trait allows for different warning handling strategies, such as logging warnings
/// (the default behavior) or collecting them for testing purposes.
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        workspace_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    );
}

/// Default implementation of [`ConfigWarnings`] that logs warnings using the tracing crate.
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        workspace_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    ) {
        let config_file = config_file
            .strip_prefix(workspace_root)
            .unwrap_or(config_file);
        match unknown.first() {
            Some(key) if unknown.len() == 1 => {
                warn!("in config file {config_file}, ignoring unknown configuration key: {key}");
            }
            _ => {
                warn!("in config file {config_file}, ignoring unknown configuration keys:");
                for key in unknown {
                    warn!("  - {key}");
                }
            }
        }
    }
}

/// Overall configuration for microcheck.
///
/// This is the root data structure for microcheck configuration. Repository-specific
/// configuration in `.config/microcheck.toml` is layered on top of the default configuration.
#[derive(Clone, Debug)]
pub struct MicrocheckConfig {
    workspace_root: Utf8PathBuf,
    inner: MicrocheckConfigDeserialize,
}

impl MicrocheckConfig {
    /// The default location of the config within the workspace: `.config/microcheck.toml`.
    pub const CONFIG_PATH: &'static str = ".config/microcheck.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the microcheck config from the given file, or if not specified from
    /// `.config/microcheck.toml` in the workspace root.
    ///
    /// An explicitly specified file must exist. The default location may be absent, in which case
    /// the default config is used.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_warnings(workspace_root, config_file, &mut DefaultConfigWarnings)
    }

    /// Like [`Self::from_sources`], but with a custom handler for warnings.
    pub fn from_sources_with_warnings(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (
                file.to_owned(),
                File::new(file.as_str(), FileFormat::Toml),
            ),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };
        debug!("reading microcheck config from `{config_file}`");

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &workspace_root, &unknown);
        }

        Ok(Self {
            workspace_root,
            inner,
        })
    }

    /// Returns the default microcheck config.
    pub fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        let (inner, unknown) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");

        // Make sure there aren't any unknown keys in the default config, since it is embedded
        // in the binary.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                itertools::join(&unknown, ", ")
            );
        }

        Self {
            workspace_root: workspace_root.into(),
            inner,
        }
    }

    /// Returns the workspace root that relative paths are resolved against.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Returns the directory holding the per-team test config files.
    pub fn yaml_dir(&self) -> Utf8PathBuf {
        self.workspace_root.join(&self.inner.yaml_dir)
    }

    /// Returns the path to the test metadata snapshot, or `None` if the store is disabled.
    ///
    /// An enabled store without a path is an error: selecting without the store has to be asked
    /// for explicitly.
    pub fn store_path(&self) -> Result<Option<Utf8PathBuf>, ConfigurationError> {
        if !self.inner.store.enabled {
            return Ok(None);
        }
        match &self.inner.store.path {
            Some(path) => Ok(Some(self.workspace_root.join(path))),
            None => Err(ConfigurationError::StorePathMissing),
        }
    }

    /// Returns the path to the `bazel` binary.
    pub fn bazel_path(&self) -> &str {
        &self.inner.bazel.path
    }

    /// Returns the path to the `git` binary.
    pub fn git_path(&self) -> &str {
        &self.inner.git.path
    }

    /// Returns the git remote the base branch is fetched from.
    pub fn git_remote(&self) -> &str {
        &self.inner.git.remote
    }

    /// Returns the path to the `docker` binary.
    pub fn docker_path(&self) -> &str {
        &self.inner.docker.path
    }

    /// Returns the image repository that executor images are pulled from.
    pub fn docker_repository(&self) -> &str {
        &self.inner.docker.repository
    }

    /// Returns the configured image tag for a team, if it overrides the default.
    pub fn image_tag(&self, team: &str) -> Option<&str> {
        self.inner
            .teams
            .get(team)
            .and_then(|team| team.image_tag.as_deref())
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(MicrocheckConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: MicrocheckConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already reports the key.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MicrocheckConfigDeserialize {
    yaml_dir: Utf8PathBuf,
    store: StoreConfig,
    bazel: BazelConfig,
    git: GitConfig,
    docker: DockerConfig,
    #[serde(default)]
    teams: BTreeMap<String, TeamOverrides>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StoreConfig {
    enabled: bool,
    #[serde(default)]
    path: Option<Utf8PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
struct BazelConfig {
    path: String,
}

#[derive(Clone, Debug, Deserialize)]
struct GitConfig {
    path: String,
    remote: String,
}

#[derive(Clone, Debug, Deserialize)]
struct DockerConfig {
    path: String,
    repository: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TeamOverrides {
    #[serde(default)]
    image_tag: Option<String>,
}
