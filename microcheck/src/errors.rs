// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING, StderrStyles};
use camino::Utf8PathBuf;
use microcheck_metadata::{MicrocheckExitCode, OperatingSystem};
use microcheck_runner::errors::{
    ConfigParseError, ConfigParseErrorKind, ConfigurationError, InstallError, MetadataStoreError,
    SelectionError,
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

// The #[error] strings are unused here: errors are printed with display_to_stderr, which
// colorizes them.

/// An error that microcheck reports and turns into an exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not read the current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("workspace root is not valid UTF-8")]
    WorkspaceRootInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("invalid configuration")]
    ConfigurationError {
        #[from]
        err: ConfigurationError,
    },
    #[error("failed to open test metadata store")]
    MetadataStoreOpenError {
        #[from]
        err: MetadataStoreError,
    },
    #[error("failed to install executor image")]
    InstallError {
        #[from]
        err: InstallError,
    },
    #[error("selection failed")]
    SelectionError {
        #[from]
        err: SelectionError,
    },
    #[error("no targets selected")]
    NoTargetsSelected { team: String, os: OperatingSystem },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("error serializing output")]
    SerializeOutputError {
        #[source]
        err: serde_json::Error,
    },
}

impl ExpectedError {
    pub(crate) fn write_output_error(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::WorkspaceRootInvalidUtf8 { .. }
            | Self::ConfigParseError { .. } => MicrocheckExitCode::SETUP_ERROR,
            Self::ConfigurationError { .. } => MicrocheckExitCode::CONFIGURATION_ERROR,
            Self::MetadataStoreOpenError { .. } => MicrocheckExitCode::METADATA_STORE_FAILED,
            Self::InstallError { .. } => MicrocheckExitCode::INSTALL_FAILED,
            Self::SelectionError { err } => match err {
                SelectionError::Environment(_) => MicrocheckExitCode::ENVIRONMENT_MISSING,
                SelectionError::Vcs(_) => MicrocheckExitCode::VCS_FAILED,
                SelectionError::BuildGraph(_) => MicrocheckExitCode::QUERY_FAILED,
                SelectionError::MetadataStore(_) => MicrocheckExitCode::METADATA_STORE_FAILED,
                SelectionError::TeamConfig(_) | SelectionError::QueryCompose(_) => {
                    MicrocheckExitCode::CONFIGURATION_ERROR
                }
                _ => MicrocheckExitCode::SETUP_ERROR,
            },
            Self::NoTargetsSelected { .. } => MicrocheckExitCode::NO_TARGETS_SELECTED,
            Self::WriteOutputError { .. } | Self::SerializeOutputError { .. } => {
                MicrocheckExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not read the current directory");
                Some(err as &dyn Error)
            }
            Self::WorkspaceRootInvalidUtf8 { path } => {
                error!(
                    "workspace root `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                match err.kind() {
                    ConfigParseErrorKind::BuildError(build_error) => {
                        error!(
                            "failed to parse microcheck config at `{}`: {}",
                            err.config_file().style(styles.bold),
                            build_error
                        );
                    }
                    ConfigParseErrorKind::DeserializeError(deserialize_error) => {
                        error!(
                            "failed to parse microcheck config at `{}`: at `{}`: {}",
                            err.config_file().style(styles.bold),
                            deserialize_error.path().style(styles.bold),
                            deserialize_error.inner()
                        );
                    }
                    _ => {
                        error!("{err}");
                    }
                }
                None
            }
            Self::ConfigurationError { err } => {
                error!("{err}");
                err.source()
            }
            Self::MetadataStoreOpenError { err } => {
                error!("{err}");
                err.source()
            }
            Self::InstallError { err } => {
                error!(
                    "failed to install executor image `{}`",
                    err.image().style(styles.bold)
                );
                err.source()
            }
            Self::SelectionError { err } => {
                error!("{err}");
                err.source()
            }
            Self::NoTargetsSelected { team, os } => {
                error!(
                    "no targets selected for team `{}` on {}",
                    team.style(styles.bold),
                    os
                );
                None
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
            Self::SerializeOutputError { err } => {
                error!("error serializing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

/// Returns the workspace root as a UTF-8 path.
pub(crate) fn utf8_workspace_root(
    path: std::path::PathBuf,
) -> Result<Utf8PathBuf, ExpectedError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| ExpectedError::WorkspaceRootInvalidUtf8 { path })
}
