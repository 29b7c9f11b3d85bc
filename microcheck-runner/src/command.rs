// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::CommandError;
use camino::Utf8Path;
use itertools::Itertools;
use std::borrow::Cow;
use tracing::{debug, trace};

/// A call to an external tool (`git`, `bazel`, `docker`) whose output is captured.
#[derive(Clone, Debug)]
pub(crate) struct ToolCli<'a> {
    program: &'a str,
    args: Vec<Cow<'a, str>>,
    current_dir: Option<&'a Utf8Path>,
}

impl<'a> ToolCli<'a> {
    pub(crate) fn new(program: &'a str) -> Self {
        Self {
            program,
            args: vec![],
            current_dir: None,
        }
    }

    pub(crate) fn add_arg(&mut self, arg: impl Into<Cow<'a, str>>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn add_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'a, str>>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub(crate) fn current_dir(&mut self, dir: &'a Utf8Path) -> &mut Self {
        self.current_dir = Some(dir);
        self
    }

    /// Returns the command line, for display in logs and errors.
    pub(crate) fn command_line(&self) -> String {
        std::iter::once(self.program)
            .chain(self.args.iter().map(|arg| &**arg))
            .join(" ")
    }

    /// Convert the command to a [`duct::Expression`].
    pub(crate) fn to_expression(&self) -> duct::Expression {
        let expression = duct::cmd(self.program, self.args.iter().map(|arg| &**arg));
        match self.current_dir {
            Some(dir) => expression.dir(dir.as_std_path()),
            None => expression,
        }
    }

    /// Executes the command and returns its standard output as a string.
    ///
    /// A non-zero exit status is an error, carrying the command's standard error.
    pub(crate) fn read(&self) -> Result<String, CommandError> {
        let expression = self.to_expression();
        trace!("executing command: {:?}", expression);
        let output = expression
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|err| CommandError::Exec {
                command: self.command_line(),
                err,
            })?;
        if !output.status.success() {
            debug!("`{}` failed with {}", self.command_line(), output.status);
            return Err(CommandError::Failed {
                command: self.command_line(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        String::from_utf8(output.stdout).map_err(|err| CommandError::NonUtf8Output {
            command: self.command_line(),
            err,
        })
    }
}

/// Splits command output into its non-empty, trimmed lines.
pub(crate) fn output_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|line| !line.is_empty())
}
