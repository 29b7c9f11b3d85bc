// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal output: the stderr logger, error styles and the stdout sink for selection results.

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::{
    fmt,
    io::{self, BufWriter, Write},
};
use supports_color::Stream;
use tracing::{Event, Level, Subscriber, level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Log events with this target are printed as-is, without a `level: ` prefix.
pub(crate) const NO_HEADING: &str = "microcheck::no_heading";

/// Overrides the log filter, in `tracing` target syntax: `microcheck_runner=trace,info`.
const LOG_ENV: &str = "MICROCHECK_LOG";

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Log debug messages too
    #[arg(long, short, global = true, env = "MICROCHECK_VERBOSE")]
    pub(crate) verbose: bool,

    /// When to color stderr: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "MICROCHECK_COLOR"
    )]
    pub(crate) color: ColorChoice,
}

impl OutputOpts {
    /// Installs the stderr logger and returns the context errors are printed with.
    pub(crate) fn init(self) -> OutputContext {
        let colorize = self.color.enabled_for(Stream::Stderr);
        install_logger(self.verbose, colorize);
        OutputContext { colorize }
    }
}

/// Output settings for the current invocation.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    colorize: bool,
}

impl OutputContext {
    /// Returns the styles for error messages on stderr.
    pub fn stderr_styles(&self) -> StderrStyles {
        if self.colorize {
            StderrStyles { bold: style().bold() }
        } else {
            StderrStyles::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn enabled_for(self, stream: Stream) -> bool {
        match self {
            Self::Auto => supports_color::on_cached(stream).is_some(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Styles for messages printed to stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
}

fn default_targets(verbose: bool) -> Targets {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    Targets::new().with_default(level)
}

/// Parses the value of [`LOG_ENV`]. An unset or empty value means the default filter.
fn parse_targets(value: Option<&str>, verbose: bool) -> Result<Targets, String> {
    match value {
        None | Some("") => Ok(default_targets(verbose)),
        Some(value) => value
            .parse()
            .map_err(|err| format!("invalid {LOG_ENV} `{value}`: {err}")),
    }
}

fn install_logger(verbose: bool, colorize: bool) {
    let value = std::env::var_os(LOG_ENV);
    let parsed = match value.as_ref().map(|value| value.to_str()) {
        None => parse_targets(None, verbose),
        Some(Some(value)) => parse_targets(Some(value), verbose),
        Some(None) => Err(format!("{LOG_ENV} is not valid UTF-8")),
    };
    let (targets, invalid) = match parsed {
        Ok(targets) => (targets, None),
        Err(message) => (default_targets(verbose), Some(message)),
    };

    let layer = tracing_subscriber::fmt::layer()
        .event_format(LevelPrefix::new(colorize))
        .with_writer(io::stderr)
        .with_filter(targets);
    // Fails only if a logger is already installed, and then that one stays.
    let _ = tracing_subscriber::registry().with(layer).try_init();

    if let Some(message) = invalid {
        warn!("{message}, using the default filter");
    }
}

/// Prints each event as `level: message`.
struct LevelPrefix {
    error: Style,
    warning: Style,
    plain: Style,
    trace: Style,
}

impl LevelPrefix {
    fn new(colorize: bool) -> Self {
        if colorize {
            Self {
                error: style().red().bold(),
                warning: style().yellow().bold(),
                plain: style().bold(),
                trace: style().dimmed(),
            }
        } else {
            Self {
                error: Style::new(),
                warning: Style::new(),
                plain: Style::new(),
                trace: Style::new(),
            }
        }
    }

    fn label(&self, level: Level) -> (&'static str, Style) {
        match level {
            Level::ERROR => ("error", self.error),
            Level::WARN => ("warning", self.warning),
            Level::INFO => ("info", self.plain),
            Level::DEBUG => ("debug", self.plain),
            Level::TRACE => ("trace", self.trace),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LevelPrefix
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING {
            let (label, style) = self.label(*metadata.level());
            write!(writer, "{}: ", label.style(style))?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Where selection results are written.
#[derive(Default)]
pub enum OutputWriter {
    /// The process's standard output.
    #[default]
    Normal,

    /// An in-memory buffer.
    #[cfg(test)]
    Test {
        /// Everything written so far.
        stdout: Vec<u8>,
    },
}

impl OutputWriter {
    /// Returns a writer for standard output. Callers flush it when done.
    pub(crate) fn stdout_writer(&mut self) -> Box<dyn Write + '_> {
        match self {
            Self::Normal => Box::new(BufWriter::new(io::stdout())),
            #[cfg(test)]
            Self::Test { stdout } => Box::new(stdout),
        }
    }
}
