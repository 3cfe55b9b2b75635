//! Logging setup on top of `tracing-subscriber`.
//!
//! ```rust,ignore
//! use courier_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured base level; per-target
//! filters from the configuration are added on top.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "courier.log";

/// Initializes the global subscriber from configuration.
///
/// Does nothing if a subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Converts the configured span events into `fmt` flags.
pub fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .fold(FmtSpan::NONE, |acc, (_, flag)| acc | flag)
}

/// Builder for the global `tracing` subscriber.
///
/// ```rust,ignore
/// LoggingBuilder::new()
///     .level(LogLevel::Debug)
///     .directive("courier_framework::dispatcher=trace")
///     .span_events(SpanEventConfig { close: true, ..Default::default() })
///     .init();
/// ```
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: LogLevel,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    span_events: SpanEventConfig,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::from_config(&LoggingConfig::default())
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut directives: Vec<String> = config
            .filters
            .iter()
            .map(|(target, level)| format!("{target}={level}"))
            .collect();
        // HashMap order is unstable; keep the output deterministic.
        directives.sort();

        Self {
            level: config.level,
            directives,
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            rotation: config.rotation,
            span_events: config.span_events,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `courier_runtime=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Writes to `path`, switching the output to file.
    pub fn file(mut self, path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        self.output = LogOutput::File;
        self.file_path = Some(path.into());
        self.rotation = rotation;
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.span_events = events;
        self
    }

    pub fn thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Includes file names and line numbers.
    pub fn file_location(mut self, enabled: bool) -> Self {
        self.file_location = enabled;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        for directive in &self.directives {
            match directive.parse::<Directive>() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("Ignoring invalid log directive {directive:?}: {e}"),
            }
        }
        filter
    }

    fn make_writer(&self) -> BoxMakeWriter {
        match self.output {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::File => match &self.file_path {
                Some(path) => {
                    let dir = path.parent().unwrap_or_else(|| Path::new("."));
                    let name = path.file_name().unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
                    BoxMakeWriter::new(match self.rotation {
                        LogRotation::Never => rolling::never(dir, name),
                        LogRotation::Hourly => rolling::hourly(dir, name),
                        LogRotation::Daily => rolling::daily(dir, name),
                    })
                }
                None => BoxMakeWriter::new(std::io::stdout),
            },
        }
    }

    fn build_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = fmt_span(&self.span_events);
        let base = fmt::layer()
            .with_span_events(spans)
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location)
            .with_writer(self.make_writer());

        match self.format {
            LogFormat::Compact => base.compact().boxed(),
            LogFormat::Full => base.boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => base.json().boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => base.boxed(),
        }
    }

    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber, failing if one is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let layer = self.build_layer();
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()?;

        if self.output == LogOutput::File && self.file_path.is_none() {
            warn!("File output requested without logging.file_path, writing to stdout");
        }
        #[cfg(not(feature = "json-log"))]
        if self.format == LogFormat::Json {
            warn!("JSON log format needs the json-log feature, using the full format");
        }
        Ok(())
    }
}
