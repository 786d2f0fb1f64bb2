//! Log sinks owned by the logging advice.
//!
//! Each [`LoggingStore`](super::LoggingStore) emits its audit lines into its
//! own [`LogHandler`] rather than the process-wide subscriber, so two proxies
//! over different backends can log to different places at different levels.

use std::fmt;
use std::str::FromStr;

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

/// Errors raised while configuring a log sink.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("unknown log level {0:?}")]
    InvalidLevel(String),
}

/// Result type for logging configuration.
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Severity threshold of a proxy's logger.
///
/// Accepts the conventional names `TRACE`, `DEBUG`, `INFO`, `WARNING`
/// (or `WARN`), `ERROR`, `CRITICAL` and `NOTSET`, in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(LevelFilter);

impl LogLevel {
    pub const DEBUG: LogLevel = LogLevel(LevelFilter::DEBUG);
    pub const INFO: LogLevel = LogLevel(LevelFilter::INFO);

    pub fn filter(&self) -> LevelFilter {
        self.0
    }

    /// Whether events at `level` pass this threshold.
    pub fn enables(&self, level: Level) -> bool {
        level <= self.0
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::DEBUG
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self> {
        let filter = match s.trim().to_ascii_uppercase().as_str() {
            "NOTSET" | "TRACE" => LevelFilter::TRACE,
            "DEBUG" => LevelFilter::DEBUG,
            "INFO" => LevelFilter::INFO,
            "WARNING" | "WARN" => LevelFilter::WARN,
            "ERROR" | "CRITICAL" => LevelFilter::ERROR,
            "OFF" => LevelFilter::OFF,
            _ => return Err(LoggingError::InvalidLevel(s.to_string())),
        };
        Ok(LogLevel(filter))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Destination for a proxy's log lines.
///
/// Cloning is cheap; clones share the same subscriber.
#[derive(Clone)]
pub struct LogHandler {
    dispatch: Dispatch,
}

impl LogHandler {
    /// Default sink: stderr, one line per event formatted as
    /// `timestamp - logger - LEVEL - message`.
    pub fn console(level: LogLevel) -> Self {
        Self::with_writer(std::io::stderr, level)
    }

    /// Console-formatted sink writing to `make_writer`.
    pub fn with_writer<W>(make_writer: W, level: LogLevel) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(make_writer)
            .with_max_level(level.filter())
            .event_format(ConsoleFormat)
            .finish();
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Sink backed by an arbitrary subscriber.
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Run `f` with this handler as the current dispatcher.
    pub(crate) fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl fmt::Debug for LogHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandler").finish_non_exhaustive()
    }
}

/// `timestamp - logger - LEVEL - message`
///
/// The logger name comes from the event's `logger` field, falling back to
/// the event target.
struct ConsoleFormat;

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = ConsoleFields::default();
        event.record(&mut fields);

        let metadata = event.metadata();
        let logger = fields.logger.as_deref().unwrap_or(metadata.target());
        writeln!(
            writer,
            "{} - {} - {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            logger,
            level_name(metadata.level()),
            fields.message
        )
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

#[derive(Default)]
struct ConsoleFields {
    logger: Option<String>,
    message: String,
}

impl Visit for ConsoleFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "logger" => self.logger = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "logger" => self.logger = Some(format!("{value:?}")),
            "message" => self.message = format!("{value:?}"),
            _ => {}
        }
    }
}
