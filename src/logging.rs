//! Process logger with configurable streams.
//!
//! Components report through [`Logger::signal`], which fans each record out
//! to every attached [`Stream`] that accepts its level and channel. Streams
//! are resources like any other: they are declared under `log.streams.<id>`
//! and built by a [`StreamFactory`].
//!
//! The `console` driver forwards records to `tracing`, so they end up
//! wherever the binary's subscriber writes (stdout, stderr or a file).

use crate::bag::Bag;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::factory::{ResourceConfig, ResourceFactory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU8, Ordering},
};
use tracing::Level;

pub const STREAMS_PATH: &str = "log.streams";
pub const DEFAULT_LEVEL_PATH: &str = "log.default_level";

/// Record severity, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Notice,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(Error::decode(format!("unknown log level '{}'", other))),
        }
    }
}

/// Map a record level onto the closest `tracing` level.
pub fn level_to_tracing(level: LogLevel) -> Level {
    match level {
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info | LogLevel::Notice => Level::INFO,
        LogLevel::Warning => Level::WARN,
        LogLevel::Error | LogLevel::Fatal => Level::ERROR,
    }
}

/// Minimum level, adjustable at runtime.
pub struct LevelFilter(AtomicU8);

impl LevelFilter {
    pub fn new(level: LogLevel) -> Self {
        Self(AtomicU8::new(level as u8))
    }

    pub fn get(&self) -> LogLevel {
        let raw = self.0.load(Ordering::Relaxed);
        LogLevel::ALL
            .into_iter()
            .find(|level| *level as u8 == raw)
            .unwrap_or(LogLevel::Debug)
    }

    pub fn set(&self, level: LogLevel) {
        self.0.store(level as u8, Ordering::Relaxed);
    }

    pub fn allows(&self, level: LogLevel) -> bool {
        level as u8 >= self.0.load(Ordering::Relaxed)
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

/// Destination for log records.
pub trait Stream: Send + Sync {
    /// Whether the stream wants records at `level` on `channel`.
    fn accepts(&self, level: LogLevel, channel: &str) -> bool;

    fn write(&self, level: LogLevel, channel: &str, message: &str, context: &Bag) -> Result<()>;
}

/// Factory of streams configured under `log.streams`.
pub type StreamFactory = ResourceFactory<dyn Stream>;

/// Stream forwarding to `tracing`.
pub struct ConsoleStream {
    id: String,
    filter: LevelFilter,
    /// Empty means every channel.
    channels: Vec<String>,
}

impl ConsoleStream {
    pub fn new(id: impl Into<String>, level: LogLevel, channels: Vec<String>) -> Self {
        Self {
            id: id.into(),
            filter: LevelFilter::new(level),
            channels,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.filter.get()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }
}

impl Stream for ConsoleStream {
    fn accepts(&self, level: LogLevel, channel: &str) -> bool {
        self.filter.allows(level)
            && (self.channels.is_empty() || self.channels.iter().any(|c| c == channel))
    }

    fn write(&self, level: LogLevel, channel: &str, message: &str, context: &Bag) -> Result<()> {
        let stream = self.id.as_str();
        let context = context.to_json();
        match level_to_tracing(level) {
            Level::ERROR => tracing::error!(stream, channel, %level, %context, "{}", message),
            Level::WARN => tracing::warn!(stream, channel, %level, %context, "{}", message),
            Level::INFO => tracing::info!(stream, channel, %level, %context, "{}", message),
            Level::DEBUG => tracing::debug!(stream, channel, %level, %context, "{}", message),
            Level::TRACE => tracing::trace!(stream, channel, %level, %context, "{}", message),
        }
        Ok(())
    }
}

/// Create the stream factory with the `console` driver registered.
///
/// Stream fields: `level` (falls back to `log.default_level`, then `info`)
/// and `channels` (optional list).
pub fn stream_factory(config: Arc<Config>) -> StreamFactory {
    let factory = StreamFactory::new("log stream", STREAMS_PATH, Arc::clone(&config));
    factory.register("console", move |id: &str, cfg: &Bag| -> Result<Arc<dyn Stream>> {
        let fields = ResourceConfig::new(id, cfg);
        let level = configured_level(&fields, &config)?;
        let channels = fields.str_list("channels")?;
        Ok(Arc::new(ConsoleStream::new(id, level, channels)))
    });
    factory
}

fn configured_level(fields: &ResourceConfig<'_>, config: &Config) -> Result<LogLevel> {
    let raw = fields
        .bag()
        .string("level")
        .map(str::to_string)
        .or_else(|| config.string(DEFAULT_LEVEL_PATH));
    match raw {
        None => Ok(LogLevel::Info),
        Some(raw) => raw.parse().map_err(|_: Error| {
            Error::invalid_config(fields.id(), "level").with_context("value", raw)
        }),
    }
}

/// Fan-out logger over named streams.
#[derive(Default)]
pub struct Logger {
    /// Global minimum, applied before any stream sees a record.
    level_filter: LevelFilter,
    streams: RwLock<BTreeMap<String, Arc<dyn Stream>>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level_filter(&self) -> &LevelFilter {
        &self.level_filter
    }

    /// Attach (or replace) a stream.
    pub fn add_stream(&self, id: impl Into<String>, stream: Arc<dyn Stream>) {
        self.streams
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), stream);
    }

    pub fn remove_stream(&self, id: &str) -> bool {
        self.streams
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Attached stream ids, sorted.
    pub fn streams(&self) -> Vec<String> {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Build every configured stream and attach it.
    pub fn attach_configured(&self, factory: &StreamFactory) -> Result<usize> {
        let built = factory.load_all()?;
        let count = built.len();
        for (id, stream) in built {
            self.add_stream(id, stream);
        }
        Ok(count)
    }

    /// Deliver a record to every stream that accepts it.
    ///
    /// Stream failures are reported through `tracing` and never returned.
    pub fn signal(&self, level: LogLevel, channel: &str, message: &str, context: &Bag) {
        if !self.level_filter.allows(level) {
            return;
        }
        let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
        for (id, stream) in streams.iter() {
            if !stream.accepts(level, channel) {
                continue;
            }
            if let Err(err) = stream.write(level, channel, message, context) {
                tracing::warn!(stream = %id, error = %err, "log stream write failed");
            }
        }
    }

    // Convenience methods

    pub fn debug(&self, channel: &str, message: &str) {
        self.signal(LogLevel::Debug, channel, message, &Bag::new());
    }

    pub fn info(&self, channel: &str, message: &str) {
        self.signal(LogLevel::Info, channel, message, &Bag::new());
    }

    pub fn notice(&self, channel: &str, message: &str) {
        self.signal(LogLevel::Notice, channel, message, &Bag::new());
    }

    pub fn warning(&self, channel: &str, message: &str) {
        self.signal(LogLevel::Warning, channel, message, &Bag::new());
    }

    pub fn error(&self, channel: &str, message: &str) {
        self.signal(LogLevel::Error, channel, message, &Bag::new());
    }

    pub fn fatal(&self, channel: &str, message: &str) {
        self.signal(LogLevel::Fatal, channel, message, &Bag::new());
    }
}
