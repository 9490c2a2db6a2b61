//! Explicit wiring of the configuration engine.
//!
//! A [`Kernel`] owns one [`Config`] and every factory built over it. Nothing
//! is global: tests and embedders can run any number of kernels side by side.

use crate::config::{
    Config, ConfigLoader, DiskFactory, JsonParser, LocalDisk, ParserFactory, SourceFactory,
    YamlParser, disk_factory, parser_factory, source_factory,
};
use crate::error::Result;
use crate::logging::{Logger, StreamFactory, stream_factory};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Summary of a boot sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootReport {
    /// Config sources added, in load order.
    pub sources: Vec<String>,
    /// Log streams attached.
    pub streams: usize,
}

pub struct Kernel {
    config: Arc<Config>,
    disks: Arc<DiskFactory>,
    parsers: Arc<ParserFactory>,
    sources: Arc<SourceFactory>,
    streams: Arc<StreamFactory>,
    logger: Arc<Logger>,
}

impl Kernel {
    /// Wire an empty config and every factory.
    ///
    /// Parsers `json` and `yaml` and the disk `local` (rooted at the working
    /// directory) are pre-seeded, so an entry file can declare further
    /// sources without configuring them first.
    pub fn new() -> Self {
        let config = Arc::new(Config::new());

        let disks = Arc::new(disk_factory(Arc::clone(&config)));
        disks.store("local", Arc::new(LocalDisk::new(".")));

        let parsers = Arc::new(parser_factory(Arc::clone(&config)));
        parsers.store("json", Arc::new(JsonParser));
        parsers.store("yaml", Arc::new(YamlParser));

        let sources = Arc::new(source_factory(
            Arc::clone(&config),
            Arc::clone(&disks),
            Arc::clone(&parsers),
        ));
        let streams = Arc::new(stream_factory(Arc::clone(&config)));

        Self {
            config,
            disks,
            parsers,
            sources,
            streams,
            logger: Arc::new(Logger::new()),
        }
    }

    /// Load configuration from `entry` (if any), then attach log streams.
    pub fn boot(&self, entry: Option<&Path>) -> Result<BootReport> {
        let loader = ConfigLoader::new(
            Arc::clone(&self.config),
            Arc::clone(&self.sources),
            Arc::clone(&self.parsers),
        );
        let sources = loader.load(entry)?;
        let streams = self.logger.attach_configured(&self.streams)?;
        info!(sources = sources.len(), streams, "kernel booted");
        Ok(BootReport { sources, streams })
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn disks(&self) -> &Arc<DiskFactory> {
        &self.disks
    }

    pub fn parsers(&self) -> &Arc<ParserFactory> {
        &self.parsers
    }

    pub fn sources(&self) -> &Arc<SourceFactory> {
        &self.sources
    }

    pub fn streams(&self) -> &Arc<StreamFactory> {
        &self.streams
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
