//! File-backed configuration source.

use super::disk::{Disk, DiskFactory};
use super::parser::{Parser, ParserFactory};
use super::source::Source;
use super::{Config, DEFAULT_DISK_ID_PATH, DEFAULT_PARSER_ID_PATH};
use crate::bag::Bag;
use crate::error::Result;
use crate::factory::{Creator, ResourceConfig};
use std::sync::Arc;
use tracing::debug;

/// Source holding the decoded content of one file, unmapped.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: String,
    bag: Bag,
}

impl FileSource {
    /// Read `path` from `disk` and decode it with `parser`.
    pub fn open(disk: &dyn Disk, path: &str, parser: &dyn Parser) -> Result<Self> {
        let mut reader = disk.open(path)?;
        let bag = parser
            .parse(&mut reader)
            .map_err(|err| err.with_context("path", path))?;
        debug!(path, keys = bag.len(), "config file decoded");
        Ok(Self {
            path: path.to_string(),
            bag,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Source for FileSource {
    fn bag(&self) -> &Bag {
        &self.bag
    }
}

/// Creator for the `file` source driver.
///
/// Fields: `path` (required), `disk_id` (falls back to
/// `config.default_disk_id`), `parser_id` (falls back to
/// `config.default_parser_id`). Referenced disks and parsers are resolved
/// through their own factories.
pub struct FileSourceCreator {
    config: Arc<Config>,
    disks: Arc<DiskFactory>,
    parsers: Arc<ParserFactory>,
}

impl FileSourceCreator {
    pub fn new(config: Arc<Config>, disks: Arc<DiskFactory>, parsers: Arc<ParserFactory>) -> Self {
        Self {
            config,
            disks,
            parsers,
        }
    }
}

impl Creator<dyn Source> for FileSourceCreator {
    fn create(&self, id: &str, cfg: &Bag) -> Result<Arc<dyn Source>> {
        let fields = ResourceConfig::new(id, cfg).with_defaults(&self.config);
        let disk_id = fields.require_str_or("disk_id", DEFAULT_DISK_ID_PATH)?;
        let parser_id = fields.require_str_or("parser_id", DEFAULT_PARSER_ID_PATH)?;
        let path = fields.require_str("path")?;

        let disk = self.disks.get(&disk_id)?;
        let parser = self.parsers.get(&parser_id)?;
        let source = FileSource::open(disk.as_ref(), &path, parser.as_ref())
            .map_err(|err| err.with_context("source", id))?;
        Ok(Arc::new(source))
    }
}
