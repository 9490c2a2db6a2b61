//! Named filesystem abstraction used by file-backed sources.

use super::DISKS_PATH;
use crate::bag::Bag;
use crate::error::{Error, Result};
use crate::factory::{ResourceConfig, ResourceFactory};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read access to files addressed relative to a disk.
pub trait Disk: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>>;
}

/// Factory of disks configured under `filesystem.disks`.
pub type DiskFactory = ResourceFactory<dyn Disk>;

/// Disk rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Disk for LocalDisk {
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let full = self.root.join(path);
        let file = File::open(&full)
            .map_err(|err| Error::from(err).with_context("path", full.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Create the disk factory with the `local` driver registered.
///
/// `root` is optional and defaults to the working directory.
pub fn disk_factory(config: Arc<super::Config>) -> DiskFactory {
    let factory = DiskFactory::new("disk", DISKS_PATH, config);
    factory.register("local", |id: &str, cfg: &Bag| -> Result<Arc<dyn Disk>> {
        let root = ResourceConfig::new(id, cfg).str_or("root", ".");
        Ok(Arc::new(LocalDisk::new(root)))
    });
    factory
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_local_disk_reads_relative_to_root() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.json"), "{}").unwrap();

        let disk = LocalDisk::new(temp.path());
        let mut content = String::new();
        disk.open("app.json")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "{}");
    }

    #[test]
    fn test_missing_file_is_io_error_with_path() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path());
        let err = disk.open("absent.yaml").err().unwrap();
        assert!(err.is(ErrorCode::Io));
        assert!(err.context["path"].ends_with("absent.yaml"));
    }

    #[test]
    fn test_factory_root_from_config() {
        let config = Arc::new(super::super::Config::new());
        config.set("filesystem.disks.assets.driver", "local").unwrap();
        config.set("filesystem.disks.assets.root", "/srv/assets").unwrap();
        let disks = disk_factory(config);
        assert!(disks.get("assets").is_ok());
        assert!(disks.get("other").is_err());
    }
}
