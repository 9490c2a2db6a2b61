//! Boot-time configuration loading.
//!
//! Loading happens in one pass:
//! 1. The entry file is added as source `entry` at priority 0, decoded by the
//!    parser matching its extension.
//! 2. Every id declared under `config.sources` in the resulting view is built
//!    through the source factory and added with its declared priority.
//!
//! Sources declared by the sources of step 2 are not followed.

use super::disk::LocalDisk;
use super::file::FileSource;
use super::parser::{ParserFactory, parser_for_extension};
use super::{Config, SOURCES_PATH, SourceFactory};
use crate::bag::path;
use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Source id of the entry file.
pub const ENTRY_SOURCE_ID: &str = "entry";
/// Priority of the entry file; declared sources usually sit above it.
pub const ENTRY_PRIORITY: i32 = 0;

/// Candidate locations of the entry file.
#[derive(Debug, Clone, Default)]
pub struct EntryPaths {
    /// Explicit file (`--config` or `HEARTH_CONFIG_PATH`); used even if absent
    pub explicit: Option<PathBuf>,
    /// Project-level file (./config/config.yaml)
    pub project: Option<PathBuf>,
    /// User-level file (~/.hearth/config.yaml)
    pub user: Option<PathBuf>,
}

impl EntryPaths {
    /// Discover candidates from the environment and the usual locations.
    pub fn discover() -> Self {
        let explicit = std::env::var("HEARTH_CONFIG_PATH")
            .ok()
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        let project = Some(PathBuf::from("config").join("config.yaml"));
        let user = dirs::home_dir().map(|home| home.join(".hearth").join("config.yaml"));
        Self {
            explicit,
            project,
            user,
        }
    }

    /// Replace the explicit file.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// The entry file to load: the explicit one, else the first existing
    /// candidate.
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(explicit) = &self.explicit {
            return Some(explicit.clone());
        }
        [&self.project, &self.user]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_file())
            .cloned()
    }
}

/// Populates a [`Config`] from an entry file and the sources it declares.
pub struct ConfigLoader {
    config: Arc<Config>,
    sources: Arc<SourceFactory>,
    parsers: Arc<ParserFactory>,
}

impl ConfigLoader {
    pub fn new(config: Arc<Config>, sources: Arc<SourceFactory>, parsers: Arc<ParserFactory>) -> Self {
        Self {
            config,
            sources,
            parsers,
        }
    }

    /// Load the entry file (if any), then the declared sources.
    ///
    /// Returns the ids of the sources added, in load order.
    pub fn load(&self, entry: Option<&Path>) -> Result<Vec<String>> {
        let mut loaded = Vec::new();
        if let Some(entry) = entry {
            self.load_entry(entry)?;
            loaded.push(ENTRY_SOURCE_ID.to_string());
        } else {
            debug!("no entry config file");
        }
        loaded.extend(self.load_sources()?);
        Ok(loaded)
    }

    /// Add `file` as the `entry` source.
    pub fn load_entry(&self, file: &Path) -> Result<()> {
        let parser_id = file
            .extension()
            .and_then(OsStr::to_str)
            .and_then(parser_for_extension)
            .ok_or_else(|| {
                Error::decode("unsupported config file extension")
                    .with_context("path", file.display())
            })?;
        let name = file
            .file_name()
            .and_then(OsStr::to_str)
            .ok_or_else(|| Error::io("config file has no name").with_context("path", file.display()))?;
        let dir = file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let parser = self.parsers.get(parser_id)?;
        let source = FileSource::open(&LocalDisk::new(dir), name, parser.as_ref())?;
        self.config
            .add_source(ENTRY_SOURCE_ID, ENTRY_PRIORITY, Arc::new(source))?;
        info!(path = %file.display(), parser = parser_id, "entry config loaded");
        Ok(())
    }

    /// Build and add every source declared under `config.sources`.
    pub fn load_sources(&self) -> Result<Vec<String>> {
        let ids = self.sources.ids();
        for id in &ids {
            let priority = self.declared_priority(id)?;
            let source = self.sources.get(id)?;
            self.config.add_source(id.as_str(), priority, source)?;
        }
        Ok(ids)
    }

    fn declared_priority(&self, id: &str) -> Result<i32> {
        let priority_path = path::join(&path::join(SOURCES_PATH, id), "priority");
        match self.config.get(&priority_path) {
            None => Ok(0),
            Some(value) => value
                .as_i64()
                .and_then(|priority| i32::try_from(priority).ok())
                .ok_or_else(|| Error::invalid_config(id, "priority")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{JsonParser, YamlParser, disk_factory, parser_factory, source_factory};
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    fn loader(config: &Arc<Config>) -> ConfigLoader {
        let parsers = Arc::new(parser_factory(Arc::clone(config)));
        parsers.store("json", Arc::new(JsonParser));
        parsers.store("yaml", Arc::new(YamlParser));
        let disks = Arc::new(disk_factory(Arc::clone(config)));
        let sources = Arc::new(source_factory(Arc::clone(config), disks, Arc::clone(&parsers)));
        ConfigLoader::new(Arc::clone(config), sources, parsers)
    }

    #[test]
    fn test_entry_paths_prefer_explicit() {
        let paths = EntryPaths {
            explicit: None,
            project: Some(PathBuf::from("/definitely/missing.yaml")),
            user: None,
        };
        assert_eq!(paths.resolve(), None);

        let paths = paths.with_file("/also/missing.json");
        assert_eq!(paths.resolve(), Some(PathBuf::from("/also/missing.json")));
    }

    #[test]
    fn test_entry_paths_first_existing() {
        let temp = TempDir::new().unwrap();
        let user = temp.path().join("config.yaml");
        std::fs::write(&user, "a: 1\n").unwrap();
        let paths = EntryPaths {
            explicit: None,
            project: Some(temp.path().join("absent.yaml")),
            user: Some(user.clone()),
        };
        assert_eq!(paths.resolve(), Some(user));
    }

    #[test]
    fn test_load_entry_then_declared_sources() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("config.yaml");
        std::fs::write(
            &entry,
            format!(
                "config:\n  default_disk_id: fixtures\n  sources:\n    overrides:\n      driver: file\n      priority: 10\n      parser_id: json\n      path: overrides.json\nfilesystem:\n  disks:\n    fixtures:\n      driver: local\n      root: '{}'\napp:\n  name: from-entry\n  port: 80\n",
                temp.path().display()
            ),
        )
        .unwrap();
        std::fs::write(
            temp.path().join("overrides.json"),
            r#"{"app": {"port": 8080}, "config": {"sources": {"late": {"driver": "file", "path": "never.json"}}}}"#,
        )
        .unwrap();

        let config = Arc::new(Config::new());
        let loaded = loader(&config).load(Some(&entry)).unwrap();

        assert_eq!(loaded, vec!["entry".to_string(), "overrides".to_string()]);
        assert_eq!(config.string("app.name").as_deref(), Some("from-entry"));
        assert_eq!(config.int("app.port"), Some(8080));
        assert!(!config.has_source("late"));
    }

    #[test]
    fn test_unsupported_extension() {
        let config = Arc::new(Config::new());
        let err = loader(&config)
            .load_entry(Path::new("settings.toml"))
            .unwrap_err();
        assert!(err.is(ErrorCode::Decode));
    }

    #[test]
    fn test_invalid_priority() {
        let config = Arc::new(Config::new());
        config.set("config.sources.bad.driver", "env").unwrap();
        config.set("config.sources.bad.priority", "high").unwrap();
        let err = loader(&config).load(None).unwrap_err();
        assert!(err.is(ErrorCode::InvalidResourceConfig));
        assert_eq!(err.field.as_deref(), Some("priority"));
    }
}
