//! Prioritized configuration aggregation.
//!
//! A [`Config`] holds any number of named [`Source`]s and exposes one merged
//! [`Bag`] over all of them.
//!
//! ## Merge Strategy
//! - Sources are sorted ascending by priority and folded left to right, so
//!   the highest priority wins every conflict.
//! - Equal priorities keep registration order: the later source wins.
//! - Runtime overrides written with [`Config::set`] are folded last.
//! - Bags merge field by field; scalars and lists are replaced.
//!
//! The merged view is recomputed synchronously by every call that adds,
//! removes or re-prioritizes a source, and readers load it without locking.
//!
//! ## Observers
//! Every recomputation queues an `(old, new)` pair while the registry lock is
//! held, so the queue follows apply order. One thread at a time drains it, so
//! observers see changes in that order even under concurrent writers. A write
//! that finds another thread draining leaves its pair for that thread and
//! returns; a write made from inside an observer is delivered after the
//! current observer returns.
//!
//! ## Well-known paths
//! - `config.sources.<id>` - sources built by [`ConfigLoader`]
//! - `config.parsers.<id>` - parsers
//! - `config.default_parser_id`, `config.default_disk_id` - file source fallbacks
//! - `filesystem.disks.<id>` - disks

mod disk;
mod env;
mod file;
mod loader;
mod parser;
mod source;

pub use disk::{Disk, DiskFactory, LocalDisk, disk_factory};
pub use env::{EnvSource, create_env_source, parse_dotenv};
pub use file::{FileSource, FileSourceCreator};
pub use loader::{ConfigLoader, ENTRY_PRIORITY, ENTRY_SOURCE_ID, EntryPaths};
pub use parser::{JsonParser, Parser, ParserFactory, YamlParser, parser_factory, parser_for_extension};
pub use source::{MemorySource, Source};

use crate::bag::{Bag, Value, merge_all, path};
use crate::error::{Error, Result};
use crate::factory::ResourceFactory;
use crate::pubsub::PubSub;
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::{debug, info, warn};

pub const SOURCES_PATH: &str = "config.sources";
pub const PARSERS_PATH: &str = "config.parsers";
pub const DEFAULT_PARSER_ID_PATH: &str = "config.default_parser_id";
pub const DEFAULT_DISK_ID_PATH: &str = "config.default_disk_id";
pub const DISKS_PATH: &str = "filesystem.disks";

/// Factory of sources configured under `config.sources`.
pub type SourceFactory = ResourceFactory<dyn Source>;

/// Create the source factory with the `env` and `file` drivers registered.
pub fn source_factory(
    config: Arc<Config>,
    disks: Arc<DiskFactory>,
    parsers: Arc<ParserFactory>,
) -> SourceFactory {
    let factory = SourceFactory::new("config source", SOURCES_PATH, Arc::clone(&config));
    factory.register("env", create_env_source);
    factory.register("file", FileSourceCreator::new(config, disks, parsers));
    factory
}

/// Registration summary of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub id: String,
    pub priority: i32,
}

/// A value change at an observed path.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    pub path: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

struct SourceEntry {
    id: String,
    priority: i32,
    source: Arc<dyn Source>,
}

#[derive(Default)]
struct Registry {
    /// Registration order; the merge sorts a view of this by priority.
    sources: Vec<SourceEntry>,
    overrides: Bag,
}

/// Merged configuration over prioritized sources.
pub struct Config {
    registry: Mutex<Registry>,
    merged: ArcSwap<Bag>,
    observers: PubSub<String, String, ConfigChange>,
    /// Recomputations not yet delivered to observers, in apply order.
    pending: Mutex<VecDeque<(Arc<Bag>, Arc<Bag>)>>,
    /// Held by the thread draining `pending`.
    dispatching: Mutex<()>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            merged: ArcSwap::from_pointee(Bag::new()),
            observers: PubSub::new(),
            pending: Mutex::new(VecDeque::new()),
            dispatching: Mutex::new(()),
        }
    }

    // Source registry

    /// Register a source and recompute the merged view.
    pub fn add_source(
        &self,
        id: impl Into<String>,
        priority: i32,
        source: Arc<dyn Source>,
    ) -> Result<()> {
        let id = id.into();
        {
            let mut registry = self.lock_registry();
            if registry.sources.iter().any(|entry| entry.id == id) {
                return Err(Error::duplicate_resource("config source", &id));
            }
            registry.sources.push(SourceEntry {
                id: id.clone(),
                priority,
                source,
            });
            self.rebuild(&registry);
        }
        info!(source = %id, priority, "config source added");
        self.dispatch();
        Ok(())
    }

    /// Unregister a source. Returns whether it was registered.
    pub fn remove_source(&self, id: &str) -> bool {
        {
            let mut registry = self.lock_registry();
            let before = registry.sources.len();
            registry.sources.retain(|entry| entry.id != id);
            if registry.sources.len() == before {
                return false;
            }
            self.rebuild(&registry);
        }
        info!(source = %id, "config source removed");
        self.dispatch();
        true
    }

    /// Change a source's priority and recompute the merged view.
    pub fn set_priority(&self, id: &str, priority: i32) -> Result<()> {
        {
            let mut registry = self.lock_registry();
            let entry = registry
                .sources
                .iter_mut()
                .find(|entry| entry.id == id)
                .ok_or_else(|| Error::unknown_resource("config source", id))?;
            entry.priority = priority;
            self.rebuild(&registry);
        }
        debug!(source = %id, priority, "config source re-prioritized");
        self.dispatch();
        Ok(())
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.lock_registry()
            .sources
            .iter()
            .any(|entry| entry.id == id)
    }

    pub fn source(&self, id: &str) -> Option<Arc<dyn Source>> {
        self.lock_registry()
            .sources
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| Arc::clone(&entry.source))
    }

    /// Registered sources in merge order (lowest precedence first).
    pub fn sources(&self) -> Vec<SourceInfo> {
        let registry = self.lock_registry();
        Self::merge_order(&registry)
            .into_iter()
            .map(|entry| SourceInfo {
                id: entry.id.clone(),
                priority: entry.priority,
            })
            .collect()
    }

    // Reads

    /// The current merged view.
    pub fn snapshot(&self) -> Arc<Bag> {
        self.merged.load_full()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.merged.load().get(path).cloned()
    }

    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.merged.load().get_or(path, default)
    }

    pub fn has(&self, path: &str) -> bool {
        self.merged.load().has(path)
    }

    pub fn string(&self, path: &str) -> Option<String> {
        self.merged.load().string(path).map(str::to_string)
    }

    pub fn int(&self, path: &str) -> Option<i64> {
        self.merged.load().int(path)
    }

    pub fn float(&self, path: &str) -> Option<f64> {
        self.merged.load().float(path)
    }

    pub fn bool(&self, path: &str) -> Option<bool> {
        self.merged.load().bool(path)
    }

    pub fn list(&self, path: &str) -> Option<Vec<Value>> {
        self.merged.load().list(path).map(<[Value]>::to_vec)
    }

    /// Copy of the sub-tree at `path`.
    pub fn bag(&self, path: &str) -> Option<Bag> {
        self.merged.load().bag(path).cloned()
    }

    /// Bind the sub-tree at `path` onto a typed structure.
    pub fn populate<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.merged.load().populate_at(path)
    }

    // Writes

    /// Write a runtime override that outranks every source.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        {
            let mut registry = self.lock_registry();
            registry.overrides.set(path, value)?;
            self.rebuild(&registry);
        }
        self.dispatch();
        Ok(())
    }

    // Observers

    /// Call `handler` whenever the value at `path` changes.
    ///
    /// Changes arrive in the order they were applied, after the new view is
    /// visible, on whichever writer thread is draining the notification
    /// queue. Errors are logged. Handlers may call [`Config::set`] and the
    /// other writers; they must not call `observe`/`unobserve` themselves.
    pub fn observe<F>(&self, id: impl Into<String>, path: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&ConfigChange) -> Result<()> + Send + Sync + 'static,
    {
        let path = path.into();
        if path::segments(&path).is_none() {
            return Err(Error::invalid_path(&path));
        }
        self.observers
            .subscribe(id.into(), path, move |_, changes: &[ConfigChange]| {
                changes.iter().try_for_each(&handler)
            })
    }

    pub fn unobserve(&self, id: &str, path: &str) -> Result<()> {
        self.observers.unsubscribe(&id.to_string(), &path.to_string())
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn merge_order(registry: &Registry) -> Vec<&SourceEntry> {
        let mut ordered: Vec<&SourceEntry> = registry.sources.iter().collect();
        // Stable: equal priorities keep registration order
        ordered.sort_by_key(|entry| entry.priority);
        ordered
    }

    /// Recompute and publish the merged view, queueing the change for
    /// observers. The caller holds the registry lock.
    fn rebuild(&self, registry: &Registry) {
        let ordered = Self::merge_order(registry);
        let mut merged = merge_all(ordered.iter().map(|entry| entry.source.bag()));
        merged.merge_from(&registry.overrides);
        let merged = Arc::new(merged);
        let old = self.merged.swap(Arc::clone(&merged));
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((old, merged));
    }

    /// Deliver queued changes unless another call is already doing so.
    fn dispatch(&self) {
        loop {
            let guard = match self.dispatching.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            while let Some((old, new)) = self.next_pending() {
                self.notify(&old, &new);
            }
            drop(guard);
            // A writer may have queued after the drain but before the release
            if self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty()
            {
                return;
            }
        }
    }

    fn next_pending(&self) -> Option<(Arc<Bag>, Arc<Bag>)> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn notify(&self, old: &Bag, new: &Bag) {
        for path in self.observers.channels() {
            let before = old.get(&path);
            let after = new.get(&path);
            if before == after {
                continue;
            }
            let change = ConfigChange {
                path: path.clone(),
                old: before.cloned(),
                new: after.cloned(),
            };
            if let Err(err) = self.observers.publish(&path, &[change]) {
                warn!(path = %path, error = %err, "config observer failed");
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn memory(value: serde_json::Value) -> Arc<dyn Source> {
        Arc::new(MemorySource::new(Bag::from_json(value).unwrap()))
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_order() {
        let forward = Config::new();
        forward.add_source("a", 1, memory(json!({"x": 1}))).unwrap();
        forward.add_source("b", 2, memory(json!({"x": 2}))).unwrap();

        let reverse = Config::new();
        reverse.add_source("b", 2, memory(json!({"x": 2}))).unwrap();
        reverse.add_source("a", 1, memory(json!({"x": 1}))).unwrap();

        assert_eq!(forward.int("x"), Some(2));
        assert_eq!(reverse.int("x"), Some(2));
    }

    #[test]
    fn test_equal_priority_later_wins() {
        let config = Config::new();
        config.add_source("first", 5, memory(json!({"x": "first"}))).unwrap();
        config.add_source("second", 5, memory(json!({"x": "second"}))).unwrap();
        assert_eq!(config.string("x").as_deref(), Some("second"));
    }

    #[test]
    fn test_remove_and_reprioritize_recompute() {
        let config = Config::new();
        config.add_source("low", 1, memory(json!({"x": 1, "only_low": true}))).unwrap();
        config.add_source("high", 2, memory(json!({"x": 2}))).unwrap();

        config.set_priority("low", 3).unwrap();
        assert_eq!(config.int("x"), Some(1));
        assert_eq!(
            config.sources(),
            vec![
                SourceInfo { id: "high".into(), priority: 2 },
                SourceInfo { id: "low".into(), priority: 3 },
            ]
        );

        assert!(config.remove_source("low"));
        assert!(!config.remove_source("low"));
        assert_eq!(config.int("x"), Some(2));
        assert!(!config.has("only_low"));
    }

    #[test]
    fn test_duplicate_and_unknown_source_ids() {
        let config = Config::new();
        config.add_source("a", 0, memory(json!({}))).unwrap();
        let err = config.add_source("a", 1, memory(json!({}))).unwrap_err();
        assert!(err.is(ErrorCode::DuplicateResource));

        let err = config.set_priority("missing", 1).unwrap_err();
        assert!(err.is(ErrorCode::UnknownResource));
    }

    #[test]
    fn test_set_override_survives_recompute() {
        let config = Config::new();
        config.add_source("base", 100, memory(json!({"db": {"host": "a", "port": 1}}))).unwrap();
        config.set("db.host", "override").unwrap();
        config.add_source("later", 200, memory(json!({"db": {"host": "b"}}))).unwrap();

        assert_eq!(config.string("db.host").as_deref(), Some("override"));
        assert_eq!(config.int("db.port"), Some(1));
        assert!(config.set("", 1).is_err());
    }

    #[test]
    fn test_bag_is_a_copy() {
        let config = Config::new();
        config.set("a.b", 1).unwrap();
        let mut scoped = config.bag("a").unwrap();
        scoped.set("b", 2).unwrap();
        assert_eq!(config.int("a.b"), Some(1));
    }

    #[test]
    fn test_observers_see_changes_only() {
        let config = Config::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        config
            .observe("watcher", "db.host", move |change: &ConfigChange| {
                sink.lock().unwrap().push(change.clone());
                Ok(())
            })
            .unwrap();

        config.set("db.port", 1).unwrap();
        config.set("db.host", "a").unwrap();
        config.set("db.host", "a").unwrap();
        config.add_source("src", 0, memory(json!({"db": {"host": "ignored"}}))).unwrap();
        config.set("db", "flat").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ConfigChange {
                    path: "db.host".into(),
                    old: None,
                    new: Some(Value::from("a")),
                },
                ConfigChange {
                    path: "db.host".into(),
                    old: Some(Value::from("a")),
                    new: None,
                },
            ]
        );
    }

    #[test]
    fn test_observer_errors_do_not_propagate() {
        let config = Config::new();
        config
            .observe("bad", "x", |_: &ConfigChange| Err(Error::internal("observer broke")))
            .unwrap();
        assert!(config.set("x", 1).is_ok());
        assert!(config.unobserve("bad", "x").is_ok());
        assert!(config.unobserve("bad", "x").is_err());
        assert!(config.observe("bad", "a..b", |_: &ConfigChange| Ok(())).is_err());
    }

    #[test]
    fn test_observer_can_write_while_an_observe_waits() {
        let config = Arc::new(Config::new());
        let writer = Arc::clone(&config);
        config
            .observe("derive", "a", move |change: &ConfigChange| {
                thread::sleep(Duration::from_millis(100));
                writer.set("derived", change.new.clone().unwrap_or(Value::Null))
            })
            .unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let setter = {
            let config = Arc::clone(&config);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                let _ = done_tx.send(config.set("a", 1));
            })
        };
        let observer = {
            let config = Arc::clone(&config);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                let _ = done_tx.send(config.observe("late", "x", |_: &ConfigChange| Ok(())));
            })
        };

        for _ in 0..2 {
            let result = done_rx
                .recv_timeout(Duration::from_secs(3))
                .expect("config hung while an observer wrote to it");
            assert!(result.is_ok());
        }
        setter.join().unwrap();
        observer.join().unwrap();
        assert_eq!(config.int("derived"), Some(1));
    }

    #[test]
    fn test_concurrent_writers_deliver_changes_in_apply_order() {
        let config = Arc::new(Config::new());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        config
            .observe("log", "counter", move |change: &ConfigChange| {
                sink.lock().unwrap().push(change.clone());
                Ok(())
            })
            .unwrap();

        let writers: Vec<_> = (0..2i64)
            .map(|writer| {
                let config = Arc::clone(&config);
                thread::spawn(move || {
                    for n in 0..200i64 {
                        config.set("counter", writer * 1000 + n).unwrap();
                    }
                })
            })
            .collect();
        for handle in writers {
            handle.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 400);
        assert_eq!(seen[0].old, None);
        for pair in seen.windows(2) {
            assert_eq!(pair[1].old, pair[0].new);
        }
        assert_eq!(seen.last().unwrap().new, config.get("counter"));
    }
}
