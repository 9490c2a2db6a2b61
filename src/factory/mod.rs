//! Driver-keyed resource factories.
//!
//! Every resource kind (config sources, parsers, disks, log streams, ...) is
//! built the same way: the factory looks up `<path>.<id>` in the merged
//! [`Config`], reads its `driver`, dispatches to the [`Creator`] registered
//! under that driver name and caches the result under `id`.
//!
//! ## Lifecycle per id
//! `unconfigured -> constructing -> cached | failed`
//!
//! - At most one instance is ever constructed per id; later `get` calls hand
//!   out the same `Arc`.
//! - Failures are not cached. The next `get` retries construction, so a
//!   resource whose dependency was missing at boot can still come up later.
//! - [`ResourceFactory::store`] seeds or overrides the cache directly, which
//!   bypasses configuration entirely.
//!
//! Creators must not call `get` on the factory that is invoking them.

mod fields;

pub use fields::ResourceConfig;

use crate::bag::{Bag, path};
use crate::config::Config;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

/// Construction strategy for one driver.
pub trait Creator<T: ?Sized>: Send + Sync {
    /// Build the resource `id` from its configuration sub-tree.
    fn create(&self, id: &str, config: &Bag) -> Result<Arc<T>>;
}

impl<T, F> Creator<T> for F
where
    T: ?Sized,
    F: Fn(&str, &Bag) -> Result<Arc<T>> + Send + Sync,
{
    fn create(&self, id: &str, config: &Bag) -> Result<Arc<T>> {
        self(id, config)
    }
}

/// Registry of drivers plus a cache of constructed resources.
pub struct ResourceFactory<T: ?Sized> {
    /// Resource kind, used in errors and logs.
    kind: String,
    /// Config path holding one entry per resource id.
    path: String,
    config: Arc<Config>,
    creators: RwLock<HashMap<String, Arc<dyn Creator<T>>>>,
    instances: RwLock<HashMap<String, Arc<T>>>,
    /// Serializes construction so each id is built once.
    building: Mutex<()>,
}

impl<T: ?Sized + Send + Sync + 'static> ResourceFactory<T> {
    pub fn new(kind: impl Into<String>, path: impl Into<String>, config: Arc<Config>) -> Self {
        Self {
            kind: kind.into(),
            path: path.into(),
            config,
            creators: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            building: Mutex::new(()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Register (or replace) the creator for a driver name.
    pub fn register(&self, driver: impl Into<String>, creator: impl Creator<T> + 'static) {
        let driver = driver.into();
        debug!(kind = %self.kind, driver = %driver, "driver registered");
        self.creators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(driver, Arc::new(creator));
    }

    /// Registered driver names, sorted.
    pub fn drivers(&self) -> Vec<String> {
        let creators = self.creators.read().unwrap_or_else(PoisonError::into_inner);
        let mut drivers: Vec<String> = creators.keys().cloned().collect();
        drivers.sort();
        drivers
    }

    /// Ids declared under the factory path, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.config
            .bag(&self.path)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, value)| value.is_bag())
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `id` is already cached.
    pub fn has(&self, id: &str) -> bool {
        self.cached(id).is_some()
    }

    /// Return the cached resource or construct it from configuration.
    pub fn get(&self, id: &str) -> Result<Arc<T>> {
        if let Some(instance) = self.cached(id) {
            return Ok(instance);
        }

        let _building = self.building.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished while we waited
        if let Some(instance) = self.cached(id) {
            return Ok(instance);
        }

        let instance = self.create(id).inspect_err(|err| {
            warn!(kind = %self.kind, id, error = %err, "resource construction failed");
        })?;
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::clone(&instance));
        debug!(kind = %self.kind, id, "resource created");
        Ok(instance)
    }

    /// Seed or override the cache entry for `id`.
    pub fn store(&self, id: impl Into<String>, instance: Arc<T>) {
        let id = id.into();
        debug!(kind = %self.kind, id = %id, "resource stored");
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, instance);
    }

    /// Build every configured id. The first failure aborts.
    pub fn load_all(&self) -> Result<Vec<(String, Arc<T>)>> {
        self.ids()
            .into_iter()
            .map(|id| self.get(&id).map(|instance| (id, instance)))
            .collect()
    }

    fn cached(&self, id: &str) -> Option<Arc<T>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn create(&self, id: &str) -> Result<Arc<T>> {
        let entry_path = path::join(&self.path, id);
        let config = self
            .config
            .bag(&entry_path)
            .ok_or_else(|| Error::unknown_resource(&self.kind, id))?;

        let driver = ResourceConfig::new(id, &config).require_str("driver")?;
        let creator = self
            .creators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&driver)
            .cloned()
            .ok_or_else(|| {
                Error::unknown_resource(&format!("{} driver", self.kind), &driver)
                    .with_context("resource", id)
            })?;

        creator.create(id, &config)
    }
}
