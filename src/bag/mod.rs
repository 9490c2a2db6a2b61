//! Path-addressable hierarchical value container.
//!
//! A [`Bag`] maps string keys to [`Value`]s, where a value is a scalar, a list
//! or a nested bag. Nested entries are addressed with dot-separated paths
//! such as `"server.http.port"`.
//!
//! ## Semantics
//! - Reads never fail: an absent path, a malformed path, or a path that runs
//!   through a non-bag value yields `None`.
//! - Writes create intermediate bags and replace any scalar standing in the
//!   way with a fresh bag.
//! - [`Bag::merge`] folds another bag in without touching either input.
//! - Equality is deep and ignores key order.

mod merge;
pub mod path;
mod value;

pub use merge::{merge_all, merge_into};
pub use value::Value;

use crate::error::{Error, Result};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Hierarchical mapping from keys to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Bag {
    entries: BTreeMap<String, Value>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from a JSON object. `null` yields an empty bag.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match Value::from(value) {
            Value::Bag(bag) => Ok(bag),
            Value::Null => Ok(Bag::new()),
            other => Err(Error::decode(format!(
                "expected a mapping at the document root, found {}",
                other.kind()
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Insert a top-level entry without path interpretation.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    fn entry_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Resolve a dot-separated path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = path::segments(path)?;
        let (last, parents) = segments.split_last()?;
        let mut node = self;
        for segment in parents {
            node = node.entries.get(*segment)?.as_bag()?;
        }
        node.entries.get(*last)
    }

    /// Resolve a path, falling back to `default` on any resolution failure.
    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get(path).cloned().unwrap_or_else(|| default.into())
    }

    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Write a value at a dot-separated path.
    ///
    /// Intermediate bags are created as needed; a non-bag value met on the way
    /// is replaced by a new bag. Fails only for malformed paths.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let segments = path::segments(path).ok_or_else(|| Error::invalid_path(path))?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(Error::invalid_path(path));
        };

        let mut node = self;
        for segment in parents {
            let entry = node
                .entries
                .entry((*segment).to_string())
                .or_insert(Value::Null);
            if !entry.is_bag() {
                *entry = Value::Bag(Bag::new());
            }
            node = match entry {
                Value::Bag(bag) => bag,
                _ => return Err(Error::invalid_path(path)),
            };
        }
        node.entries.insert((*last).to_string(), value.into());
        Ok(())
    }

    /// Remove and return the value at a path.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let segments = path::segments(path)?;
        let (last, parents) = segments.split_last()?;
        let mut node = self;
        for segment in parents {
            node = node.entries.get_mut(*segment)?.as_bag_mut()?;
        }
        node.entries.remove(*last)
    }

    /// Return a new bag with `other` folded over `self`.
    pub fn merge(&self, other: &Bag) -> Bag {
        let mut merged = self.clone();
        merge_into(&mut merged, other);
        merged
    }

    /// Fold `other` into `self` in place.
    pub fn merge_from(&mut self, other: &Bag) {
        merge_into(self, other);
    }

    // Typed accessors

    pub fn string(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    pub fn int(&self, path: &str) -> Option<i64> {
        self.get(path)?.as_i64()
    }

    pub fn float(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    pub fn bool(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    pub fn list(&self, path: &str) -> Option<&[Value]> {
        self.get(path)?.as_list()
    }

    pub fn bag(&self, path: &str) -> Option<&Bag> {
        self.get(path)?.as_bag()
    }

    /// Bind the whole bag onto a typed structure.
    ///
    /// Fields without a matching key keep their `#[serde(default)]` value.
    pub fn populate<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// Bind the value at `path` onto a typed structure. A missing path binds
    /// an empty bag, so a target with defaults comes back fully defaulted.
    pub fn populate_at<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let json = match self.get(path) {
            Some(value) => value.to_json(),
            None => serde_json::Value::Object(serde_json::Map::new()),
        };
        serde_json::from_value(json).map_err(|err| Error::from(err).with_context("path", path))
    }
}

impl FromIterator<(String, Value)> for Bag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Bag {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'de> Deserialize<'de> for Bag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bag(bag) => Ok(bag),
            Value::Null => Ok(Bag::new()),
            other => Err(D::Error::custom(format!(
                "expected a mapping, found {}",
                other.kind()
            ))),
        }
    }
}
