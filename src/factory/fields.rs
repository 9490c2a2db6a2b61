//! Required-field checks and default fallbacks for creator configuration.

use crate::bag::{Bag, Value};
use crate::config::Config;
use crate::error::{Error, Result};

/// View over one resource's configuration sub-tree.
///
/// Only a handful of fields are mandatory for any resource kind; everything
/// else falls back to a literal default. Mandatory fields may also fall back
/// to a process-wide default read from the merged config before they are
/// reported as missing.
pub struct ResourceConfig<'a> {
    id: &'a str,
    bag: &'a Bag,
    defaults: Option<&'a Config>,
}

impl<'a> ResourceConfig<'a> {
    pub fn new(id: &'a str, bag: &'a Bag) -> Self {
        Self {
            id,
            bag,
            defaults: None,
        }
    }

    /// Consult `config` for `*_or` default paths.
    pub fn with_defaults(mut self, config: &'a Config) -> Self {
        self.defaults = Some(config);
        self
    }

    pub fn id(&self) -> &str {
        self.id
    }

    pub fn bag(&self) -> &Bag {
        self.bag
    }

    /// A non-empty string field.
    pub fn require_str(&self, field: &str) -> Result<String> {
        match self.bag.string(field) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(Error::invalid_config(self.id, field)),
        }
    }

    /// A non-empty string field, else the non-empty string at `default_path`.
    pub fn require_str_or(&self, field: &str, default_path: &str) -> Result<String> {
        if let Some(value) = self.bag.string(field).filter(|v| !v.is_empty()) {
            return Ok(value.to_string());
        }
        self.defaults
            .and_then(|config| config.string(default_path))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::invalid_config(self.id, field).with_context("default_path", default_path)
            })
    }

    /// A non-zero integer field.
    pub fn require_int(&self, field: &str) -> Result<i64> {
        match self.bag.int(field) {
            Some(value) if value != 0 => Ok(value),
            _ => Err(Error::invalid_config(self.id, field)),
        }
    }

    pub fn str_or(&self, field: &str, default: &str) -> String {
        self.bag.string(field).unwrap_or(default).to_string()
    }

    pub fn int_or(&self, field: &str, default: i64) -> i64 {
        self.bag.int(field).unwrap_or(default)
    }

    pub fn bool_or(&self, field: &str, default: bool) -> bool {
        self.bag.bool(field).unwrap_or(default)
    }

    /// Optional list of strings; absent means empty.
    pub fn str_list(&self, field: &str) -> Result<Vec<String>> {
        let Some(value) = self.bag.get(field) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_list()
            .ok_or_else(|| Error::invalid_config(self.id, field))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::invalid_config(self.id, field))
            })
            .collect()
    }

    /// Optional nested bag; absent means empty.
    pub fn bag_or_empty(&self, field: &str) -> Result<Bag> {
        match self.bag.get(field) {
            None | Some(Value::Null) => Ok(Bag::new()),
            Some(Value::Bag(bag)) => Ok(bag.clone()),
            Some(_) => Err(Error::invalid_config(self.id, field)),
        }
    }
}
