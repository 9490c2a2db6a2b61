//! Environment-backed configuration source.
//!
//! Reads optional dotenv files plus the live process environment. Values are
//! opt-in: only keys listed in the `mappings` table are copied, each to its
//! mapped destination path. Without a table nothing is copied.
//!
//! Process variables take precedence over dotenv files, and later files over
//! earlier ones.

use super::source::Source;
use crate::bag::Bag;
use crate::error::{Error, Result};
use crate::factory::ResourceConfig;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Source holding mapped environment values as strings.
#[derive(Debug, Clone)]
pub struct EnvSource {
    bag: Bag,
}

impl EnvSource {
    /// Load `files`, overlay the process environment and copy mapped keys.
    pub fn load<P: AsRef<Path>>(files: &[P], mappings: &BTreeMap<String, String>) -> Result<Self> {
        let mut vars = Vec::new();
        for file in files {
            let file = file.as_ref();
            let content = std::fs::read_to_string(file)
                .map_err(|err| Error::from(err).with_context("path", file.display()))?;
            let entries = parse_dotenv(&content)
                .map_err(|err| err.with_context("path", file.display()))?;
            debug!(path = %file.display(), entries = entries.len(), "dotenv file read");
            vars.extend(entries);
        }
        vars.extend(std::env::vars());
        Self::from_vars(vars, mappings)
    }

    /// Build from explicit variables; later duplicates win.
    pub fn from_vars<I>(vars: I, mappings: &BTreeMap<String, String>) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut bag = Bag::new();
        for (key, path) in mappings {
            if let Some(value) = vars.get(key) {
                bag.set(path, value.as_str())?;
            }
        }
        Ok(Self { bag })
    }
}

impl Source for EnvSource {
    fn bag(&self) -> &Bag {
        &self.bag
    }
}

/// Creator for the `env` source driver.
///
/// Fields: `files` (optional list of dotenv paths), `mappings` (optional
/// table of variable name to destination path).
pub fn create_env_source(id: &str, cfg: &Bag) -> Result<Arc<dyn Source>> {
    let fields = ResourceConfig::new(id, cfg);
    let files = fields.str_list("files")?;
    let mappings = fields
        .bag_or_empty("mappings")?
        .iter()
        .map(|(key, value)| {
            value
                .as_str()
                .map(|path| (key.clone(), path.to_string()))
                .ok_or_else(|| Error::invalid_config(id, "mappings").with_context("key", key))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    Ok(Arc::new(EnvSource::load(&files, &mappings)?))
}

/// Parse dotenv content into ordered key/value pairs.
///
/// Supports blank lines, `#` comments, an optional `export ` prefix, single
/// and double quoted values (with `\n`, `\"` and `\\` escapes in double
/// quotes) and trailing ` #` comments on unquoted values.
pub fn parse_dotenv(content: &str) -> Result<Vec<(String, String)>> {
    let mut entries = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::decode(format!("dotenv line {} has no '='", index + 1))
                .with_context("line", index + 1));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::decode(format!("dotenv line {} has an empty key", index + 1))
                .with_context("line", index + 1));
        }
        entries.push((key.to_string(), unquote(value.trim())));
    }
    Ok(entries)
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        return out;
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn mappings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_only_mapped_keys_are_copied() {
        let source = EnvSource::from_vars(
            vars(&[("DB_HOST", "db.local"), ("SECRET", "hunter2")]),
            &mappings(&[("DB_HOST", "database.host"), ("DB_PORT", "database.port")]),
        )
        .unwrap();
        assert_eq!(source.bag().string("database.host"), Some("db.local"));
        assert!(!source.bag().has("database.port"));
        assert!(!source.bag().has("SECRET"));
    }

    #[test]
    fn test_no_mappings_copies_nothing() {
        let source =
            EnvSource::from_vars(vars(&[("HOME", "/root")]), &BTreeMap::new()).unwrap();
        assert!(source.bag().is_empty());
    }

    #[test]
    fn test_later_values_win() {
        let source = EnvSource::from_vars(
            vars(&[("LEVEL", "debug"), ("LEVEL", "error")]),
            &mappings(&[("LEVEL", "log.default_level")]),
        )
        .unwrap();
        assert_eq!(source.bag().string("log.default_level"), Some("error"));
    }

    #[test]
    fn test_parse_dotenv() {
        let content = r#"
# comment
export APP_NAME=hearth
QUOTED="line\none"
SINGLE='raw \n'
TRAILING=value # note
EMPTY=
"#;
        let entries = parse_dotenv(content).unwrap();
        assert_eq!(
            entries,
            vars(&[
                ("APP_NAME", "hearth"),
                ("QUOTED", "line\none"),
                ("SINGLE", "raw \\n"),
                ("TRAILING", "value"),
                ("EMPTY", ""),
            ])
        );
    }

    #[test]
    fn test_parse_dotenv_rejects_garbage() {
        let err = parse_dotenv("VALID=1\nnot a pair\n").unwrap_err();
        assert!(err.is(ErrorCode::Decode));
        assert_eq!(err.context.get("line").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_load_reads_dotenv_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join(".env");
        std::fs::write(&file, "HEARTH_TEST_ONLY_IN_FILE=from-file\n").unwrap();

        let source = EnvSource::load(
            &[file],
            &mappings(&[("HEARTH_TEST_ONLY_IN_FILE", "app.origin")]),
        )
        .unwrap();
        assert_eq!(source.bag().string("app.origin"), Some("from-file"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = EnvSource::load(&["/definitely/not/here.env"], &BTreeMap::new()).unwrap_err();
        assert!(err.is(ErrorCode::Io));
    }

    #[test]
    fn test_creator_rejects_non_string_mapping() {
        let cfg = Bag::from_json(serde_json::json!({"driver": "env", "mappings": {"A": 1}})).unwrap();
        let err = create_env_source("env", &cfg).err().unwrap();
        assert!(err.is(ErrorCode::InvalidResourceConfig));
        assert_eq!(err.field.as_deref(), Some("mappings"));
    }
}
