//! Decoders turning a byte stream into a [`Bag`].

use super::PARSERS_PATH;
use crate::bag::Bag;
use crate::error::Result;
use crate::factory::ResourceFactory;
use std::io::Read;
use std::sync::Arc;

/// Decode capability used by file-backed sources.
pub trait Parser: Send + Sync {
    fn parse(&self, reader: &mut dyn Read) -> Result<Bag>;
}

/// Factory of parsers configured under `config.parsers`.
pub type ParserFactory = ResourceFactory<dyn Parser>;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, reader: &mut dyn Read) -> Result<Bag> {
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        Bag::from_json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl Parser for YamlParser {
    fn parse(&self, reader: &mut dyn Read) -> Result<Bag> {
        let value: serde_json::Value = serde_yaml::from_reader(reader)?;
        Bag::from_json(value)
    }
}

/// Parser id matching a file extension, if any.
pub fn parser_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "json" => Some("json"),
        "yaml" | "yml" => Some("yaml"),
        _ => None,
    }
}

/// Create the parser factory with the `json` and `yaml` drivers registered.
pub fn parser_factory(config: Arc<super::Config>) -> ParserFactory {
    let factory = ParserFactory::new("parser", PARSERS_PATH, config);
    factory.register("json", |_: &str, _: &Bag| -> Result<Arc<dyn Parser>> {
        Ok(Arc::new(JsonParser))
    });
    factory.register("yaml", |_: &str, _: &Bag| -> Result<Arc<dyn Parser>> {
        Ok(Arc::new(YamlParser))
    });
    factory
}
