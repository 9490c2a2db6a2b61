//! Output formatting for the inspection CLI.

use crate::bag::Value;
use crate::config::SourceInfo;
use crate::error::Result;
use clap::ValueEnum;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            _ => None,
        }
    }
}

/// Render a value. Strings print bare so scripts can consume them.
pub fn format_value(value: &Value, format: OutputFormat) -> Result<String> {
    if let Value::String(s) = value {
        return Ok(s.clone());
    }
    let json = value.to_json();
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&json)?,
        OutputFormat::Yaml => serde_yaml::to_string(&json)?,
    };
    Ok(rendered.trim_end().to_string())
}

/// Render registered sources, one per line, in merge order.
pub fn format_sources(sources: &[SourceInfo], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = sources
                .iter()
                .map(|s| serde_json::json!({ "id": s.id, "priority": s.priority }))
                .collect();
            Ok(serde_json::to_string_pretty(&rows)?)
        }
        OutputFormat::Yaml => {
            let mut out = String::new();
            for source in sources {
                out.push_str(&format!("- {} (priority {})\n", source.id, source.priority));
            }
            Ok(out.trim_end().to_string())
        }
    }
}
