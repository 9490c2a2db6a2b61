//! hearth
//!
//! Boots the configuration engine from an entry file and prints what the
//! merged view resolves to.

use anyhow::{Context, Result, bail};
use clap::Parser;
use hearth::cli::{Cli, Command};
use hearth::config::EntryPaths;
use hearth::format::{format_sources, format_value};
use hearth::kernel::Kernel;
use hearth::Value;
use std::fs::OpenOptions;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)
                .with_context(|| format!("opening log file {}", filename))?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut paths = EntryPaths::discover();
    if let Some(config_path) = &cli.config {
        paths = paths.with_file(config_path);
    }
    let entry = paths.resolve();
    debug!(entry = ?entry, "resolved entry config");

    let kernel = Kernel::new();
    kernel
        .boot(entry.as_deref())
        .context("loading configuration")?;
    let config = kernel.config();

    match cli.command {
        Command::Get { path } => {
            let Some(value) = config.get(&path) else {
                bail!("no value at '{}'", path);
            };
            println!("{}", format_value(&value, cli.format)?);
        }
        Command::Dump => {
            let merged = Value::Bag(config.snapshot().as_ref().clone());
            println!("{}", format_value(&merged, cli.format)?);
        }
        Command::Sources => {
            println!("{}", format_sources(&config.sources(), cli.format)?);
        }
    }

    Ok(())
}
