//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use smodel_core::SmodelConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show where the configuration lives and what it contains
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "cache.redis_url")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path.map(PathBuf::from).unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args, path),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("smodel")
        .join("config.json")
}

/// Load the config at `path`, or the defaults when there is no file yet.
pub fn load_config(path: &Path) -> anyhow::Result<SmodelConfig> {
    if path.exists() {
        Ok(SmodelConfig::from_file(path)?)
    } else {
        Ok(SmodelConfig::default())
    }
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    let status = if path.exists() {
        style("exists").green()
    } else {
        style("not created, showing defaults").yellow()
    };
    println!("{} {} ({})", style("Config file:").bold(), path.display(), status);

    let config = load_config(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(args: InitArgs, path: PathBuf) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or(path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    SmodelConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

/// Split a dotted key into its section path and final field name.
fn split_key(key: &str) -> anyhow::Result<(Vec<&str>, &str)> {
    let mut parts: Vec<&str> = key.split('.').collect();
    match parts.pop() {
        Some(last) if !last.is_empty() => Ok((parts, last)),
        _ => anyhow::bail!("Empty configuration key"),
    }
}

fn section<'a>(
    json: &'a mut serde_json::Value,
    sections: &[&str],
    key: &str,
) -> anyhow::Result<&'a mut serde_json::Map<String, serde_json::Value>> {
    let mut current = json;
    for name in sections {
        current = current
            .get_mut(*name)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
    }
    current
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
}

fn get_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let mut json = serde_json::to_value(load_config(path)?)?;
    let (sections, field) = split_key(key)?;

    let object = section(&mut json, &sections, key)?;
    let value = object
        .get(field)
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let mut json = serde_json::to_value(load_config(path)?)?;
    let (sections, field) = split_key(key)?;

    // Bare words that are not valid JSON are taken as strings.
    let parsed_value: serde_json::Value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    let object = section(&mut json, &sections, key)?;
    if !object.contains_key(field) {
        anyhow::bail!("Configuration key not found: {}", key);
    }
    object.insert(field.to_string(), parsed_value.clone());

    // Round-trip through the typed config so bad values are rejected.
    let config: SmodelConfig = serde_json::from_value(json)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&parsed_value)?
    );

    Ok(())
}
