//! Extract command - run an ad-hoc extraction from mappings.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use tracing::{debug, info, warn};

use smodel_core::config::CacheBackend;
use smodel_core::{
    Document, DocumentSource, ExtractionModel, Query, QueryKind, Schema, SmodelConfig,
};

use super::config::{default_config_path, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// URL to fetch
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    url: Option<String>,

    /// Read the document from a local file instead of fetching it
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// JSON mapping file (repeatable, later files win)
    #[arg(short, long = "mappings")]
    mappings: Vec<PathBuf>,

    /// Inline mapping: NAME=QUERY, NAME=css:QUERY or NAME=xpath:QUERY (repeatable)
    #[arg(long = "map", value_parser = parse_inline_mapping)]
    map: Vec<(String, Query)>,

    /// Consult and fill the configured document cache
    #[arg(long)]
    cache: bool,

    /// Cache expiry in seconds
    #[arg(long)]
    expire: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only output these fields (repeatable)
    #[arg(long)]
    only: Vec<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config_path = config_path.map(PathBuf::from).unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;

    let mut model = ExtractionModel::new(Schema::default());
    for path in &args.mappings {
        debug!("Loading mappings from {}", path.display());
        model.load_mappings_from_path(path)?;
    }
    model.mappings_mut().extend(args.map.iter().cloned());

    if model.mappings().is_empty() {
        anyhow::bail!("No mappings given. Use --mappings FILE or --map NAME=QUERY.");
    }

    if let Some(file) = &args.file {
        if !file.exists() {
            anyhow::bail!("Input file not found: {}", file.display());
        }
        info!("Extracting from file: {}", file.display());
        let document = Document::from_bytes(&fs::read(file)?);
        model.parse_document(&document)?;
    } else if let Some(url) = &args.url {
        info!("Extracting from URL: {}", url);
        let source = build_source(&config, &args)?;
        model = model.with_url(url.as_str()).with_source(source);
        model.parse()?;
    }

    let mut record = serde_json::Map::new();
    let only: Vec<&str> = args.only.iter().map(String::as_str).collect();
    let identifiers = if only.is_empty() { None } else { Some(only.as_slice()) };
    model.populate(&mut record, identifiers);

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        print!("{}", output);
    }

    debug!("Total extraction time: {:?}", start.elapsed());

    Ok(())
}

fn build_source(config: &SmodelConfig, args: &ExtractArgs) -> anyhow::Result<DocumentSource> {
    let mut source = DocumentSource::from_config(config)?;

    if args.cache {
        if config.cache.backend == CacheBackend::None {
            warn!("--cache given but no cache backend is configured");
        }
        source = source.with_cache_enabled(true);
    }
    if let Some(secs) = args.expire {
        source = source.with_expiry(Some(Duration::from_secs(secs)));
    }

    Ok(source)
}

/// Parse `NAME=QUERY`, `NAME=css:QUERY` or `NAME=xpath:QUERY`.
fn parse_inline_mapping(s: &str) -> Result<(String, Query), String> {
    let (name, query) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=QUERY, got {:?}", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in {:?}", s));
    }

    let query = match query.split_once(':') {
        Some((kind, rest)) => match QueryKind::from_name(kind) {
            Some(kind) => Query::new(kind, rest),
            None => Query::css(query),
        },
        None => Query::css(query),
    };
    if query.query.trim().is_empty() {
        return Err(format!("empty query for field {:?}", name));
    }

    Ok((name.to_string(), query))
}

fn format_record(
    record: &serde_json::Map<String, serde_json::Value>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(record)?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &serde_json::Map<String, serde_json::Value>) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(record.keys())?;
    wtr.write_record(record.values().map(cell))?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &serde_json::Map<String, serde_json::Value>) -> String {
    let width = record.keys().map(String::len).max().unwrap_or(0);
    let mut output = String::new();

    for (name, value) in record {
        output.push_str(&format!("{:width$}  {}\n", name, cell(value), width = width));
    }

    output
}

/// Flatten a value into one cell: strings as-is, lists joined by `; `.
fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join("; "),
        other => other.to_string(),
    }
}
