//! Helpers for the `gameinsights` binary
//!
//! Identifier input, source filters and output rendering live here so the
//! binary stays a thin argument-to-collector shim.

use crate::error::{CollectorError, CollectorResult};
use crate::fusion::{Projection, RecordBatch, Table};
use crate::schema::fields_for_sources;
use crate::types::SourceId;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// What `collect` produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CollectMode {
    /// One merged record per identifier
    #[default]
    Games,
    /// Monthly active-player table
    ActivePlayer,
}

/// Split newline/comma separated identifiers, trimmed, first occurrence kept
pub fn parse_identifiers(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| c == '\n' || c == ',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

/// Inline `--appid` values followed by the contents of `--appid-file`
pub fn read_identifiers(inline: &[String], file: Option<&Path>) -> CollectorResult<Vec<String>> {
    let mut text = inline.join("\n");
    if let Some(path) = file {
        let contents = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = contents.len(), "Read identifier file");
        text.push('\n');
        text.push_str(&contents);
    }
    Ok(parse_identifiers(&text))
}

/// Projection onto the fields owned by the named sources
///
/// No names means no filter. Unknown names are rejected.
pub fn parse_source_filter(names: &[String]) -> CollectorResult<Option<Projection>> {
    if names.is_empty() {
        return Ok(None);
    }

    let sources = names
        .iter()
        .flat_map(|name| name.split(','))
        .filter(|name| !name.trim().is_empty())
        .map(str::parse::<SourceId>)
        .collect::<CollectorResult<Vec<_>>>()?;

    if sources.is_empty() {
        return Err(CollectorError::InvalidConfig(
            "--source needs at least one source name".into(),
        ));
    }
    Ok(Some(Projection::Fields(fields_for_sources(&sources))))
}

pub fn render_batch(batch: &RecordBatch, format: OutputFormat) -> CollectorResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(batch)?),
        OutputFormat::Csv => batch.to_table().to_csv_string(),
    }
}

pub fn render_table(table: &Table, format: OutputFormat) -> CollectorResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&table.to_json_records())?),
        OutputFormat::Csv => table.to_csv_string(),
    }
}

/// Write to `path`, or stdout when none is given
pub fn write_output(content: &str, path: Option<&Path>) -> CollectorResult<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)?;
            info!(path = %path.display(), "Output written");
        }
        None => println!("{}", content.trim_end()),
    }
    Ok(())
}
