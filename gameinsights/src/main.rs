//! gameinsights - per-game metadata collector
//!
//! **Usage:**
//! ```bash
//! gameinsights collect --appid 570 --appid 730 --format csv --recap
//! gameinsights collect --appid-file ids.txt --mode active-player
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gameinsights::cli::{self, CollectMode, OutputFormat};
use gameinsights::{Collector, CollectorConfig};
use gameinsights_common::config::{
    load_config, resolve_api_key, GAMALYTIC_API_KEY_ENV, STEAM_API_KEY_ENV,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Active-player cells with no observation
const DEFAULT_FILL: i64 = -1;

#[derive(Parser, Debug)]
#[clap(name = "gameinsights")]
#[clap(about = "Collect and merge per-game metadata from public game-data providers")]
#[clap(version)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect records for a batch of Steam app ids
    Collect(CollectArgs),
}

#[derive(clap::Args, Debug)]
struct CollectArgs {
    /// Steam app id (repeatable, comma separated values accepted)
    #[clap(long = "appid", value_name = "APPID")]
    appids: Vec<String>,

    /// File of app ids, newline or comma separated
    #[clap(long, value_name = "FILE")]
    appid_file: Option<PathBuf>,

    /// Restrict output to fields owned by these sources (repeatable)
    #[clap(long = "source", value_name = "SOURCE")]
    sources: Vec<String>,

    #[clap(long, value_enum, default_value_t = CollectMode::Games)]
    mode: CollectMode,

    #[clap(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Write here instead of stdout
    #[clap(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Only the recap field subset
    #[clap(long)]
    recap: bool,

    /// Global budget: identifiers per period
    #[clap(long)]
    calls: Option<u32>,

    /// Global budget period (seconds)
    #[clap(long)]
    period: Option<u64>,

    /// Steam store country code
    #[clap(long)]
    region: Option<String>,

    /// Steam store language
    #[clap(long)]
    language: Option<String>,

    #[clap(long, value_name = "KEY")]
    steam_api_key: Option<String>,

    #[clap(long, value_name = "KEY")]
    gamalytic_api_key: Option<String>,

    /// Only log warnings and errors
    #[clap(long, short)]
    quiet: bool,

    /// TOML config file
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Collect(collect) => run_collect(collect).await,
    }
}

async fn run_collect(args: CollectArgs) -> Result<()> {
    let toml = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    let level = if args.quiet { "warn" } else { toml.logging.level.as_str() };
    gameinsights_common::logging::init_tracing(level)?;
    info!("gameinsights {}", env!("CARGO_PKG_VERSION"));

    let config = build_config(&args, &toml)?;
    let projection = cli::parse_source_filter(&args.sources)?;
    let identifiers = cli::read_identifiers(&args.appids, args.appid_file.as_deref())?;
    if identifiers.is_empty() {
        bail!("No app ids given (use --appid or --appid-file)");
    }

    let collector = Collector::new(config)?;
    let content = match args.mode {
        CollectMode::Games => {
            let mut batch = collector.collect(&identifiers).await?;
            if let Some(projection) = projection {
                batch = batch.project(projection);
            }
            cli::render_batch(&batch, args.format)?
        }
        CollectMode::ActivePlayer => {
            let table = collector
                .collect_active_players(&identifiers, DEFAULT_FILL)
                .await?;
            cli::render_table(&table, args.format)?
        }
    };

    cli::write_output(&content, args.output.as_deref())?;
    Ok(())
}

/// Defaults, then TOML and environment, then command line
fn build_config(
    args: &CollectArgs,
    toml: &gameinsights_common::config::TomlConfig,
) -> Result<CollectorConfig> {
    let mut config = CollectorConfig::from_toml(toml)?;

    if args.recap {
        config.recap = true;
    }
    if let Some(calls) = args.calls {
        config.calls = calls;
    }
    if let Some(period) = args.period {
        config.period = Duration::from_secs(period);
    }
    if let Some(region) = &args.region {
        config.region = region.clone();
    }
    if let Some(language) = &args.language {
        config.language = language.clone();
    }

    config.steam_api_key = resolve_api_key(
        "Steam",
        args.steam_api_key.as_deref(),
        STEAM_API_KEY_ENV,
        toml.api_keys.steam.as_deref(),
    );
    config.gamalytic_api_key = resolve_api_key(
        "Gamalytic",
        args.gamalytic_api_key.as_deref(),
        GAMALYTIC_API_KEY_ENV,
        toml.api_keys.gamalytic.as_deref(),
    );

    config.validate()?;
    Ok(config)
}
