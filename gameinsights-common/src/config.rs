//! Configuration loading and config file resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! This module owns tier 3: locating the TOML file and deserializing it.
//! Every section and key is optional. A missing file is not an error; the
//! caller gets [`TomlConfig::default`] and a warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "GAMEINSIGHTS_CONFIG";

/// Environment variable holding the Steam Web API key
pub const STEAM_API_KEY_ENV: &str = "STEAM_WEB_API_KEY";

/// Environment variable holding the Gamalytic API key
pub const GAMALYTIC_API_KEY_ENV: &str = "GAMALYTIC_API_KEY";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Collector tuning (rate limits, locale, concurrency)
    pub collector: CollectorSection,

    /// Provider API keys
    pub api_keys: ApiKeysSection,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[collector]` table. Unset keys fall back to the collector's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    /// Global budget: max source calls per `period` seconds
    pub calls: Option<u32>,
    /// Global budget window in seconds
    pub period: Option<u64>,
    /// Return the recap projection instead of full records
    pub recap: Option<bool>,
    /// Steam store region (country code)
    pub region: Option<String>,
    /// Steam store language
    pub language: Option<String>,
    /// Include free games in a user's owned-games list
    pub include_free_games: Option<bool>,
    /// Max identifiers fetched concurrently
    pub max_concurrency: Option<usize>,
    /// Minimum delay between identifiers, in milliseconds
    pub inter_call_delay_ms: Option<u64>,
    /// "error" or "absent"
    pub on_total_failure: Option<String>,
    /// Page cap for review listings
    pub max_review_pages: Option<u32>,
    /// HTTP request timeout in seconds
    pub http_timeout_secs: Option<u64>,
}

/// `[api_keys]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeysSection {
    pub steam: Option<String>,
    pub gamalytic: Option<String>,
}

/// Resolve the config file path
///
/// **Priority:** explicit path → `GAMEINSIGHTS_CONFIG` → platform config dir
/// (`~/.config/gameinsights/config.toml` on Linux).
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("gameinsights").join("config.toml"))
}

/// Load TOML configuration from `path`
///
/// Missing file → warning + defaults. Unreadable or malformed file → error,
/// since silently ignoring a config the user wrote hides mistakes.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve and load configuration in one step
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(explicit) {
        Some(path) => load_toml_config(&path),
        None => {
            debug!("No config directory on this platform, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolve an API key from three tiers
///
/// **Priority:** command line → environment → TOML. Blank values are skipped
/// at every tier.
pub fn resolve_api_key(
    name: &str,
    cli_value: Option<&str>,
    env_var: &str,
    toml_value: Option<&str>,
) -> Option<String> {
    if let Some(key) = cli_value.filter(|k| is_valid_key(k)) {
        debug!("{} API key taken from command line", name);
        return Some(key.trim().to_string());
    }

    if let Some(key) = std::env::var(env_var).ok().filter(|k| is_valid_key(k)) {
        debug!("{} API key taken from {}", name, env_var);
        return Some(key.trim().to_string());
    }

    if let Some(key) = toml_value.filter(|k| is_valid_key(k)) {
        debug!("{} API key taken from TOML config", name);
        return Some(key.trim().to_string());
    }

    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
