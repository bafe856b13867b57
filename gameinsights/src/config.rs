//! Collector configuration
//!
//! `CollectorConfig` is the fully resolved set of knobs for one collector.
//! It is built from defaults, then layered with the TOML `[collector]` and
//! `[api_keys]` tables ([`CollectorConfig::from_toml`]), then with CLI
//! overrides by the binary. API keys from the environment are resolved in
//! `from_toml` via [`resolve_api_key`].

use crate::error::{CollectorError, CollectorResult};
use crate::ratelimit::Budget;
use crate::types::{FetchOptions, ReviewMode, ReviewQuery};
use gameinsights_common::config::{
    is_valid_key, resolve_api_key, TomlConfig, GAMALYTIC_API_KEY_ENV, STEAM_API_KEY_ENV,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What a batch returns when every source failed for every identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalFailurePolicy {
    /// Raise `CollectorError::AllSourcesFailed`
    #[default]
    Error,
    /// Return all-Absent records
    ReturnAbsent,
}

impl FromStr for TotalFailurePolicy {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(TotalFailurePolicy::Error),
            "absent" | "return_absent" => Ok(TotalFailurePolicy::ReturnAbsent),
            other => Err(CollectorError::InvalidConfig(format!(
                "on_total_failure must be 'error' or 'absent', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TotalFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalFailurePolicy::Error => f.write_str("error"),
            TotalFailurePolicy::ReturnAbsent => f.write_str("absent"),
        }
    }
}

/// Resolved collector settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Global budget: max identifiers admitted per `period`
    pub calls: u32,
    pub period: Duration,
    /// Return the recap projection
    pub recap: bool,
    pub region: String,
    pub language: String,
    pub include_free_games: bool,
    pub steam_api_key: Option<String>,
    pub gamalytic_api_key: Option<String>,
    /// Identifiers in flight at once
    pub max_concurrency: usize,
    /// Minimum spacing between identifier starts; zero disables it
    pub inter_call_delay: Duration,
    pub on_total_failure: TotalFailurePolicy,
    pub review_mode: ReviewMode,
    pub review_query: ReviewQuery,
    pub http_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            calls: 60,
            period: Duration::from_secs(60),
            recap: false,
            region: "us".to_string(),
            language: "english".to_string(),
            include_free_games: true,
            steam_api_key: None,
            gamalytic_api_key: None,
            max_concurrency: 4,
            inter_call_delay: Duration::from_millis(250),
            on_total_failure: TotalFailurePolicy::Error,
            review_mode: ReviewMode::Summary,
            review_query: ReviewQuery::default(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl CollectorConfig {
    /// Defaults layered with the TOML file and key environment variables
    pub fn from_toml(toml: &TomlConfig) -> CollectorResult<Self> {
        let section = &toml.collector;
        let mut config = Self::default();

        if let Some(calls) = section.calls {
            config.calls = calls;
        }
        if let Some(period) = section.period {
            config.period = Duration::from_secs(period);
        }
        if let Some(recap) = section.recap {
            config.recap = recap;
        }
        if let Some(region) = &section.region {
            config.region = region.clone();
        }
        if let Some(language) = &section.language {
            config.language = language.clone();
        }
        if let Some(include) = section.include_free_games {
            config.include_free_games = include;
        }
        if let Some(max) = section.max_concurrency {
            config.max_concurrency = max;
        }
        if let Some(delay) = section.inter_call_delay_ms {
            config.inter_call_delay = Duration::from_millis(delay);
        }
        if let Some(policy) = &section.on_total_failure {
            config.on_total_failure = policy.parse()?;
        }
        if let Some(pages) = section.max_review_pages {
            config.review_query.max_pages = pages;
        }
        if let Some(timeout) = section.http_timeout_secs {
            config.http_timeout = Duration::from_secs(timeout);
        }

        config.steam_api_key = resolve_api_key(
            "Steam",
            None,
            STEAM_API_KEY_ENV,
            toml.api_keys.steam.as_deref(),
        );
        config.gamalytic_api_key = resolve_api_key(
            "Gamalytic",
            None,
            GAMALYTIC_API_KEY_ENV,
            toml.api_keys.gamalytic.as_deref(),
        );

        Ok(config)
    }

    /// Reject settings the collector cannot run with
    pub fn validate(&self) -> CollectorResult<()> {
        if self.calls == 0 {
            return Err(CollectorError::InvalidConfig("calls must be at least 1".into()));
        }
        if self.period.is_zero() {
            return Err(CollectorError::InvalidConfig("period must be non-zero".into()));
        }
        if self.max_concurrency == 0 {
            return Err(CollectorError::InvalidConfig(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(CollectorError::InvalidConfig("region must not be blank".into()));
        }
        if self.language.trim().is_empty() {
            return Err(CollectorError::InvalidConfig("language must not be blank".into()));
        }
        if self.http_timeout.is_zero() {
            return Err(CollectorError::InvalidConfig("http timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Budget spent once per identifier, across all sources
    pub fn global_budget(&self) -> CollectorResult<Budget> {
        Budget::new(self.calls, self.period).ok_or_else(|| {
            CollectorError::InvalidConfig("global budget needs calls > 0 and period > 0".into())
        })
    }

    /// Per-fetch options handed to every source
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            region: self.region.trim().to_string(),
            language: self.language.trim().to_string(),
            include_free_games: self.include_free_games,
            steam_api_key: self.steam_api_key.clone().filter(|k| is_valid_key(k)),
            gamalytic_api_key: self.gamalytic_api_key.clone().filter(|k| is_valid_key(k)),
            review_mode: self.review_mode,
            review_query: self.review_query.clone(),
        }
    }
}
