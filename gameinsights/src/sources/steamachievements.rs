//! Steam achievements fetcher
//!
//! Global unlock percentages come from
//! `ISteamUserStats/GetGlobalAchievementPercentagesForApp/v0002` (no key).
//! With a Steam Web API key the schema (`ISteamUserStats/GetSchemaForGame/v2`)
//! adds display names, descriptions and the hidden flag, merged by
//! achievement name.

use crate::ratelimit::RateLimiter;
use crate::raw::{Achievement, AchievementsData, RawData};
use crate::sources::http::{check_status, read_json, HttpClient};
use crate::types::{FetchError, FetchErrorKind, FetchOptions, RawFragment, SourceFetcher, SourceId};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

const STEAM_WEB_API_URL: &str = "http://api.steampowered.com";

/// Schema text for one achievement
#[derive(Debug, Clone, PartialEq)]
struct SchemaEntry {
    display_name: Option<String>,
    description: Option<String>,
    hidden: Option<bool>,
}

pub struct SteamAchievementsFetcher {
    http: HttpClient,
    base_url: String,
}

impl SteamAchievementsFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: STEAM_WEB_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_percentages(
        &self,
        appid: &str,
        limiter: &RateLimiter,
    ) -> Result<Vec<Achievement>, FetchError> {
        let url = format!(
            "{}/ISteamUserStats/GetGlobalAchievementPercentagesForApp/v0002/",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .send(SourceId::SteamAchievements, limiter, |client| {
                client.get(&url).query(&[("gameid", appid)])
            })
            .await?;
        check_status(SourceId::SteamAchievements, &response)?;

        let body: Value = read_json(response).await?;
        let entries = body
            .pointer("/achievementpercentages/achievements")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                FetchError::not_found(format!("No achievement percentages for appid {}", appid))
            })?;

        Ok(entries.iter().filter_map(achievement_percentage).collect())
    }

    async fn fetch_schema(
        &self,
        appid: &str,
        key: &str,
        limiter: &RateLimiter,
    ) -> Result<HashMap<String, SchemaEntry>, FetchError> {
        let url = format!(
            "{}/ISteamUserStats/GetSchemaForGame/v2/",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .send(SourceId::SteamAchievements, limiter, |client| {
                client.get(&url).query(&[("appid", appid), ("key", key)])
            })
            .await?;
        check_status(SourceId::SteamAchievements, &response)?;

        let body: Value = read_json(response).await?;
        let entries = body
            .pointer("/game/availableGameStats/achievements")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(entries
            .iter()
            .filter_map(|entry| {
                let name = entry.get("name")?.as_str()?.to_string();
                let text =
                    |field: &str| entry.get(field).and_then(Value::as_str).map(str::to_string);
                let hidden = entry.get("hidden").and_then(|h| {
                    h.as_bool().or_else(|| h.as_i64().map(|n| n != 0))
                });
                Some((
                    name,
                    SchemaEntry {
                        display_name: text("displayName"),
                        description: text("description"),
                        hidden,
                    },
                ))
            })
            .collect())
    }

    async fn fetch_achievements(
        &self,
        appid: &str,
        options: &FetchOptions,
        limiter: &RateLimiter,
    ) -> Result<AchievementsData, FetchError> {
        let mut achievements = self.fetch_percentages(appid, limiter).await?;

        if let Some(key) = options.steam_api_key.as_deref() {
            // A rejected key fails the whole fetch; other schema failures only
            // cost the enrichment.
            match self.fetch_schema(appid, key, limiter).await {
                Ok(schema) => merge_schema(&mut achievements, &schema),
                Err(e) if e.kind == FetchErrorKind::AuthRequired => return Err(e),
                Err(e) => {
                    warn!(appid = %appid, error = %e, "Achievement schema unavailable");
                }
            }
        }

        debug!(appid = %appid, count = achievements.len(), "Achievements retrieved");
        Ok(AchievementsData { achievements })
    }
}

/// `{name, percent}` where percent may arrive as a number or a string
fn achievement_percentage(entry: &Value) -> Option<Achievement> {
    let name = entry.get("name")?.as_str()?.to_string();
    let percent = match entry.get("percent")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(Achievement {
        name,
        percent,
        display_name: None,
        description: None,
        hidden: None,
    })
}

fn merge_schema(achievements: &mut [Achievement], schema: &HashMap<String, SchemaEntry>) {
    for achievement in achievements.iter_mut() {
        if let Some(entry) = schema.get(&achievement.name) {
            achievement.display_name = entry.display_name.clone();
            achievement.description = entry.description.clone();
            achievement.hidden = entry.hidden;
        }
    }
}

#[async_trait]
impl SourceFetcher for SteamAchievementsFetcher {
    fn source(&self) -> SourceId {
        SourceId::SteamAchievements
    }

    async fn fetch(&self, key: &str, options: &FetchOptions, limiter: &RateLimiter) -> RawFragment {
        self.fetch_achievements(key, options, limiter)
            .await
            .map(RawData::SteamAchievements)
            .into()
    }
}
