//! Steam user fetcher
//!
//! Requires a Steam Web API key. Looks up one 64-bit Steam id:
//! - `ISteamUser/GetPlayerSummaries/v0002` for the profile summary
//! - `IPlayerService/GetOwnedGames/v0001` and
//!   `IPlayerService/GetRecentlyPlayedGames/v0001` for public profiles only
//!
//! Game list failures leave the lists empty; only the summary is required.

use crate::ratelimit::RateLimiter;
use crate::raw::{OwnedGames, RawData, RecentlyPlayedGames, SteamUserData, UserSummary};
use crate::sources::http::{check_status, read_json, HttpClient};
use crate::types::{FetchError, FetchOptions, LookupKey, RawFragment, SourceFetcher, SourceId};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

const STEAM_WEB_API_URL: &str = "http://api.steampowered.com";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerList {
    #[serde(default)]
    players: Vec<UserSummary>,
}

pub struct SteamUserFetcher {
    http: HttpClient,
    base_url: String,
}

impl SteamUserFetcher {
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

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        limiter: &RateLimiter,
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        let response = self
            .http
            .send(SourceId::SteamUser, limiter, |client| client.get(&url).query(query))
            .await?;
        check_status(SourceId::SteamUser, &response)?;

        let envelope: Envelope<T> = read_json(response).await?;
        Ok(envelope.response)
    }

    async fn fetch_user(
        &self,
        steamid: &str,
        options: &FetchOptions,
        limiter: &RateLimiter,
    ) -> Result<SteamUserData, FetchError> {
        let key = options.steam_api_key.as_deref().ok_or_else(|| {
            FetchError::auth_required("Steam Web API key is required for user data")
        })?;

        let players: PlayerList = self
            .call(
                "ISteamUser/GetPlayerSummaries/v0002/",
                &[("key", key), ("steamids", steamid)],
                limiter,
            )
            .await?;
        let summary = players
            .players
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::not_found(format!("Steam user {} not found", steamid)))?;

        let mut data = SteamUserData {
            summary,
            ..Default::default()
        };

        if !data.summary.is_public() {
            debug!(steamid = %steamid, "Profile is private, skipping game lists");
            return Ok(data);
        }

        let include_free = if options.include_free_games { "1" } else { "0" };
        match self
            .call::<OwnedGames>(
                "IPlayerService/GetOwnedGames/v0001/",
                &[
                    ("key", key),
                    ("steamid", steamid),
                    ("include_appinfo", "1"),
                    ("include_played_free_games", include_free),
                ],
                limiter,
            )
            .await
        {
            Ok(owned) => data.owned_games = owned,
            Err(e) => warn!(steamid = %steamid, error = %e, "Owned games unavailable"),
        }

        match self
            .call::<RecentlyPlayedGames>(
                "IPlayerService/GetRecentlyPlayedGames/v0001/",
                &[("key", key), ("steamid", steamid)],
                limiter,
            )
            .await
        {
            Ok(mut recent) => {
                recent.total_playtime_2weeks = recent.games.iter().map(|g| g.playtime_2weeks).sum();
                data.recently_played_games = recent;
            }
            Err(e) => warn!(steamid = %steamid, error = %e, "Recently played games unavailable"),
        }

        Ok(data)
    }
}

#[async_trait]
impl SourceFetcher for SteamUserFetcher {
    fn source(&self) -> SourceId {
        SourceId::SteamUser
    }

    fn lookup(&self) -> LookupKey {
        LookupKey::SteamId
    }

    async fn fetch(&self, key: &str, options: &FetchOptions, limiter: &RateLimiter) -> RawFragment {
        self.fetch_user(key, options, limiter)
            .await
            .map(RawData::SteamUser)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::http::DEFAULT_TIMEOUT;
    use crate::types::FetchErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STEAMID: &str = "76561197960287930";

    fn fetcher(server: &MockServer) -> SteamUserFetcher {
        SteamUserFetcher::new(HttpClient::new(DEFAULT_TIMEOUT).unwrap()).with_base_url(server.uri())
    }

    fn keyed() -> FetchOptions {
        FetchOptions {
            steam_api_key: Some("KEY".to_string()),
            ..Default::default()
        }
    }

    async fn mount_summary(server: &MockServer, visibility: i64) {
        Mock::given(method("GET"))
            .and(path("/ISteamUser/GetPlayerSummaries/v0002/"))
            .and(query_param("steamids", STEAMID))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"players": [{
                    "steamid": STEAMID,
                    "communityvisibilitystate": visibility,
                    "personaname": "Rabscuttle",
                    "loccountrycode": "US"
                }]}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_required() {
        let server = MockServer::start().await;
        let fragment = fetcher(&server)
            .fetch(STEAMID, &FetchOptions::default(), &RateLimiter::unlimited())
            .await;
        assert_eq!(fragment.error().map(|e| e.kind), Some(FetchErrorKind::AuthRequired));
    }

    #[tokio::test]
    async fn test_public_profile_collects_game_lists() {
        let server = MockServer::start().await;
        mount_summary(&server, 3).await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v0001/"))
            .and(query_param("include_played_free_games", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"game_count": 2, "games": [
                    {"appid": 570, "name": "Dota 2", "playtime_forever": 1200},
                    {
                        "appid": 620,
                        "name": "Portal 2",
                        "playtime_forever": 600,
                        "playtime_2weeks": 30
                    }
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetRecentlyPlayedGames/v0001/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"total_count": 2, "games": [
                    {
                        "appid": 620,
                        "name": "Portal 2",
                        "playtime_2weeks": 30,
                        "playtime_forever": 600
                    },
                    {"appid": 440, "name": "TF2", "playtime_2weeks": 15, "playtime_forever": 90}
                ]}
            })))
            .mount(&server)
            .await;

        let fragment = fetcher(&server)
            .fetch(STEAMID, &keyed(), &RateLimiter::unlimited())
            .await;
        let Some(RawData::SteamUser(data)) = fragment.data() else {
            panic!("expected user data, got {:?}", fragment);
        };

        assert_eq!(data.summary.persona_name.as_deref(), Some("Rabscuttle"));
        assert_eq!(data.owned_games.game_count, 2);
        assert_eq!(data.owned_games.games[1].playtime_2weeks, Some(30));
        assert_eq!(data.recently_played_games.games_count, 2);
        assert_eq!(data.recently_played_games.total_playtime_2weeks, 45);
    }

    #[tokio::test]
    async fn test_private_profile_skips_game_lists() {
        let server = MockServer::start().await;
        mount_summary(&server, 1).await;

        let fragment = fetcher(&server)
            .fetch(STEAMID, &keyed(), &RateLimiter::unlimited())
            .await;
        let Some(RawData::SteamUser(data)) = fragment.data() else {
            panic!("expected user data, got {:?}", fragment);
        };
        assert!(data.owned_games.games.is_empty());
        assert_eq!(server.received_requests().await.map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn test_game_list_failure_keeps_summary() {
        let server = MockServer::start().await;
        mount_summary(&server, 3).await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v0001/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fragment = fetcher(&server)
            .fetch(STEAMID, &keyed(), &RateLimiter::unlimited())
            .await;
        let Some(RawData::SteamUser(data)) = fragment.data() else {
            panic!("expected user data, got {:?}", fragment);
        };
        assert!(data.owned_games.games.is_empty());
        assert!(data.recently_played_games.games.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_and_rejected_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("steamids", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"response": {"players": []}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("steamids", "2"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let fetcher = fetcher(&server);
        let limiter = RateLimiter::unlimited();
        let missing = fetcher.fetch("1", &keyed(), &limiter).await;
        assert_eq!(missing.error().map(|e| e.kind), Some(FetchErrorKind::NotFound));
        let rejected = fetcher.fetch("2", &keyed(), &limiter).await;
        assert_eq!(rejected.error().map(|e| e.kind), Some(FetchErrorKind::AuthRequired));
    }
}
