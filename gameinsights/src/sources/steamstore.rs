//! Steam Store fetcher
//!
//! Endpoint: `https://store.steampowered.com/api/appdetails?appids={appid}&cc={region}&l={language}`
//!
//! The response is keyed by appid; `success: false` means the app does not
//! exist or is not sold in the requested region.

use crate::ratelimit::RateLimiter;
use crate::raw::{ContentRating, RawData, SteamStoreData};
use crate::sources::http::{check_status, read_json, HttpClient};
use crate::types::{FetchError, FetchOptions, RawFragment, SourceFetcher, SourceId};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

const STEAM_STORE_API_URL: &str = "https://store.steampowered.com/api/appdetails";

pub struct SteamStoreFetcher {
    http: HttpClient,
    base_url: String,
}

impl SteamStoreFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: STEAM_STORE_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_app(
        &self,
        appid: &str,
        options: &FetchOptions,
        limiter: &RateLimiter,
    ) -> Result<SteamStoreData, FetchError> {
        let response = self
            .http
            .send(SourceId::SteamStore, limiter, |client| {
                client.get(&self.base_url).query(&[
                    ("appids", appid),
                    ("cc", options.region.as_str()),
                    ("l", options.language.as_str()),
                ])
            })
            .await?;
        check_status(SourceId::SteamStore, &response)?;

        let body: Value = read_json(response).await?;
        let entry = body.get(appid).ok_or_else(|| {
            FetchError::not_found(format!("appid {} missing from store response", appid))
        })?;

        if entry.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(FetchError::not_found(format!(
                "appid {} is not available in region '{}' / language '{}'",
                appid, options.region, options.language
            )));
        }

        let data = entry
            .get("data")
            .ok_or_else(|| FetchError::parse("store response has no data object"))?;

        debug!(appid = %appid, "Steam store data retrieved");
        Ok(store_data(data))
    }
}

/// Flatten the nested `appdetails` object
fn store_data(data: &Value) -> SteamStoreData {
    let at = |pointer: &str| data.pointer(pointer).cloned();

    let mut platforms: Vec<String> = data
        .get("platforms")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter(|(_, supported)| supported.as_bool() == Some(true))
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default();
    platforms.sort();

    let content_rating = data
        .get("ratings")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(rating_type, rating)| {
                    rating.get("rating").and_then(Value::as_str).map(|r| ContentRating {
                        rating_type: rating_type.clone(),
                        rating: r.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    SteamStoreData {
        steam_appid: at("/steam_appid"),
        name: at("/name"),
        app_type: at("/type"),
        is_free: at("/is_free"),
        is_coming_soon: at("/release_date/coming_soon"),
        release_date: at("/release_date/date"),
        developers: at("/developers"),
        publishers: at("/publishers"),
        price_currency: at("/price_overview/currency"),
        price_initial: at("/price_overview/initial"),
        price_final: at("/price_overview/final"),
        platforms,
        categories: descriptions(data.get("categories")),
        genres: descriptions(data.get("genres")),
        metacritic_score: at("/metacritic/score"),
        recommendations: at("/recommendations/total"),
        achievements: at("/achievements/total"),
        content_rating,
    }
}

fn descriptions(list: Option<&Value>) -> Vec<String> {
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("description").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SourceFetcher for SteamStoreFetcher {
    fn source(&self) -> SourceId {
        SourceId::SteamStore
    }

    async fn fetch(&self, key: &str, options: &FetchOptions, limiter: &RateLimiter) -> RawFragment {
        self.fetch_app(key, options, limiter)
            .await
            .map(RawData::SteamStore)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FetchErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(server: &MockServer) -> SteamStoreFetcher {
        SteamStoreFetcher::new(HttpClient::new(crate::sources::http::DEFAULT_TIMEOUT).unwrap())
            .with_base_url(format!("{}/api/appdetails", server.uri()))
    }

    #[tokio::test]
    async fn test_fetch_flattens_appdetails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("appids", "570"))
            .and(query_param("cc", "us"))
            .and(query_param("l", "english"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "570": {
                    "success": true,
                    "data": {
                        "steam_appid": 570,
                        "name": "Dota 2",
                        "type": "game",
                        "is_free": true,
                        "developers": ["Valve"],
                        "publishers": ["Valve"],
                        "platforms": {"windows": true, "mac": false, "linux": true},
                        "categories": [{"id": 1, "description": "Multi-player"}],
                        "genres": [{"id": "1", "description": "Action"}],
                        "release_date": {"coming_soon": false, "date": "9 Jul, 2013"},
                        "achievements": {"total": 0},
                        "ratings": {"pegi": {"rating": "12"}}
                    }
                }
            })))
            .mount(&server)
            .await;

        let limiter = RateLimiter::unlimited();
        let fragment = fetcher(&server)
            .fetch("570", &FetchOptions::default(), &limiter)
            .await;

        let Some(RawData::SteamStore(data)) = fragment.data() else {
            panic!("expected steam store data, got {:?}", fragment);
        };
        assert_eq!(data.name, Some(json!("Dota 2")));
        assert_eq!(data.release_date, Some(json!("9 Jul, 2013")));
        assert_eq!(data.platforms, vec!["linux".to_string(), "windows".to_string()]);
        assert_eq!(data.categories, vec!["Multi-player".to_string()]);
        assert_eq!(data.content_rating[0].rating_type, "pegi");
        assert_eq!(data.price_final, None);
    }

    #[tokio::test]
    async fn test_unsuccessful_entry_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"999999999": {"success": false}})),
            )
            .mount(&server)
            .await;

        let limiter = RateLimiter::unlimited();
        let fragment = fetcher(&server)
            .fetch("999999999", &FetchOptions::default(), &limiter)
            .await;

        assert_eq!(fragment.error().map(|e| e.kind), Some(FetchErrorKind::NotFound));
    }
}
