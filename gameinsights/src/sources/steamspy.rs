//! SteamSpy fetcher
//!
//! Endpoint: `https://steamspy.com/api.php?request=appdetails&appid={appid}`
//!
//! SteamSpy answers unknown appids with 200 and an empty record, so a missing
//! `name` is treated as not found.

use crate::ratelimit::RateLimiter;
use crate::raw::{RawData, SteamSpyData};
use crate::sources::http::{check_status, read_json, HttpClient};
use crate::types::{FetchError, FetchOptions, RawFragment, SourceFetcher, SourceId};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

const STEAMSPY_API_URL: &str = "https://steamspy.com/api.php";

pub struct SteamSpyFetcher {
    http: HttpClient,
    base_url: String,
}

impl SteamSpyFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: STEAMSPY_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_app(
        &self,
        appid: &str,
        limiter: &RateLimiter,
    ) -> Result<SteamSpyData, FetchError> {
        let response = self
            .http
            .send(SourceId::SteamSpy, limiter, |client| {
                client
                    .get(&self.base_url)
                    .query(&[("request", "appdetails"), ("appid", appid)])
            })
            .await?;
        check_status(SourceId::SteamSpy, &response)?;

        let data: SteamSpyData = read_json(response).await?;
        let has_name = data
            .name
            .as_ref()
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name {
            return Err(FetchError::not_found(format!(
                "appid {} not found in SteamSpy",
                appid
            )));
        }

        debug!(appid = %appid, "SteamSpy data retrieved");
        Ok(data)
    }
}

#[async_trait]
impl SourceFetcher for SteamSpyFetcher {
    fn source(&self) -> SourceId {
        SourceId::SteamSpy
    }

    async fn fetch(
        &self,
        key: &str,
        _options: &FetchOptions,
        limiter: &RateLimiter,
    ) -> RawFragment {
        self.fetch_app(key, limiter).await.map(RawData::SteamSpy).into()
    }
}
