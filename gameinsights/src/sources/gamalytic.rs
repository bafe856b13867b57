//! Gamalytic fetcher
//!
//! Endpoint: `https://api.gamalytic.com/game/{appid}`
//! Rate limit: 500 requests/day without a key. The key, when configured, is
//! sent in the `api-key` header.

use crate::ratelimit::RateLimiter;
use crate::raw::{GamalyticData, RawData};
use crate::sources::http::{check_status, read_json, HttpClient};
use crate::types::{FetchError, FetchOptions, RawFragment, SourceFetcher, SourceId};
use async_trait::async_trait;
use tracing::debug;

const GAMALYTIC_API_URL: &str = "https://api.gamalytic.com";

pub struct GamalyticFetcher {
    http: HttpClient,
    base_url: String,
}

impl GamalyticFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: GAMALYTIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_game(
        &self,
        appid: &str,
        options: &FetchOptions,
        limiter: &RateLimiter,
    ) -> Result<GamalyticData, FetchError> {
        let url = format!("{}/game/{}", self.base_url.trim_end_matches('/'), appid);
        let response = self
            .http
            .send(SourceId::Gamalytic, limiter, |client| {
                let request = client.get(&url);
                match options.gamalytic_api_key.as_deref() {
                    Some(key) => request.header("api-key", key),
                    None => request,
                }
            })
            .await?;
        check_status(SourceId::Gamalytic, &response)?;

        let data: GamalyticData = read_json(response).await?;
        debug!(appid = %appid, "Gamalytic data retrieved");
        Ok(data)
    }
}

#[async_trait]
impl SourceFetcher for GamalyticFetcher {
    fn source(&self) -> SourceId {
        SourceId::Gamalytic
    }

    async fn fetch(&self, key: &str, options: &FetchOptions, limiter: &RateLimiter) -> RawFragment {
        self.fetch_game(key, options, limiter)
            .await
            .map(RawData::Gamalytic)
            .into()
    }
}
