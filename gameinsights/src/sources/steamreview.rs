//! Steam reviews fetcher
//!
//! Endpoint: `https://store.steampowered.com/appreviews/{appid}?json=1`
//!
//! Two modes:
//! - Summary: one request, returns `query_summary`
//! - Listing: follows `cursor` page by page until the cursor repeats, a page
//!   comes back empty, or `max_pages` is reached. Every page acquires the
//!   limiter.

use crate::ratelimit::RateLimiter;
use crate::raw::{RawData, Review, ReviewListing, ReviewSummary};
use crate::sources::http::{check_status, read_json, HttpClient};
use crate::types::{
    FetchError, FetchOptions, RawFragment, ReviewMode, ReviewQuery, SourceFetcher, SourceId,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const STEAM_REVIEWS_URL: &str = "https://store.steampowered.com/appreviews";

/// Cursor value for the first page
const INITIAL_CURSOR: &str = "*";

/// One page of the reviews endpoint
#[derive(Debug, Deserialize)]
struct ReviewPage {
    #[serde(default)]
    success: i64,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    query_summary: Option<ReviewSummary>,
    #[serde(default)]
    reviews: Vec<Review>,
}

pub struct SteamReviewFetcher {
    http: HttpClient,
    base_url: String,
}

impl SteamReviewFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: STEAM_REVIEWS_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_page(
        &self,
        appid: &str,
        query: &ReviewQuery,
        cursor: &str,
        limiter: &RateLimiter,
    ) -> Result<ReviewPage, FetchError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), appid);
        let num_per_page = query.num_per_page.to_string();
        let response = self
            .http
            .send(SourceId::SteamReview, limiter, |client| {
                client.get(&url).query(&[
                    ("json", "1"),
                    ("filter", query.filter.as_str()),
                    ("language", query.language.as_str()),
                    ("review_type", query.review_type.as_str()),
                    ("purchase_type", query.purchase_type.as_str()),
                    ("num_per_page", num_per_page.as_str()),
                    ("cursor", cursor),
                ])
            })
            .await?;
        check_status(SourceId::SteamReview, &response)?;

        let page: ReviewPage = read_json(response).await?;
        if page.success != 1 {
            return Err(FetchError::unavailable(format!(
                "Reviews endpoint reported failure for appid {}",
                appid
            )));
        }
        Ok(page)
    }

    /// Aggregate review counts for one app
    pub async fn fetch_summary(
        &self,
        appid: &str,
        query: &ReviewQuery,
        limiter: &RateLimiter,
    ) -> Result<ReviewSummary, FetchError> {
        let page = self.fetch_page(appid, query, INITIAL_CURSOR, limiter).await?;
        if page.cursor.is_none() {
            return Err(FetchError::not_found(format!("No reviews for appid {}", appid)));
        }
        page.query_summary
            .ok_or_else(|| FetchError::parse("Reviews response has no query_summary"))
    }

    /// Individual reviews for one app, following the cursor
    pub async fn fetch_listing(
        &self,
        appid: &str,
        query: &ReviewQuery,
        limiter: &RateLimiter,
    ) -> Result<ReviewListing, FetchError> {
        let mut cursor = INITIAL_CURSOR.to_string();
        let mut reviews = Vec::new();
        let mut pages = 0u32;

        while pages < query.max_pages.max(1) {
            let page = self.fetch_page(appid, query, &cursor, limiter).await?;
            pages += 1;

            let Some(next) = page.cursor else {
                if pages == 1 {
                    return Err(FetchError::not_found(format!("No reviews for appid {}", appid)));
                }
                break;
            };

            let fetched = page.reviews.len();
            reviews.extend(page.reviews);
            debug!(appid = %appid, page = pages, fetched, "Review page retrieved");

            if fetched == 0 || next == cursor {
                break;
            }
            cursor = next;
        }

        info!(appid = %appid, pages, reviews = reviews.len(), "Review listing complete");
        Ok(ReviewListing { reviews })
    }
}

#[async_trait]
impl SourceFetcher for SteamReviewFetcher {
    fn source(&self) -> SourceId {
        SourceId::SteamReview
    }

    async fn fetch(&self, key: &str, options: &FetchOptions, limiter: &RateLimiter) -> RawFragment {
        match options.review_mode {
            ReviewMode::Summary => self
                .fetch_summary(key, &options.review_query, limiter)
                .await
                .map(RawData::ReviewSummary)
                .into(),
            ReviewMode::Listing => self
                .fetch_listing(key, &options.review_query, limiter)
                .await
                .map(RawData::ReviewListing)
                .into(),
        }
    }
}
