//! HowLongToBeat fetcher
//!
//! HowLongToBeat has no public API. The site's search endpoint needs a key
//! that is embedded in its JavaScript bundles, so the first fetch:
//! 1. Loads the homepage and lists `<script src>` bundles (`_app-` first)
//! 2. Scans each bundle for the key and the search endpoint path
//! 3. Caches both for the life of the fetcher
//!
//! Searches POST to `{search_path}{key}`; if that is rejected the key is sent
//! in the payload instead (`searchOptions.users.id`). The first hit wins.
//! Looked up by game name, so it runs in the second pass.

use crate::ratelimit::RateLimiter;
use crate::raw::{HltbData, RawData};
use crate::sources::http::{check_status, read_json, read_text, HttpClient, BROWSER_USER_AGENT};
use crate::types::{FetchError, FetchOptions, LookupKey, RawFragment, SourceFetcher, SourceId};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{header, Response};
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::sync::LazyLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const HOWLONGTOBEAT_URL: &str = "https://howlongtobeat.com";

/// Search path used when the bundles do not reveal one
const DEFAULT_SEARCH_PATH: &str = "api/s/";

/// Bundle holding the search code in current site builds
const APP_BUNDLE_MARKER: &str = "_app-";

static USER_ID_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"users\s*:\s*\{\s*id\s*:\s*"([^"]+)""#).expect("valid user id key pattern")
});

static CONCAT_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/api/\w+/"(?:\.concat\("[^"]*"\))*"#).expect("valid concat key pattern")
});

static CONCAT_PART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.concat\(\s*["']([^"']*)["']\s*\)"#).expect("valid concat part pattern")
});

static SEARCH_FETCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)fetch\(\s*["'](/api/[^"']*)["']((?:\s*\.concat\(\s*["'][^"']*["']\s*\))+)\s*,"#,
    )
    .expect("valid search fetch pattern")
});

/// Search key and endpoint scraped from the site bundles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInfo {
    pub key: String,
    /// Path relative to the site root, e.g. `api/seek/`
    pub search_path: Option<String>,
}

impl SearchInfo {
    /// Scan one bundle; `None` when it carries no key
    pub fn from_script(script: &str) -> Option<Self> {
        let key = extract_key(script)?;
        let search_path = extract_search_path(script, &key);
        Some(Self { key, search_path })
    }
}

fn extract_key(script: &str) -> Option<String> {
    let direct: String = USER_ID_KEY_RE
        .captures_iter(script)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if !direct.is_empty() {
        return Some(direct);
    }

    let concatenated: String = CONCAT_KEY_RE
        .find_iter(script)
        .flat_map(|m| {
            CONCAT_PART_RE
                .captures_iter(m.as_str())
                .filter_map(|caps| caps.get(1).map(|p| p.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .collect();
    (!concatenated.is_empty()).then_some(concatenated)
}

/// Endpoint of the `fetch(...)` call whose concatenated suffix equals `key`
fn extract_search_path(script: &str, key: &str) -> Option<String> {
    SEARCH_FETCH_RE.captures_iter(script).find_map(|caps| {
        let endpoint = caps.get(1)?.as_str();
        let suffix: String = CONCAT_PART_RE
            .captures_iter(caps.get(2)?.as_str())
            .filter_map(|part| part.get(1).map(|p| p.as_str()))
            .collect();
        (suffix == key).then(|| endpoint.trim_start_matches('/').to_string())
    })
}

/// Script sources on the homepage, app bundles first
fn script_sources(homepage: &str) -> Result<Vec<String>, FetchError> {
    let selector = Selector::parse("script[src]")
        .map_err(|e| FetchError::parse(format!("Bad script selector: {}", e)))?;
    let document = Html::parse_document(homepage);

    let (mut app, other): (Vec<String>, Vec<String>) = document
        .select(&selector)
        .filter_map(|script| script.value().attr("src").map(str::to_string))
        .partition(|src| src.contains(APP_BUNDLE_MARKER));
    app.extend(other);
    Ok(app)
}

/// Search request body
pub fn search_payload(game_name: &str, key_in_payload: Option<&str>) -> Value {
    let mut payload = json!({
        "searchType": "games",
        "searchTerms": game_name.split_whitespace().collect::<Vec<_>>(),
        "searchPage": 1,
        "size": 20,
        "searchOptions": {
            "games": {
                "userId": 0,
                "platform": "",
                "sortCategory": "popular",
                "rangeCategory": "main",
                "rangeTime": {"min": 0, "max": 0},
                "gameplay": {"perspective": "", "flow": "", "genre": "", "difficulty": ""},
                "rangeYear": {"max": "", "min": ""},
                "modifier": ""
            },
            "users": {"sortCategory": "postcount"},
            "lists": {"sortCategory": "follows"},
            "filter": "",
            "sort": 0,
            "randomizer": 0
        },
        "useCache": true
    });

    if let Some(key) = key_in_payload {
        payload["searchOptions"]["users"]["id"] = Value::String(key.to_string());
    }
    payload
}

pub struct HowLongToBeatFetcher {
    http: HttpClient,
    base_url: String,
    search_info: Mutex<Option<SearchInfo>>,
}

impl HowLongToBeatFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: HOWLONGTOBEAT_URL.to_string(),
            search_info: Mutex::new(None),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn absolute(&self, src: &str) -> String {
        if src.starts_with("http://") || src.starts_with("https://") {
            src.to_string()
        } else {
            format!("{}/{}", self.base_url, src.trim_start_matches('/'))
        }
    }

    async fn get_page(&self, url: &str, limiter: &RateLimiter) -> Result<String, FetchError> {
        let response = self
            .http
            .send(SourceId::HowLongToBeat, limiter, |client| {
                client
                    .get(url)
                    .header(header::USER_AGENT, BROWSER_USER_AGENT)
                    .header(header::REFERER, format!("{}/", self.base_url))
            })
            .await?;
        check_status(SourceId::HowLongToBeat, &response)?;
        read_text(response).await
    }

    /// Cached search info, discovering it on first use
    ///
    /// Failed discoveries are not cached, so the next fetch tries again.
    async fn search_info(&self, limiter: &RateLimiter) -> Result<SearchInfo, FetchError> {
        let mut cached = self.search_info.lock().await;
        if let Some(info) = cached.as_ref() {
            return Ok(info.clone());
        }

        let info = self.discover(limiter).await?;
        info!(
            search_path = info.search_path.as_deref().unwrap_or(DEFAULT_SEARCH_PATH),
            "HowLongToBeat search key discovered"
        );
        *cached = Some(info.clone());
        Ok(info)
    }

    async fn discover(&self, limiter: &RateLimiter) -> Result<SearchInfo, FetchError> {
        let homepage = self.get_page(&format!("{}/", self.base_url), limiter).await?;

        for src in script_sources(&homepage)? {
            let url = self.absolute(&src);
            match self.get_page(&url, limiter).await {
                Ok(script) => {
                    if let Some(info) = SearchInfo::from_script(&script) {
                        return Ok(info);
                    }
                }
                Err(e) => debug!(script = %url, error = %e, "Skipping HowLongToBeat bundle"),
            }
        }

        warn!("No HowLongToBeat search key found in site bundles");
        Err(FetchError::unavailable("Missing HowLongToBeat API key"))
    }

    async fn post_search(
        &self,
        url: &str,
        payload: &Value,
        limiter: &RateLimiter,
    ) -> Result<Response, FetchError> {
        self.http
            .send(SourceId::HowLongToBeat, limiter, |client| {
                client
                    .post(url)
                    .header(header::USER_AGENT, BROWSER_USER_AGENT)
                    .header(header::REFERER, format!("{}/", self.base_url))
                    .header(header::ACCEPT, "*/*")
                    .json(payload)
            })
            .await
    }

    async fn search(&self, game_name: &str, limiter: &RateLimiter) -> Result<HltbData, FetchError> {
        let info = self.search_info(limiter).await?;
        let search_url = format!(
            "{}/{}",
            self.base_url,
            info.search_path.as_deref().unwrap_or(DEFAULT_SEARCH_PATH)
        );

        let with_key = self
            .post_search(
                &format!("{}{}", search_url, info.key),
                &search_payload(game_name, None),
                limiter,
            )
            .await?;

        let response = if with_key.status().is_success() {
            with_key
        } else {
            debug!(
                status = with_key.status().as_u16(),
                "HowLongToBeat rejected key in path, retrying with key in payload"
            );
            let with_payload = self
                .post_search(&search_url, &search_payload(game_name, Some(&info.key)), limiter)
                .await?;
            check_status(SourceId::HowLongToBeat, &with_payload)?;
            with_payload
        };

        let body: Value = read_json(response).await?;
        first_hit(&body, game_name)
    }
}

fn first_hit(body: &Value, game_name: &str) -> Result<HltbData, FetchError> {
    let not_found = || FetchError::not_found(format!("'{}' not found on HowLongToBeat", game_name));

    if body.get("count").and_then(Value::as_u64) == Some(0) {
        return Err(not_found());
    }
    let hits = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::parse("Search response has no data array"))?;
    let first = hits.first().ok_or_else(not_found)?;

    serde_json::from_value(first.clone())
        .map_err(|e| FetchError::parse(format!("Unexpected search hit: {}", e)))
}

#[async_trait]
impl SourceFetcher for HowLongToBeatFetcher {
    fn source(&self) -> SourceId {
        SourceId::HowLongToBeat
    }

    fn lookup(&self) -> LookupKey {
        LookupKey::GameName
    }

    async fn fetch(
        &self,
        key: &str,
        _options: &FetchOptions,
        limiter: &RateLimiter,
    ) -> RawFragment {
        self.search(key, limiter).await.map(RawData::HowLongToBeat).into()
    }
}
