//! SteamCharts fetcher
//!
//! Scrapes `https://steamcharts.com/app/{appid}`. The page carries the
//! current and all-time player counts in `div.app-stat` blocks and one row
//! per month in `table.common-table`.

use crate::ratelimit::RateLimiter;
use crate::raw::{MonthlyActivePlayers, RawData, SteamChartsData};
use crate::sources::http::{check_status, read_text, HttpClient, BROWSER_USER_AGENT};
use crate::types::{FetchError, FetchOptions, RawFragment, SourceFetcher, SourceId};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

const STEAMCHARTS_URL: &str = "https://steamcharts.com";

/// Header row plus the "Last 30 Days" row
const SKIPPED_ROWS: usize = 2;

pub struct SteamChartsFetcher {
    http: HttpClient,
    base_url: String,
}

impl SteamChartsFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: STEAMCHARTS_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_page(
        &self,
        appid: &str,
        limiter: &RateLimiter,
    ) -> Result<SteamChartsData, FetchError> {
        let url = format!("{}/app/{}", self.base_url.trim_end_matches('/'), appid);
        let response = self
            .http
            .send(SourceId::SteamCharts, limiter, |client| {
                client.get(&url).header(header::USER_AGENT, BROWSER_USER_AGENT)
            })
            .await?;
        check_status(SourceId::SteamCharts, &response)?;

        let body = read_text(response).await?;
        let data = parse_page(&body)?;
        debug!(
            appid = %appid,
            months = data.monthly_active_player.len(),
            "SteamCharts page parsed"
        );
        Ok(data)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::parse(format!("Bad selector '{}': {}", css, e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn parse_number(text: &str) -> Option<f64> {
    text.replace(',', "").trim().parse::<f64>().ok()
}

/// Parse a SteamCharts app page
///
/// Pages without an `#app-title` heading are SteamCharts' "not tracked"
/// page and map to `NotFound`.
pub fn parse_page(body: &str) -> Result<SteamChartsData, FetchError> {
    let document = Html::parse_document(body);

    let title = document
        .select(&selector("h1#app-title")?)
        .next()
        .map(text_of)
        .ok_or_else(|| FetchError::not_found("SteamCharts page has no app title"))?;

    let num = selector("span.num")?;
    let stats: Vec<String> = document
        .select(&selector("div.app-stat")?)
        .filter_map(|stat| stat.select(&num).next().map(text_of))
        .collect();
    if stats.len() < 3 {
        return Err(FetchError::parse(format!(
            "Expected 3 player stats, found {}",
            stats.len()
        )));
    }

    let cell = selector("td")?;
    let monthly_active_player = document
        .select(&selector("table.common-table tr")?)
        .skip(SKIPPED_ROWS)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&cell).map(text_of).collect();
            parse_month_row(&cells)
        })
        .collect();

    Ok(SteamChartsData {
        name: Some(Value::String(title)),
        active_player_24h: parse_number(&stats[1]).map(|n| Value::from(n as i64)),
        peak_active_player_all_time: parse_number(&stats[2]).map(|n| Value::from(n as i64)),
        monthly_active_player,
    })
}

/// `[month, avg, gain, % gain, peak]`, e.g. `["June 2024", "1,234.5", "-12.3", "-0.99%", "2,345"]`
fn parse_month_row(cells: &[String]) -> Option<MonthlyActivePlayers> {
    if cells.len() < 5 {
        return None;
    }

    let month = match NaiveDate::parse_from_str(&format!("01 {}", cells[0]), "%d %B %Y") {
        Ok(date) => date.format("%Y-%m").to_string(),
        Err(_) => {
            debug!(month = %cells[0], "Skipping unparseable SteamCharts month");
            return None;
        }
    };

    let gain = match cells[2].as_str() {
        "" | "-" => None,
        text => parse_number(text),
    };
    let percentage_gain = match cells[3].as_str() {
        "-" => 0.0,
        text => parse_number(text.trim_end_matches('%')).unwrap_or(0.0),
    };

    Some(MonthlyActivePlayers {
        month,
        average_players: parse_number(&cells[1]),
        gain,
        percentage_gain,
        peak_players: parse_number(&cells[4]).map(|n| n as i64),
    })
}

#[async_trait]
impl SourceFetcher for SteamChartsFetcher {
    fn source(&self) -> SourceId {
        SourceId::SteamCharts
    }

    async fn fetch(
        &self,
        key: &str,
        _options: &FetchOptions,
        limiter: &RateLimiter,
    ) -> RawFragment {
        self.fetch_page(key, limiter).await.map(RawData::SteamCharts).into()
    }
}
