//! Shared HTTP transport for fetchers
//!
//! - Connect and timeout errors are retried with exponential backoff
//!   (3 retries, 0.5 s base) before giving up
//! - Every attempt, retries included, takes its own rate-limiter grant
//! - Any transport failure maps to `SourceUnavailable` with status 599
//! - HTTP status codes map to fetch error kinds in [`check_status`]

use crate::error::CollectorResult;
use crate::ratelimit::RateLimiter;
use crate::types::{FetchError, FetchErrorKind, SourceId};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{error, warn};

/// Default timeout for provider requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Synthetic status reported for transport failures
pub const TRANSPORT_FAILURE_STATUS: u16 = 599;

/// User-Agent for API endpoints
pub const USER_AGENT: &str = concat!("gameinsights/", env!("CARGO_PKG_VERSION"));

/// User-Agent for scraped pages, which reject non-browser agents
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Retry schedule for connect/timeout errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// reqwest client plus retry policy, cheap to clone
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> CollectorResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send a request, rebuilding it for each retry
    ///
    /// Acquires `limiter` for `source` before every attempt: a timed-out
    /// request may still have reached the provider.
    pub async fn send<F>(
        &self,
        source: SourceId,
        limiter: &RateLimiter,
        build: F,
    ) -> Result<Response, FetchError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            limiter.acquire(source).await;
            match build(&self.client).send().await {
                Ok(response) => return Ok(response),
                Err(e)
                    if (e.is_connect() || e.is_timeout()) && attempt < self.retry.max_retries =>
                {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(
                        source = %source,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient request failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(FetchError::unavailable(format!("Request failed: {}", e))
                        .with_status(TRANSPORT_FAILURE_STATUS))
                }
            }
        }
    }
}

/// Map a non-success status to a fetch error
pub fn check_status(source: SourceId, response: &Response) -> Result<(), FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let kind = match status {
        StatusCode::NOT_FOUND => FetchErrorKind::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchErrorKind::AuthRequired,
        StatusCode::TOO_MANY_REQUESTS => {
            error!(
                source = %source,
                "Provider returned 429 despite local rate limiting; budget is too generous"
            );
            FetchErrorKind::RateLimited
        }
        _ => FetchErrorKind::SourceUnavailable,
    };

    Err(FetchError::new(kind, format!("{} returned HTTP {}", source, status.as_u16()))
        .with_status(status.as_u16()))
}

/// Read the body as text
pub async fn read_text(response: Response) -> Result<String, FetchError> {
    response.text().await.map_err(|e| {
        FetchError::unavailable(format!("Failed to read response body: {}", e))
            .with_status(TRANSPORT_FAILURE_STATUS)
    })
}

/// Read and decode a JSON body
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let body = read_text(response).await?;
    serde_json::from_str(&body).map_err(|e| FetchError::parse(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{Budget, SimulatedClock};
    use std::collections::HashMap;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_retry_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        assert_eq!(policy.delay(3), Duration::from_millis(2000));
    }

    async fn status_for(code: u16) -> FetchError {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(code))
            .mount(&server)
            .await;

        let http = HttpClient::new(DEFAULT_TIMEOUT).unwrap();
        let url = format!("{}/x", server.uri());
        let response = http
            .send(SourceId::SteamSpy, &RateLimiter::unlimited(), |c| c.get(&url))
            .await
            .unwrap();
        check_status(SourceId::SteamSpy, &response).unwrap_err()
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(status_for(404).await.kind, FetchErrorKind::NotFound);
        assert_eq!(status_for(403).await.kind, FetchErrorKind::AuthRequired);
        assert_eq!(status_for(401).await.kind, FetchErrorKind::AuthRequired);
        assert_eq!(status_for(429).await.kind, FetchErrorKind::RateLimited);

        let unavailable = status_for(503).await;
        assert_eq!(unavailable.kind, FetchErrorKind::SourceUnavailable);
        assert_eq!(unavailable.status, Some(503));
    }

    #[tokio::test]
    async fn test_transport_failure_is_599() {
        let http = HttpClient::new(Duration::from_secs(2))
            .unwrap()
            .with_retry(RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            });

        // Port 1 on loopback refuses connections
        let err = http
            .send(SourceId::SteamStore, &RateLimiter::unlimited(), |c| {
                c.get("http://127.0.0.1:1/")
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::SourceUnavailable);
        assert_eq!(err.status, Some(TRANSPORT_FAILURE_STATUS));
    }

    #[tokio::test]
    async fn test_read_json_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let http = HttpClient::new(DEFAULT_TIMEOUT).unwrap();
        let uri = server.uri();
        let response = http
            .send(SourceId::SteamSpy, &RateLimiter::unlimited(), |c| c.get(&uri))
            .await
            .unwrap();
        let err = read_json::<serde_json::Value>(response).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::ParseError);
    }

    #[tokio::test]
    async fn test_retries_wait_on_limiter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let clock = Arc::new(SimulatedClock::new());
        let budget = Budget::new(1, Duration::from_secs(60)).unwrap();
        let budgets = HashMap::from([(SourceId::SteamSpy, budget)]);
        let limiter = RateLimiter::with_clock(budgets, None, clock.clone());
        let http = HttpClient::new(Duration::from_millis(100))
            .unwrap()
            .with_retry(RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            });

        let uri = server.uri();
        let err = http
            .send(SourceId::SteamSpy, &limiter, |c| c.get(&uri))
            .await
            .unwrap_err();

        let received = server.received_requests().await.unwrap().len();
        assert_eq!(err.kind, FetchErrorKind::SourceUnavailable);
        assert_eq!(received, 3);
        // First attempt is free; each retry waits for the window to roll
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60); 2]);
    }
}
