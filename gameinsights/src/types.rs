//! Base traits and types for the fetch pipeline
//!
//! Defines the `SourceFetcher` trait implemented by every provider, the
//! per-fetch options, and the success/failure envelope each fetch returns.

use crate::error::CollectorError;
use crate::ratelimit::RateLimiter;
use crate::raw::RawData;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Source identity
// ============================================================================

/// Data provider identity
///
/// Ordering follows the declaration order, which is also the order sources
/// are dispatched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    SteamStore,
    Gamalytic,
    SteamSpy,
    SteamCharts,
    SteamReview,
    SteamAchievements,
    HowLongToBeat,
    SteamUser,
}

impl SourceId {
    /// Every provider, dispatch order
    pub const ALL: [SourceId; 8] = [
        SourceId::SteamStore,
        SourceId::Gamalytic,
        SourceId::SteamSpy,
        SourceId::SteamCharts,
        SourceId::SteamReview,
        SourceId::SteamAchievements,
        SourceId::HowLongToBeat,
        SourceId::SteamUser,
    ];

    /// Providers that contribute to the game record
    pub const GAME_SOURCES: [SourceId; 7] = [
        SourceId::SteamStore,
        SourceId::Gamalytic,
        SourceId::SteamSpy,
        SourceId::SteamCharts,
        SourceId::SteamReview,
        SourceId::SteamAchievements,
        SourceId::HowLongToBeat,
    ];

    /// Stable lowercase name used in logs, provenance and CLI filters
    pub fn name(&self) -> &'static str {
        match self {
            SourceId::SteamStore => "steamstore",
            SourceId::Gamalytic => "gamalytic",
            SourceId::SteamSpy => "steamspy",
            SourceId::SteamCharts => "steamcharts",
            SourceId::SteamReview => "steamreview",
            SourceId::SteamAchievements => "steamachievements",
            SourceId::HowLongToBeat => "howlongtobeat",
            SourceId::SteamUser => "steamuser",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceId {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SourceId::ALL
            .into_iter()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| CollectorError::InvalidConfig(format!("Unknown source '{}'", s)))
    }
}

/// What a fetcher expects as its lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey {
    /// Steam application id (first pass)
    AppId,
    /// Game title resolved from first-pass results (second pass)
    GameName,
    /// 64-bit Steam user id
    SteamId,
}

// ============================================================================
// Fetch options
// ============================================================================

/// Review endpoint mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewMode {
    /// Only the aggregate `query_summary` (one request)
    #[default]
    Summary,
    /// Individual reviews, cursor-paginated
    Listing,
}

/// Review listing filters, passed through to the Steam reviews endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewQuery {
    /// "recent", "updated" or "all"
    pub filter: String,
    /// Review language, "all" for every language
    pub language: String,
    /// "all", "positive" or "negative"
    pub review_type: String,
    /// "all", "steam" or "non_steam_purchase"
    pub purchase_type: String,
    /// Reviews per page (provider maximum is 100)
    pub num_per_page: u32,
    /// Page cap for one listing
    pub max_pages: u32,
}

impl Default for ReviewQuery {
    fn default() -> Self {
        Self {
            filter: "recent".to_string(),
            language: "all".to_string(),
            review_type: "all".to_string(),
            purchase_type: "all".to_string(),
            num_per_page: 100,
            max_pages: 10,
        }
    }
}

/// Options shared by every fetch in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Steam store country code (`cc`)
    pub region: String,
    /// Steam store language (`l`)
    pub language: String,
    /// Include played free games in a user's owned-games list
    pub include_free_games: bool,
    pub steam_api_key: Option<String>,
    pub gamalytic_api_key: Option<String>,
    pub review_mode: ReviewMode,
    pub review_query: ReviewQuery,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            region: "us".to_string(),
            language: "english".to_string(),
            include_free_games: true,
            steam_api_key: None,
            gamalytic_api_key: None,
            review_mode: ReviewMode::Summary,
            review_query: ReviewQuery::default(),
        }
    }
}

// ============================================================================
// Fetch errors
// ============================================================================

/// Failure category of one source fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Transport failure or unexpected HTTP status
    SourceUnavailable,
    /// Provider has no data for the key
    NotFound,
    /// Missing or rejected API key
    AuthRequired,
    /// Response body did not match the provider's schema
    ParseError,
    /// Provider answered 429 (the limiter should have prevented this)
    RateLimited,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchErrorKind::SourceUnavailable => "source unavailable",
            FetchErrorKind::NotFound => "not found",
            FetchErrorKind::AuthRequired => "auth required",
            FetchErrorKind::ParseError => "parse error",
            FetchErrorKind::RateLimited => "rate limited",
        };
        f.write_str(s)
    }
}

/// Per-source failure descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    /// HTTP status, or 599 for transport failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotFound, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::SourceUnavailable, message)
    }

    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::AuthRequired, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::ParseError, message)
    }
}

// ============================================================================
// Source result envelope
// ============================================================================

/// Outcome of one source fetch
///
/// Serializes exactly as `{"success": true, "data": ...}` or
/// `{"success": false, "error": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResult<T> {
    Success { data: T },
    Failure { error: FetchError },
}

/// Fetch outcome carrying a provider's typed raw payload
pub type RawFragment = SourceResult<RawData>;

impl<T> SourceResult<T> {
    pub fn success(data: T) -> Self {
        SourceResult::Success { data }
    }

    pub fn failure(error: FetchError) -> Self {
        SourceResult::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SourceResult::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            SourceResult::Success { data } => Some(data),
            SourceResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            SourceResult::Success { .. } => None,
            SourceResult::Failure { error } => Some(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SourceResult<U> {
        match self {
            SourceResult::Success { data } => SourceResult::Success { data: f(data) },
            SourceResult::Failure { error } => SourceResult::Failure { error },
        }
    }
}

impl<T> From<Result<T, FetchError>> for SourceResult<T> {
    fn from(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(data) => SourceResult::Success { data },
            Err(error) => SourceResult::Failure { error },
        }
    }
}

impl<T: Serialize> Serialize for SourceResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SourceResult", 2)?;
        match self {
            SourceResult::Success { data } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            SourceResult::Failure { error } => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

// ============================================================================
// Source fetcher trait
// ============================================================================

/// One data provider
///
/// Implementations must not panic and must report ordinary failures (network,
/// not found, auth, parse) as `SourceResult::Failure`. Every network request,
/// including each page of a paginated call, is preceded by
/// `limiter.acquire(self.source())`.
///
/// # Example
/// ```rust,ignore
/// #[async_trait]
/// impl SourceFetcher for MyFetcher {
///     fn source(&self) -> SourceId { SourceId::SteamSpy }
///
///     async fn fetch(
///         &self,
///         key: &str,
///         options: &FetchOptions,
///         limiter: &RateLimiter,
///     ) -> RawFragment {
///         limiter.acquire(self.source()).await;
///         // request, parse, wrap in RawData::SteamSpy(...)
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Provider identity, used for rate limiting and precedence
    fn source(&self) -> SourceId;

    /// Key this fetcher looks up by
    fn lookup(&self) -> LookupKey {
        LookupKey::AppId
    }

    /// Fetch raw data for `key`
    async fn fetch(&self, key: &str, options: &FetchOptions, limiter: &RateLimiter)
        -> RawFragment;
}
