//! Raw provider payloads
//!
//! One struct per provider, holding the fields each provider declares before
//! any coercion. Loosely typed values (numbers that arrive as strings, lists
//! that arrive as comma-separated text) stay as `serde_json::Value` so the
//! normalizer can apply one coercion policy everywhere.
//!
//! Structs deserialize straight from provider JSON (`alias` covers the
//! provider's camelCase names) and serialize with snake_case names.

use crate::types::SourceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed union of provider payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawData {
    SteamStore(SteamStoreData),
    Gamalytic(GamalyticData),
    SteamSpy(SteamSpyData),
    SteamCharts(SteamChartsData),
    ReviewSummary(ReviewSummary),
    ReviewListing(ReviewListing),
    SteamAchievements(AchievementsData),
    HowLongToBeat(HltbData),
    SteamUser(SteamUserData),
}

impl RawData {
    /// Provider that produced this payload
    pub fn source(&self) -> SourceId {
        match self {
            RawData::SteamStore(_) => SourceId::SteamStore,
            RawData::Gamalytic(_) => SourceId::Gamalytic,
            RawData::SteamSpy(_) => SourceId::SteamSpy,
            RawData::SteamCharts(_) => SourceId::SteamCharts,
            RawData::ReviewSummary(_) | RawData::ReviewListing(_) => SourceId::SteamReview,
            RawData::SteamAchievements(_) => SourceId::SteamAchievements,
            RawData::HowLongToBeat(_) => SourceId::HowLongToBeat,
            RawData::SteamUser(_) => SourceId::SteamUser,
        }
    }
}

// ============================================================================
// Steam Store
// ============================================================================

/// Steam store `appdetails` payload, flattened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteamStoreData {
    pub steam_appid: Option<Value>,
    pub name: Option<Value>,
    #[serde(rename = "type")]
    pub app_type: Option<Value>,
    pub is_free: Option<Value>,
    pub is_coming_soon: Option<Value>,
    /// Display date, e.g. "9 Jul, 2013"
    pub release_date: Option<Value>,
    pub developers: Option<Value>,
    pub publishers: Option<Value>,
    pub price_currency: Option<Value>,
    /// Cents
    pub price_initial: Option<Value>,
    /// Cents
    pub price_final: Option<Value>,
    pub platforms: Vec<String>,
    pub categories: Vec<String>,
    pub genres: Vec<String>,
    pub metacritic_score: Option<Value>,
    pub recommendations: Option<Value>,
    pub achievements: Option<Value>,
    pub content_rating: Vec<ContentRating>,
}

/// One regional content rating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRating {
    pub rating_type: String,
    pub rating: String,
}

// ============================================================================
// Gamalytic
// ============================================================================

/// Gamalytic `game/{appid}` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamalyticData {
    #[serde(alias = "steamId")]
    pub steam_appid: Option<Value>,
    pub name: Option<Value>,
    pub price: Option<Value>,
    pub reviews: Option<Value>,
    #[serde(alias = "reviewScore")]
    pub review_score: Option<Value>,
    pub followers: Option<Value>,
    /// Hours
    #[serde(alias = "avgPlaytime")]
    pub average_playtime: Option<Value>,
    pub tags: Option<Value>,
    pub genres: Option<Value>,
    pub languages: Option<Value>,
    pub developers: Option<Value>,
    pub publishers: Option<Value>,
    /// Epoch milliseconds
    #[serde(alias = "releaseDate")]
    pub release_date: Option<Value>,
    #[serde(alias = "earlyAccess")]
    pub early_access: Option<Value>,
    #[serde(alias = "copiesSold")]
    pub copies_sold: Option<Value>,
    pub revenue: Option<Value>,
    pub players: Option<Value>,
    pub owners: Option<Value>,
}

// ============================================================================
// SteamSpy
// ============================================================================

/// SteamSpy `appdetails` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteamSpyData {
    #[serde(alias = "appid")]
    pub steam_appid: Option<Value>,
    pub name: Option<Value>,
    /// Comma-separated
    #[serde(alias = "developer")]
    pub developers: Option<Value>,
    /// Comma-separated
    #[serde(alias = "publisher")]
    pub publishers: Option<Value>,
    #[serde(alias = "positive")]
    pub positive_reviews: Option<Value>,
    #[serde(alias = "negative")]
    pub negative_reviews: Option<Value>,
    /// Range text, e.g. "100,000,000 .. 200,000,000"
    pub owners: Option<Value>,
    /// Minutes
    pub average_forever: Option<Value>,
    /// Minutes
    pub average_2weeks: Option<Value>,
    pub median_forever: Option<Value>,
    pub median_2weeks: Option<Value>,
    /// Cents
    pub price: Option<Value>,
    /// Cents
    #[serde(alias = "initialprice")]
    pub initial_price: Option<Value>,
    pub discount: Option<Value>,
    pub ccu: Option<Value>,
    /// Comma-separated
    pub languages: Option<Value>,
    /// Comma-separated
    #[serde(alias = "genre")]
    pub genres: Option<Value>,
    /// Map of tag → votes (or `[]` when empty)
    pub tags: Option<Value>,
}

// ============================================================================
// SteamCharts
// ============================================================================

/// SteamCharts app page, scraped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteamChartsData {
    pub name: Option<Value>,
    pub active_player_24h: Option<Value>,
    pub peak_active_player_all_time: Option<Value>,
    pub monthly_active_player: Vec<MonthlyActivePlayers>,
}

/// One row of the monthly player table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyActivePlayers {
    /// `YYYY-MM`
    pub month: String,
    pub average_players: Option<f64>,
    pub gain: Option<f64>,
    pub percentage_gain: f64,
    pub peak_players: Option<i64>,
}

// ============================================================================
// Steam reviews
// ============================================================================

/// `query_summary` of the reviews endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSummary {
    pub review_score: Option<Value>,
    pub review_score_desc: Option<Value>,
    pub total_positive: Option<Value>,
    pub total_negative: Option<Value>,
    pub total_reviews: Option<Value>,
}

/// Individual reviews collected across pages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewListing {
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(alias = "recommendationid")]
    pub recommendation_id: Option<String>,
    #[serde(default)]
    pub author: ReviewAuthor,
    pub language: Option<String>,
    pub review: Option<String>,
    pub timestamp_created: Option<i64>,
    pub timestamp_updated: Option<i64>,
    pub voted_up: Option<bool>,
    pub votes_up: Option<i64>,
    pub votes_funny: Option<i64>,
    pub weighted_vote_score: Option<Value>,
    pub comment_count: Option<i64>,
    pub steam_purchase: Option<bool>,
    pub received_for_free: Option<bool>,
    pub written_during_early_access: Option<bool>,
    pub primarily_steam_deck: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewAuthor {
    pub steamid: Option<String>,
    pub num_games_owned: Option<i64>,
    pub num_reviews: Option<i64>,
    pub playtime_forever: Option<i64>,
    pub playtime_last_two_weeks: Option<i64>,
    pub playtime_at_review: Option<i64>,
    pub last_played: Option<i64>,
}

// ============================================================================
// Steam achievements
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchievementsData {
    pub achievements: Vec<Achievement>,
}

/// Global unlock percentage, enriched with schema text when available
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub name: String,
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

// ============================================================================
// HowLongToBeat
// ============================================================================

/// First search hit from HowLongToBeat; times are in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HltbData {
    pub game_id: Option<Value>,
    pub game_name: Option<Value>,
    pub game_type: Option<Value>,
    pub comp_main: Option<Value>,
    pub comp_plus: Option<Value>,
    pub comp_100: Option<Value>,
    pub comp_all: Option<Value>,
    pub comp_main_count: Option<Value>,
    pub comp_plus_count: Option<Value>,
    pub comp_100_count: Option<Value>,
    pub comp_all_count: Option<Value>,
    pub invested_co: Option<Value>,
    pub invested_mp: Option<Value>,
    pub invested_co_count: Option<Value>,
    pub invested_mp_count: Option<Value>,
    pub count_comp: Option<Value>,
    pub count_speedrun: Option<Value>,
    pub count_backlog: Option<Value>,
    pub count_review: Option<Value>,
    pub review_score: Option<Value>,
    pub count_playing: Option<Value>,
    pub count_retired: Option<Value>,
}

// ============================================================================
// Steam user
// ============================================================================

/// Profile summary plus game lists (lists stay empty for private profiles)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteamUserData {
    pub summary: UserSummary,
    pub owned_games: OwnedGames,
    pub recently_played_games: RecentlyPlayedGames,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub steamid: Option<String>,
    /// 1 = private, 3 = public
    #[serde(alias = "communityvisibilitystate", default = "private_visibility")]
    pub community_visibility_state: i64,
    #[serde(alias = "profilestate", default)]
    pub profile_state: Option<i64>,
    #[serde(alias = "personaname", default)]
    pub persona_name: Option<String>,
    #[serde(alias = "profileurl", default)]
    pub profile_url: Option<String>,
    #[serde(alias = "lastlogoff", default)]
    pub last_log_off: Option<i64>,
    #[serde(alias = "realname", default)]
    pub real_name: Option<String>,
    #[serde(alias = "timecreated", default)]
    pub time_created: Option<i64>,
    #[serde(alias = "loccountrycode", default)]
    pub loc_country_code: Option<String>,
    #[serde(alias = "locstatecode", default)]
    pub loc_state_code: Option<String>,
    #[serde(alias = "loccityid", default)]
    pub loc_city_id: Option<i64>,
}

/// Visibility value Steam reports for public profiles
pub const PUBLIC_VISIBILITY: i64 = 3;

fn private_visibility() -> i64 {
    1
}

impl Default for UserSummary {
    fn default() -> Self {
        Self {
            steamid: None,
            community_visibility_state: private_visibility(),
            profile_state: None,
            persona_name: None,
            profile_url: None,
            last_log_off: None,
            real_name: None,
            time_created: None,
            loc_country_code: None,
            loc_state_code: None,
            loc_city_id: None,
        }
    }
}

impl UserSummary {
    pub fn is_public(&self) -> bool {
        self.community_visibility_state == PUBLIC_VISIBILITY
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnedGames {
    pub game_count: u64,
    pub games: Vec<OwnedGame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedGame {
    pub appid: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Minutes
    #[serde(default)]
    pub playtime_forever: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playtime_2weeks: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentlyPlayedGames {
    #[serde(alias = "total_count")]
    pub games_count: u64,
    /// Minutes, summed over `games`
    pub total_playtime_2weeks: u64,
    pub games: Vec<RecentGame>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentGame {
    pub appid: Option<u64>,
    pub name: Option<String>,
    pub playtime_2weeks: u64,
    pub playtime_forever: u64,
}
