//! Canonical game record schema
//!
//! The static table [`SCHEMA`] is the single source of truth for field order,
//! canonical type, and per-field source precedence. Records always carry
//! every field listed here, plus the leading `steam_appid` column.

use crate::raw::{Achievement, ContentRating, MonthlyActivePlayers};
use crate::types::SourceId;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::types::SourceId::{
    Gamalytic, HowLongToBeat, SteamAchievements, SteamCharts, SteamReview, SteamSpy, SteamStore,
};

/// Name of the identifier column that precedes every canonical field
pub const APPID_COLUMN: &str = "steam_appid";

/// Canonical field, declared in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name = 0,
    AppType,
    IsFree,
    IsComingSoon,
    Developers,
    Publishers,
    PriceCurrency,
    PriceInitial,
    PriceFinal,
    MetacriticScore,
    Recommendations,
    ReleaseDate,
    DaysSinceRelease,
    Platforms,
    Categories,
    Genres,
    ContentRating,
    AveragePlaytimeH,
    CopiesSold,
    EstimatedRevenue,
    Owners,
    Followers,
    Languages,
    Tags,
    Ccu,
    ActivePlayer24h,
    PeakActivePlayerAllTime,
    MonthlyActivePlayer,
    ReviewScore,
    ReviewScoreDesc,
    TotalPositive,
    TotalNegative,
    TotalReviews,
    AchievementsCount,
    AchievementsPercentageAverage,
    AchievementsList,
    CompMain,
    CompPlus,
    Comp100,
    CompAll,
    CompMainCount,
    CompPlusCount,
    Comp100Count,
    CompAllCount,
    InvestedCo,
    InvestedMp,
    InvestedCoCount,
    InvestedMpCount,
    CountComp,
    CountSpeedrun,
    CountBacklog,
    CountReview,
    CountPlaying,
    CountRetired,
    HltbReviewScore,
}

/// Canonical value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Bool,
    Integer,
    Float,
    TextList,
    Date,
    PlayerSeries,
    Achievements,
    ContentRatings,
}

/// One row of the schema table
#[derive(Debug)]
pub struct FieldSpec {
    pub field: Field,
    pub name: &'static str,
    pub kind: FieldKind,
    /// Owning sources, highest priority first
    pub precedence: &'static [SourceId],
}

const fn spec(
    field: Field,
    name: &'static str,
    kind: FieldKind,
    precedence: &'static [SourceId],
) -> FieldSpec {
    FieldSpec {
        field,
        name,
        kind,
        precedence,
    }
}

use self::FieldKind as K;

/// Canonical schema, indexed by `Field as usize`
pub static SCHEMA: &[FieldSpec] = &[
    spec(Field::Name, "name", K::Text, &[SteamStore, Gamalytic, SteamSpy, SteamCharts]),
    spec(Field::AppType, "type", K::Text, &[SteamStore]),
    spec(Field::IsFree, "is_free", K::Bool, &[SteamStore]),
    spec(Field::IsComingSoon, "is_coming_soon", K::Bool, &[SteamStore]),
    spec(Field::Developers, "developers", K::TextList, &[SteamStore, Gamalytic, SteamSpy]),
    spec(Field::Publishers, "publishers", K::TextList, &[SteamStore, Gamalytic, SteamSpy]),
    spec(Field::PriceCurrency, "price_currency", K::Text, &[SteamStore]),
    spec(Field::PriceInitial, "price_initial", K::Float, &[SteamStore, SteamSpy]),
    spec(Field::PriceFinal, "price_final", K::Float, &[SteamStore, SteamSpy]),
    spec(Field::MetacriticScore, "metacritic_score", K::Integer, &[SteamStore]),
    spec(Field::Recommendations, "recommendations", K::Integer, &[SteamStore]),
    spec(Field::ReleaseDate, "release_date", K::Date, &[SteamStore, Gamalytic]),
    spec(Field::DaysSinceRelease, "days_since_release", K::Integer, &[SteamStore, Gamalytic]),
    spec(Field::Platforms, "platforms", K::TextList, &[SteamStore]),
    spec(Field::Categories, "categories", K::TextList, &[SteamStore]),
    spec(Field::Genres, "genres", K::TextList, &[SteamStore, Gamalytic, SteamSpy]),
    spec(Field::ContentRating, "content_rating", K::ContentRatings, &[SteamStore]),
    spec(Field::AveragePlaytimeH, "average_playtime_h", K::Float, &[Gamalytic, SteamSpy]),
    spec(Field::CopiesSold, "copies_sold", K::Integer, &[Gamalytic]),
    spec(Field::EstimatedRevenue, "estimated_revenue", K::Integer, &[Gamalytic]),
    spec(Field::Owners, "owners", K::Integer, &[Gamalytic, SteamSpy]),
    spec(Field::Followers, "followers", K::Integer, &[Gamalytic]),
    spec(Field::Languages, "languages", K::TextList, &[Gamalytic, SteamSpy]),
    spec(Field::Tags, "tags", K::TextList, &[SteamSpy, Gamalytic]),
    spec(Field::Ccu, "ccu", K::Integer, &[SteamSpy]),
    spec(Field::ActivePlayer24h, "active_player_24h", K::Integer, &[SteamCharts]),
    spec(Field::PeakActivePlayerAllTime, "peak_active_player_all_time", K::Integer, &[SteamCharts]),
    spec(Field::MonthlyActivePlayer, "monthly_active_player", K::PlayerSeries, &[SteamCharts]),
    spec(Field::ReviewScore, "review_score", K::Integer, &[SteamReview]),
    spec(Field::ReviewScoreDesc, "review_score_desc", K::Text, &[SteamReview]),
    spec(Field::TotalPositive, "total_positive", K::Integer, &[SteamReview, SteamSpy]),
    spec(Field::TotalNegative, "total_negative", K::Integer, &[SteamReview, SteamSpy]),
    spec(Field::TotalReviews, "total_reviews", K::Integer, &[SteamReview]),
    spec(
        Field::AchievementsCount,
        "achievements_count",
        K::Integer,
        &[SteamAchievements, SteamStore],
    ),
    spec(
        Field::AchievementsPercentageAverage,
        "achievements_percentage_average",
        K::Float,
        &[SteamAchievements],
    ),
    spec(Field::AchievementsList, "achievements_list", K::Achievements, &[SteamAchievements]),
    spec(Field::CompMain, "comp_main", K::Float, &[HowLongToBeat]),
    spec(Field::CompPlus, "comp_plus", K::Float, &[HowLongToBeat]),
    spec(Field::Comp100, "comp_100", K::Float, &[HowLongToBeat]),
    spec(Field::CompAll, "comp_all", K::Float, &[HowLongToBeat]),
    spec(Field::CompMainCount, "comp_main_count", K::Integer, &[HowLongToBeat]),
    spec(Field::CompPlusCount, "comp_plus_count", K::Integer, &[HowLongToBeat]),
    spec(Field::Comp100Count, "comp_100_count", K::Integer, &[HowLongToBeat]),
    spec(Field::CompAllCount, "comp_all_count", K::Integer, &[HowLongToBeat]),
    spec(Field::InvestedCo, "invested_co", K::Float, &[HowLongToBeat]),
    spec(Field::InvestedMp, "invested_mp", K::Float, &[HowLongToBeat]),
    spec(Field::InvestedCoCount, "invested_co_count", K::Integer, &[HowLongToBeat]),
    spec(Field::InvestedMpCount, "invested_mp_count", K::Integer, &[HowLongToBeat]),
    spec(Field::CountComp, "count_comp", K::Integer, &[HowLongToBeat]),
    spec(Field::CountSpeedrun, "count_speedrun", K::Integer, &[HowLongToBeat]),
    spec(Field::CountBacklog, "count_backlog", K::Integer, &[HowLongToBeat]),
    spec(Field::CountReview, "count_review", K::Integer, &[HowLongToBeat]),
    spec(Field::CountPlaying, "count_playing", K::Integer, &[HowLongToBeat]),
    spec(Field::CountRetired, "count_retired", K::Integer, &[HowLongToBeat]),
    spec(Field::HltbReviewScore, "hltb_review_score", K::Integer, &[HowLongToBeat]),
];

/// Recap projection, in output order (after `steam_appid`)
pub const RECAP: &[Field] = &[
    Field::Name,
    Field::Developers,
    Field::Publishers,
    Field::ReleaseDate,
    Field::DaysSinceRelease,
    Field::PriceCurrency,
    Field::PriceInitial,
    Field::PriceFinal,
    Field::CopiesSold,
    Field::EstimatedRevenue,
    Field::Owners,
    Field::TotalPositive,
    Field::TotalNegative,
    Field::TotalReviews,
    Field::CompMain,
    Field::CompPlus,
    Field::Comp100,
    Field::CompAll,
    Field::InvestedCo,
    Field::InvestedMp,
    Field::AveragePlaytimeH,
    Field::ActivePlayer24h,
    Field::PeakActivePlayerAllTime,
    Field::AchievementsCount,
    Field::AchievementsPercentageAverage,
    Field::Categories,
    Field::Genres,
    Field::Tags,
];

impl Field {
    /// Every canonical field in output order
    pub fn all() -> impl Iterator<Item = Field> {
        SCHEMA.iter().map(|s| s.field)
    }

    pub fn spec(self) -> &'static FieldSpec {
        &SCHEMA[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn kind(self) -> FieldKind {
        self.spec().kind
    }

    pub fn precedence(self) -> &'static [SourceId] {
        self.spec().precedence
    }
}

/// Fields owned by at least one of `sources`, in output order
pub fn fields_for_sources(sources: &[SourceId]) -> Vec<Field> {
    SCHEMA
        .iter()
        .filter(|s| s.precedence.iter().any(|p| sources.contains(p)))
        .map(|s| s.field)
        .collect()
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SCHEMA
            .iter()
            .find(|spec| spec.name == s)
            .map(|spec| spec.field)
            .ok_or_else(|| format!("Unknown field '{}'", s))
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ============================================================================
// Values
// ============================================================================

/// Canonical field value
///
/// `Absent`: no source supplied the field. `Null`: a source supplied it but
/// the value could not be coerced. Both serialize as JSON `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Absent,
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
    Date(NaiveDate),
    PlayerSeries(Vec<MonthlyActivePlayers>),
    Achievements(Vec<Achievement>),
    ContentRatings(Vec<ContentRating>),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form used for table cells
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Absent | FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::TextList(items) => f.write_str(&items.join(", ")),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            other => write!(f, "{}", other.to_json()),
        }
    }
}
