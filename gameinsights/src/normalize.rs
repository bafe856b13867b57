//! Field normalizer
//!
//! Maps each provider's raw payload onto canonical fields with one coercion
//! policy:
//! - missing, `null` or empty text → `Absent`
//! - present but uncoercible → `Null`
//! - numeric strings are accepted with thousands separators and whitespace
//! - dates accept ISO, Steam display formats and epoch seconds/milliseconds
//!
//! Unit conversions (cents → units, minutes/seconds → hours) and derived
//! fields (`days_since_release`) happen here. Normalization is pure: the
//! reference time is an explicit argument.

use crate::raw::{
    AchievementsData, GamalyticData, HltbData, RawData, ReviewSummary, SteamChartsData,
    SteamSpyData, SteamStoreData,
};
use crate::schema::{Field, FieldValue};
use crate::types::{RawFragment, SourceId};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Epoch values at or above this are taken as milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%d %b, %Y", "%B %d, %Y", "%d %B, %Y"];

static ABSENT: FieldValue = FieldValue::Absent;

/// Canonical values contributed by one source for one identifier
///
/// Only supplied fields (anything but `Absent`) are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFragment {
    pub source: SourceId,
    values: BTreeMap<Field, FieldValue>,
}

impl NormalizedFragment {
    pub fn empty(source: SourceId) -> Self {
        Self {
            source,
            values: BTreeMap::new(),
        }
    }

    /// Value for `field`, `Absent` when not supplied
    pub fn get(&self, field: Field) -> &FieldValue {
        self.values.get(&field).unwrap_or(&ABSENT)
    }

    pub fn insert(&mut self, field: Field, value: FieldValue) {
        if value.is_absent() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Supplied fields in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }
}

/// Normalize one fetch outcome
///
/// Failures, and payloads that do not belong to `source`, produce an empty
/// fragment.
pub fn normalize(
    source: SourceId,
    fragment: &RawFragment,
    now: DateTime<Utc>,
) -> NormalizedFragment {
    let Some(data) = fragment.data() else {
        return NormalizedFragment::empty(source);
    };

    if data.source() != source {
        warn!(
            source = %source,
            payload = %data.source(),
            "Payload does not belong to source, ignoring"
        );
        return NormalizedFragment::empty(source);
    }

    let mut out = NormalizedFragment::empty(source);
    match data {
        RawData::SteamStore(d) => steam_store(d, now, &mut out),
        RawData::Gamalytic(d) => gamalytic(d, now, &mut out),
        RawData::SteamSpy(d) => steamspy(d, &mut out),
        RawData::SteamCharts(d) => steamcharts(d, &mut out),
        RawData::ReviewSummary(d) => review_summary(d, &mut out),
        RawData::SteamAchievements(d) => achievements(d, &mut out),
        RawData::HowLongToBeat(d) => howlongtobeat(d, &mut out),
        // Not part of the game record
        RawData::ReviewListing(_) | RawData::SteamUser(_) => {}
    }
    out
}

// ============================================================================
// Per-source mappings
// ============================================================================

fn steam_store(d: &SteamStoreData, now: DateTime<Utc>, out: &mut NormalizedFragment) {
    out.insert(Field::Name, coerce_text(d.name.as_ref()));
    out.insert(Field::AppType, coerce_text(d.app_type.as_ref()));
    out.insert(Field::IsFree, coerce_bool(d.is_free.as_ref()));
    out.insert(Field::IsComingSoon, coerce_bool(d.is_coming_soon.as_ref()));
    out.insert(Field::Developers, coerce_list(d.developers.as_ref()));
    out.insert(Field::Publishers, coerce_list(d.publishers.as_ref()));
    out.insert(Field::PriceCurrency, coerce_text(d.price_currency.as_ref()));
    out.insert(Field::PriceInitial, cents_to_units(d.price_initial.as_ref()));
    out.insert(Field::PriceFinal, cents_to_units(d.price_final.as_ref()));
    out.insert(Field::MetacriticScore, coerce_int(d.metacritic_score.as_ref()));
    out.insert(Field::Recommendations, coerce_int(d.recommendations.as_ref()));
    out.insert(Field::Platforms, string_list(&d.platforms));
    out.insert(Field::Categories, string_list(&d.categories));
    out.insert(Field::Genres, string_list(&d.genres));
    if !d.content_rating.is_empty() {
        out.insert(Field::ContentRating, FieldValue::ContentRatings(d.content_rating.clone()));
    }
    out.insert(Field::AchievementsCount, coerce_int(d.achievements.as_ref()));
    release(d.release_date.as_ref(), now, out);
}

fn gamalytic(d: &GamalyticData, now: DateTime<Utc>, out: &mut NormalizedFragment) {
    out.insert(Field::Name, coerce_text(d.name.as_ref()));
    out.insert(Field::Developers, coerce_list(d.developers.as_ref()));
    out.insert(Field::Publishers, coerce_list(d.publishers.as_ref()));
    out.insert(Field::Genres, coerce_list(d.genres.as_ref()));
    out.insert(Field::Languages, coerce_list(d.languages.as_ref()));
    out.insert(Field::Tags, coerce_list(d.tags.as_ref()));
    out.insert(Field::AveragePlaytimeH, round2(coerce_float(d.average_playtime.as_ref())));
    out.insert(Field::CopiesSold, coerce_int(d.copies_sold.as_ref()));
    out.insert(Field::EstimatedRevenue, coerce_int(d.revenue.as_ref()));
    out.insert(Field::Owners, coerce_int(d.owners.as_ref()));
    out.insert(Field::Followers, coerce_int(d.followers.as_ref()));
    release(d.release_date.as_ref(), now, out);
}

fn steamspy(d: &SteamSpyData, out: &mut NormalizedFragment) {
    out.insert(Field::Name, coerce_text(d.name.as_ref()));
    out.insert(Field::Developers, coerce_list(d.developers.as_ref()));
    out.insert(Field::Publishers, coerce_list(d.publishers.as_ref()));
    out.insert(Field::Genres, coerce_list(d.genres.as_ref()));
    out.insert(Field::Languages, coerce_list(d.languages.as_ref()));
    out.insert(Field::Tags, coerce_list(d.tags.as_ref()));
    out.insert(Field::TotalPositive, coerce_int(d.positive_reviews.as_ref()));
    out.insert(Field::TotalNegative, coerce_int(d.negative_reviews.as_ref()));
    out.insert(Field::Owners, owners_lower_bound(d.owners.as_ref()));
    out.insert(Field::AveragePlaytimeH, scale_to_hours(d.average_forever.as_ref(), 60.0));
    out.insert(Field::PriceInitial, cents_to_units(d.initial_price.as_ref()));
    out.insert(Field::PriceFinal, cents_to_units(d.price.as_ref()));
    out.insert(Field::Ccu, coerce_int(d.ccu.as_ref()));
}

fn steamcharts(d: &SteamChartsData, out: &mut NormalizedFragment) {
    out.insert(Field::Name, coerce_text(d.name.as_ref()));
    out.insert(Field::ActivePlayer24h, coerce_int(d.active_player_24h.as_ref()));
    out.insert(
        Field::PeakActivePlayerAllTime,
        coerce_int(d.peak_active_player_all_time.as_ref()),
    );
    if !d.monthly_active_player.is_empty() {
        out.insert(
            Field::MonthlyActivePlayer,
            FieldValue::PlayerSeries(d.monthly_active_player.clone()),
        );
    }
}

fn review_summary(d: &ReviewSummary, out: &mut NormalizedFragment) {
    out.insert(Field::ReviewScore, coerce_int(d.review_score.as_ref()));
    out.insert(Field::ReviewScoreDesc, coerce_text(d.review_score_desc.as_ref()));
    out.insert(Field::TotalPositive, coerce_int(d.total_positive.as_ref()));
    out.insert(Field::TotalNegative, coerce_int(d.total_negative.as_ref()));
    out.insert(Field::TotalReviews, coerce_int(d.total_reviews.as_ref()));
}

fn achievements(d: &AchievementsData, out: &mut NormalizedFragment) {
    if d.achievements.is_empty() {
        return;
    }
    let count = d.achievements.len();
    let total: f64 = d.achievements.iter().map(|a| a.percent).sum();

    out.insert(Field::AchievementsCount, FieldValue::Integer(count as i64));
    out.insert(
        Field::AchievementsPercentageAverage,
        FieldValue::Float(round_2dp(total / count as f64)),
    );
    out.insert(Field::AchievementsList, FieldValue::Achievements(d.achievements.clone()));
}

fn howlongtobeat(d: &HltbData, out: &mut NormalizedFragment) {
    let hours = |v: &Option<Value>| scale_to_hours(v.as_ref(), 3600.0);
    let int = |v: &Option<Value>| coerce_int(v.as_ref());

    out.insert(Field::CompMain, hours(&d.comp_main));
    out.insert(Field::CompPlus, hours(&d.comp_plus));
    out.insert(Field::Comp100, hours(&d.comp_100));
    out.insert(Field::CompAll, hours(&d.comp_all));
    out.insert(Field::CompMainCount, int(&d.comp_main_count));
    out.insert(Field::CompPlusCount, int(&d.comp_plus_count));
    out.insert(Field::Comp100Count, int(&d.comp_100_count));
    out.insert(Field::CompAllCount, int(&d.comp_all_count));
    out.insert(Field::InvestedCo, hours(&d.invested_co));
    out.insert(Field::InvestedMp, hours(&d.invested_mp));
    out.insert(Field::InvestedCoCount, int(&d.invested_co_count));
    out.insert(Field::InvestedMpCount, int(&d.invested_mp_count));
    out.insert(Field::CountComp, int(&d.count_comp));
    out.insert(Field::CountSpeedrun, int(&d.count_speedrun));
    out.insert(Field::CountBacklog, int(&d.count_backlog));
    out.insert(Field::CountReview, int(&d.count_review));
    out.insert(Field::CountPlaying, int(&d.count_playing));
    out.insert(Field::CountRetired, int(&d.count_retired));
    out.insert(Field::HltbReviewScore, int(&d.review_score));
}

/// `release_date` plus the derived `days_since_release`
fn release(raw: Option<&Value>, now: DateTime<Utc>, out: &mut NormalizedFragment) {
    let date = coerce_date(raw);
    let days = match &date {
        FieldValue::Date(d) => FieldValue::Integer((now.date_naive() - *d).num_days()),
        FieldValue::Null => FieldValue::Null,
        _ => FieldValue::Absent,
    };
    out.insert(Field::ReleaseDate, date);
    out.insert(Field::DaysSinceRelease, days);
}

// ============================================================================
// Coercion
// ============================================================================

fn clean_number(s: &str) -> String {
    s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect()
}

/// Integer; floats truncate toward zero
pub fn coerce_int(value: Option<&Value>) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Absent,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .map(FieldValue::Integer)
            .unwrap_or(FieldValue::Null),
        Some(Value::String(s)) => {
            let cleaned = clean_number(s);
            if cleaned.is_empty() {
                return FieldValue::Absent;
            }
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    cleaned
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .map(FieldValue::Integer)
                .unwrap_or(FieldValue::Null)
        }
        Some(_) => FieldValue::Null,
    }
}

pub fn coerce_float(value: Option<&Value>) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Absent,
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Null),
        Some(Value::String(s)) => {
            let cleaned = clean_number(s);
            if cleaned.is_empty() {
                return FieldValue::Absent;
            }
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(FieldValue::Float)
                .unwrap_or(FieldValue::Null)
        }
        Some(_) => FieldValue::Null,
    }
}

pub fn coerce_text(value: Option<&Value>) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Absent,
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                FieldValue::Absent
            } else {
                FieldValue::Text(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => FieldValue::Text(n.to_string()),
        Some(_) => FieldValue::Null,
    }
}

pub fn coerce_bool(value: Option<&Value>) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Absent,
        Some(Value::Bool(b)) => FieldValue::Bool(*b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => FieldValue::Bool(false),
            Some(1) => FieldValue::Bool(true),
            _ => FieldValue::Null,
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => FieldValue::Absent,
            "true" | "1" | "yes" => FieldValue::Bool(true),
            "false" | "0" | "no" => FieldValue::Bool(false),
            _ => FieldValue::Null,
        },
        Some(_) => FieldValue::Null,
    }
}

/// List of strings
///
/// Accepts an array of scalars, comma-separated text, or a map of
/// name → weight (ordered by descending weight, then name).
pub fn coerce_list(value: Option<&Value>) -> FieldValue {
    let items: Option<Vec<String>> = match value {
        None | Some(Value::Null) => return FieldValue::Absent,
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => Some(s.split(',').map(|p| p.trim().to_string()).collect()),
        Some(Value::Object(map)) => {
            let mut weighted: Vec<(&String, f64)> = map
                .iter()
                .map(|(k, v)| (k, v.as_f64().unwrap_or(0.0)))
                .collect();
            weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            Some(weighted.into_iter().map(|(k, _)| k.clone()).collect())
        }
        Some(_) => None,
    };

    match items {
        None => FieldValue::Null,
        Some(items) => string_list(&items),
    }
}

fn string_list(items: &[String]) -> FieldValue {
    let items: Vec<String> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        FieldValue::Absent
    } else {
        FieldValue::TextList(items)
    }
}

pub fn coerce_date(value: Option<&Value>) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Absent,
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(epoch_to_date)
            .map(FieldValue::Date)
            .unwrap_or(FieldValue::Null),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return FieldValue::Absent;
            }
            parse_date_text(trimmed)
                .map(FieldValue::Date)
                .unwrap_or(FieldValue::Null)
        }
        Some(_) => FieldValue::Null,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| s.parse::<f64>().ok().and_then(epoch_to_date))
}

fn epoch_to_date(epoch: f64) -> Option<NaiveDate> {
    if !epoch.is_finite() {
        return None;
    }
    let secs = if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        epoch / 1000.0
    } else {
        epoch
    };
    DateTime::from_timestamp(secs.trunc() as i64, 0).map(|dt| dt.date_naive())
}

/// SteamSpy owner ranges ("20,000 .. 50,000") keep the lower bound
fn owners_lower_bound(value: Option<&Value>) -> FieldValue {
    match value {
        Some(Value::String(s)) if s.contains("..") => {
            let lower = s.split("..").next().unwrap_or_default();
            coerce_int(Some(&Value::String(lower.to_string())))
        }
        other => coerce_int(other),
    }
}

fn cents_to_units(value: Option<&Value>) -> FieldValue {
    match coerce_float(value) {
        FieldValue::Float(cents) => FieldValue::Float(round_2dp(cents / 100.0)),
        other => other,
    }
}

fn scale_to_hours(value: Option<&Value>, units_per_hour: f64) -> FieldValue {
    match coerce_float(value) {
        FieldValue::Float(x) => FieldValue::Float(round_2dp(x / units_per_hour)),
        other => other,
    }
}

fn round2(value: FieldValue) -> FieldValue {
    match value {
        FieldValue::Float(x) => FieldValue::Float(round_2dp(x)),
        other => other,
    }
}

fn round_2dp(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{Achievement, ReviewListing};
    use crate::types::FetchError;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(coerce_int(Some(&json!(42))), FieldValue::Integer(42));
        assert_eq!(coerce_int(Some(&json!("1,234,567"))), FieldValue::Integer(1_234_567));
        assert_eq!(coerce_int(Some(&json!(" 12 "))), FieldValue::Integer(12));
        assert_eq!(coerce_int(Some(&json!(9.9))), FieldValue::Integer(9));
        assert_eq!(coerce_int(Some(&json!(""))), FieldValue::Absent);
        assert_eq!(coerce_int(Some(&json!(null))), FieldValue::Absent);
        assert_eq!(coerce_int(None), FieldValue::Absent);
        assert_eq!(coerce_int(Some(&json!("n/a"))), FieldValue::Null);
        assert_eq!(coerce_int(Some(&json!([1]))), FieldValue::Null);
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(coerce_float(Some(&json!("2,500.5"))), FieldValue::Float(2500.5));
        assert_eq!(coerce_float(Some(&json!(3))), FieldValue::Float(3.0));
        assert_eq!(coerce_float(Some(&json!({"a": 1}))), FieldValue::Null);
    }

    #[test]
    fn test_list_coercion() {
        assert_eq!(
            coerce_list(Some(&json!("Valve, Hidden Path"))),
            FieldValue::TextList(vec!["Valve".into(), "Hidden Path".into()])
        );
        assert_eq!(
            coerce_list(Some(&json!(["Action", " Free to Play "]))),
            FieldValue::TextList(vec!["Action".into(), "Free to Play".into()])
        );
        assert_eq!(
            coerce_list(Some(&json!({"FPS": 90, "Action": 120, "Shooter": 90}))),
            FieldValue::TextList(vec!["Action".into(), "FPS".into(), "Shooter".into()])
        );
        assert_eq!(coerce_list(Some(&json!([]))), FieldValue::Absent);
        assert_eq!(coerce_list(Some(&json!(""))), FieldValue::Absent);
        assert_eq!(coerce_list(Some(&json!([{"x": 1}]))), FieldValue::Null);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(coerce_date(Some(&json!("2013-07-09"))), FieldValue::Date(date(2013, 7, 9)));
        assert_eq!(coerce_date(Some(&json!("Jul 9, 2013"))), FieldValue::Date(date(2013, 7, 9)));
        assert_eq!(coerce_date(Some(&json!("9 Jul, 2013"))), FieldValue::Date(date(2013, 7, 9)));
        assert_eq!(
            coerce_date(Some(&json!("August 21, 2012"))),
            FieldValue::Date(date(2012, 8, 21))
        );
        // Epoch seconds and milliseconds
        assert_eq!(coerce_date(Some(&json!(1373328000))), FieldValue::Date(date(2013, 7, 9)));
        assert_eq!(
            coerce_date(Some(&json!(1373328000000i64))),
            FieldValue::Date(date(2013, 7, 9))
        );
        assert_eq!(coerce_date(Some(&json!("Coming soon"))), FieldValue::Null);
        assert_eq!(coerce_date(Some(&json!(""))), FieldValue::Absent);
    }

    #[test]
    fn test_owners_range_keeps_lower_bound() {
        assert_eq!(
            owners_lower_bound(Some(&json!("100,000,000 .. 200,000,000"))),
            FieldValue::Integer(100_000_000)
        );
        assert_eq!(owners_lower_bound(Some(&json!(5000))), FieldValue::Integer(5000));
    }

    #[test]
    fn test_failure_normalizes_to_empty() {
        let fragment = RawFragment::failure(FetchError::not_found("missing"));
        let out = normalize(SourceId::SteamStore, &fragment, now());
        assert!(out.is_empty());
        assert_eq!(out.get(Field::Name), &FieldValue::Absent);
    }

    #[test]
    fn test_mismatched_payload_is_ignored() {
        let fragment = RawFragment::success(RawData::HowLongToBeat(HltbData {
            comp_main: Some(json!(3600)),
            ..Default::default()
        }));
        assert!(normalize(SourceId::SteamStore, &fragment, now()).is_empty());
    }

    #[test]
    fn test_steam_store_mapping() {
        let fragment = RawFragment::success(RawData::SteamStore(SteamStoreData {
            name: Some(json!("Dota 2")),
            app_type: Some(json!("game")),
            is_free: Some(json!(true)),
            developers: Some(json!(["Valve"])),
            price_initial: Some(json!(1999)),
            price_final: Some(json!("999")),
            release_date: Some(json!("9 Jul, 2013")),
            platforms: vec!["windows".into(), "linux".into()],
            achievements: Some(json!(0)),
            ..Default::default()
        }));

        let out = normalize(SourceId::SteamStore, &fragment, now());
        assert_eq!(out.get(Field::Name), &FieldValue::Text("Dota 2".into()));
        assert_eq!(out.get(Field::AppType), &FieldValue::Text("game".into()));
        assert_eq!(out.get(Field::IsFree), &FieldValue::Bool(true));
        assert_eq!(out.get(Field::PriceInitial), &FieldValue::Float(19.99));
        assert_eq!(out.get(Field::PriceFinal), &FieldValue::Float(9.99));
        assert_eq!(out.get(Field::ReleaseDate), &FieldValue::Date(date(2013, 7, 9)));
        let expected_days = (now().date_naive() - date(2013, 7, 9)).num_days();
        assert_eq!(out.get(Field::DaysSinceRelease), &FieldValue::Integer(expected_days));
        assert_eq!(out.get(Field::AchievementsCount), &FieldValue::Integer(0));
        // Empty lists stay unsupplied
        assert_eq!(out.get(Field::Categories), &FieldValue::Absent);
        assert_eq!(out.get(Field::PriceCurrency), &FieldValue::Absent);
    }

    #[test]
    fn test_unparseable_release_date_is_null_for_both_fields() {
        let fragment = RawFragment::success(RawData::SteamStore(SteamStoreData {
            release_date: Some(json!("To be announced")),
            ..Default::default()
        }));
        let out = normalize(SourceId::SteamStore, &fragment, now());
        assert_eq!(out.get(Field::ReleaseDate), &FieldValue::Null);
        assert_eq!(out.get(Field::DaysSinceRelease), &FieldValue::Null);
    }

    #[test]
    fn test_steamspy_unit_conversions() {
        let fragment = RawFragment::success(RawData::SteamSpy(SteamSpyData {
            average_forever: Some(json!(90)),
            price: Some(json!("499")),
            owners: Some(json!("1,000,000 .. 2,000,000")),
            positive_reviews: Some(json!(1500)),
            tags: Some(json!([])),
            ..Default::default()
        }));

        let out = normalize(SourceId::SteamSpy, &fragment, now());
        assert_eq!(out.get(Field::AveragePlaytimeH), &FieldValue::Float(1.5));
        assert_eq!(out.get(Field::PriceFinal), &FieldValue::Float(4.99));
        assert_eq!(out.get(Field::Owners), &FieldValue::Integer(1_000_000));
        assert_eq!(out.get(Field::TotalPositive), &FieldValue::Integer(1500));
        assert_eq!(out.get(Field::Tags), &FieldValue::Absent);
    }

    #[test]
    fn test_hltb_seconds_to_hours() {
        let fragment = RawFragment::success(RawData::HowLongToBeat(HltbData {
            comp_main: Some(json!(36000)),
            comp_plus: Some(json!(5400)),
            review_score: Some(json!(88)),
            count_comp: Some(json!("1,200")),
            ..Default::default()
        }));

        let out = normalize(SourceId::HowLongToBeat, &fragment, now());
        assert_eq!(out.get(Field::CompMain), &FieldValue::Float(10.0));
        assert_eq!(out.get(Field::CompPlus), &FieldValue::Float(1.5));
        assert_eq!(out.get(Field::HltbReviewScore), &FieldValue::Integer(88));
        assert_eq!(out.get(Field::CountComp), &FieldValue::Integer(1200));
        assert_eq!(out.get(Field::ReviewScore), &FieldValue::Absent);
    }

    #[test]
    fn test_achievement_aggregates() {
        let achievement = |name: &str, percent: f64| Achievement {
            name: name.to_string(),
            percent,
            display_name: None,
            description: None,
            hidden: None,
        };
        let fragment = RawFragment::success(RawData::SteamAchievements(AchievementsData {
            achievements: vec![
                achievement("A", 10.0),
                achievement("B", 20.0),
                achievement("C", 30.5),
            ],
        }));

        let out = normalize(SourceId::SteamAchievements, &fragment, now());
        assert_eq!(out.get(Field::AchievementsCount), &FieldValue::Integer(3));
        assert_eq!(out.get(Field::AchievementsPercentageAverage), &FieldValue::Float(20.17));

        let empty = RawFragment::success(RawData::SteamAchievements(AchievementsData::default()));
        assert!(normalize(SourceId::SteamAchievements, &empty, now()).is_empty());
    }

    #[test]
    fn test_review_listing_contributes_nothing() {
        let fragment = RawFragment::success(RawData::ReviewListing(ReviewListing::default()));
        assert!(normalize(SourceId::SteamReview, &fragment, now()).is_empty());
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let fragment = RawFragment::success(RawData::Gamalytic(GamalyticData {
            name: Some(json!("Dota 2")),
            release_date: Some(json!(1373328000000i64)),
            average_playtime: Some(json!(123.456)),
            ..Default::default()
        }));
        let first = normalize(SourceId::Gamalytic, &fragment, now());
        let second = normalize(SourceId::Gamalytic, &fragment, now());
        assert_eq!(first, second);
        assert_eq!(first.get(Field::AveragePlaytimeH), &FieldValue::Float(123.46));
    }

    proptest! {
        /// Coercing an already-canonical value yields the same value
        #[test]
        fn prop_int_coercion_idempotent(raw in "[ 0-9,]{0,12}") {
            let once = coerce_int(Some(&Value::String(raw)));
            let twice = coerce_int(Some(&once.to_json()));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_list_coercion_idempotent(raw in "[a-zA-Z ,]{0,40}") {
            let once = coerce_list(Some(&Value::String(raw)));
            let twice = coerce_list(Some(&once.to_json()));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_date_coercion_idempotent(days in 0i64..40_000) {
            let base = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Duration::days(days);
            let once = coerce_date(Some(&json!(base.format("%b %d, %Y").to_string())));
            let twice = coerce_date(Some(&once.to_json()));
            prop_assert_eq!(once, FieldValue::Date(base));
            prop_assert_eq!(twice, FieldValue::Date(base));
        }
    }
}
