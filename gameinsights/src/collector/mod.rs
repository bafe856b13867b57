//! Batch collector
//!
//! Drives one batch through PENDING → FETCHING → MERGING → DONE:
//! - Validates the batch and de-duplicates identifiers (output keeps every
//!   requested slot, each distinct identifier is fetched once)
//! - Fetches identifiers with bounded fan-out (`max_concurrency`), spacing
//!   identifier starts by `inter_call_delay`
//! - Per identifier, runs id-based sources concurrently, resolves the game
//!   name from their fragments, then runs name-based sources
//! - Normalizes and merges each identifier's fragments into one record
//!
//! A failing source only affects its own fields. The batch itself fails only
//! on invalid input, cancellation, or (under `TotalFailurePolicy::Error`)
//! when every source failed for every identifier.

pub mod state;

use crate::config::{CollectorConfig, TotalFailurePolicy};
use crate::error::{CollectorError, CollectorResult};
use crate::fusion::{
    merge, resolve_field, Projection, RecordBatch, RecordStatus, Table, UnifiedRecord,
};
use crate::metrics;
use crate::normalize::{normalize, NormalizedFragment};
use crate::ratelimit::RateLimiter;
use crate::raw::{RawData, ReviewListing, SteamUserData};
use crate::schema::{Field, APPID_COLUMN};
use crate::sources::{fetcher_for, HttpClient};
use crate::types::{
    FetchError, FetchOptions, LookupKey, RawFragment, ReviewMode, ReviewQuery, SourceFetcher,
    SourceId, SourceResult,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use self::state::{BatchReport, BatchSession, BatchState};

/// Fragments gathered for one identifier
struct IdentifierFetch {
    identifier: String,
    fragments: HashMap<SourceId, RawFragment>,
}

/// Result of a user lookup; failed lookups keep only the steamid
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UserRecord {
    Found(SteamUserData),
    Missing { steamid: String },
}

pub struct Collector {
    config: CollectorConfig,
    options: FetchOptions,
    sources: Vec<Arc<dyn SourceFetcher>>,
    limiter: Arc<RateLimiter>,
    pacer: Option<Arc<DefaultDirectRateLimiter>>,
    reference_time: Option<DateTime<Utc>>,
}

impl Collector {
    /// Collector with live fetchers for every provider and default budgets
    pub fn new(config: CollectorConfig) -> CollectorResult<Self> {
        config.validate()?;
        let http = HttpClient::new(config.http_timeout)?;
        let sources = SourceId::ALL
            .into_iter()
            .map(|source| fetcher_for(source, &http))
            .collect();
        let limiter = Arc::new(RateLimiter::with_defaults(Some(config.global_budget()?)));
        Self::with_sources(config, sources, limiter)
    }

    /// Collector over explicit fetchers and limiter
    pub fn with_sources(
        config: CollectorConfig,
        sources: Vec<Arc<dyn SourceFetcher>>,
        limiter: Arc<RateLimiter>,
    ) -> CollectorResult<Self> {
        config.validate()?;
        let pacer = Quota::with_period(config.inter_call_delay)
            .map(|quota| Arc::new(DefaultDirectRateLimiter::direct(quota)));

        info!(
            sources = sources.len(),
            max_concurrency = config.max_concurrency,
            inter_call_delay_ms = config.inter_call_delay.as_millis() as u64,
            "Collector ready"
        );

        Ok(Self {
            options: config.fetch_options(),
            config,
            sources,
            limiter,
            pacer,
            reference_time: None,
        })
    }

    /// Fix "now" for derived fields such as `days_since_release`
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn now(&self) -> DateTime<Utc> {
        self.reference_time.unwrap_or_else(Utc::now)
    }

    fn game_sources(&self, lookup: LookupKey) -> Vec<&Arc<dyn SourceFetcher>> {
        self.sources
            .iter()
            .filter(|f| f.lookup() == lookup && SourceId::GAME_SOURCES.contains(&f.source()))
            .collect()
    }

    fn source(&self, source: SourceId) -> CollectorResult<&Arc<dyn SourceFetcher>> {
        self.sources
            .iter()
            .find(|f| f.source() == source)
            .ok_or_else(|| {
                CollectorError::InvalidConfig(format!("No {} source configured", source))
            })
    }

    /// Admit one identifier: global budget first, then inter-call pacing
    async fn admit(&self) {
        self.limiter.acquire_identifier().await;
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }
    }

    // ========================================================================
    // Game records
    // ========================================================================

    /// Collect one record per identifier, in request order
    pub async fn collect<S: AsRef<str>>(&self, identifiers: &[S]) -> CollectorResult<RecordBatch> {
        self.collect_with_cancel(identifiers, &CancellationToken::new())
            .await
    }

    /// [`collect`](Self::collect), abandoning the batch when `cancel` fires
    ///
    /// A cancelled batch returns `Cancelled`; no partial records escape.
    pub async fn collect_with_cancel<S: AsRef<str>>(
        &self,
        identifiers: &[S],
        cancel: &CancellationToken,
    ) -> CollectorResult<RecordBatch> {
        let mut session = BatchSession::new();
        let span = info_span!("batch", batch_id = %session.batch_id);
        self.run_batch(&mut session, identifiers, cancel)
            .instrument(span)
            .await
    }

    async fn run_batch<S: AsRef<str>>(
        &self,
        session: &mut BatchSession,
        identifiers: &[S],
        cancel: &CancellationToken,
    ) -> CollectorResult<RecordBatch> {
        let requested = validate_batch(identifiers)?;
        let unique = dedupe(&requested);
        let mut report = BatchReport::new(session.batch_id, requested.len(), unique.len());
        let started = Instant::now();
        info!(
            identifiers = requested.len(),
            unique = unique.len(),
            "Starting batch"
        );

        session.transition_to(BatchState::Fetching)?;
        let fetched = until_cancelled(
            cancel,
            stream::iter(unique.iter().cloned())
                .map(|identifier| self.fetch_identifier(identifier))
                .buffered(self.config.max_concurrency)
                .collect::<Vec<_>>(),
        )
        .await?;

        session.transition_to(BatchState::Merging)?;
        let now = self.now();
        let mut merged: HashMap<String, UnifiedRecord> = HashMap::new();
        for fetch in fetched {
            for (source, fragment) in &fetch.fragments {
                report.record_source(*source, fragment.is_success());
            }
            let record = merge_identifier(&fetch, now);
            report.record_status(record.status);
            merged.insert(fetch.identifier, record);
        }

        if report.ok == 0 && report.partial == 0 {
            match self.config.on_total_failure {
                TotalFailurePolicy::Error => {
                    warn!(count = unique.len(), "Every source failed for every identifier");
                    return Err(CollectorError::AllSourcesFailed { count: unique.len() });
                }
                TotalFailurePolicy::ReturnAbsent => {
                    warn!(
                        count = unique.len(),
                        "Every source failed, returning absent records"
                    );
                }
            }
        }

        let records = requested
            .iter()
            .zip(identifiers)
            .map(|(key, original)| {
                merged
                    .get(key)
                    .map(|record| record.renamed(original.as_ref()))
                    .unwrap_or_else(|| UnifiedRecord::absent(original.as_ref()))
            })
            .collect();

        session.transition_to(BatchState::Done)?;
        report.duration = started.elapsed();
        metrics::record_batch(&report);
        info!(
            ok = report.ok,
            partial = report.partial,
            failed = report.failed,
            duration_ms = report.duration.as_millis() as u64,
            "Batch complete"
        );

        let projection = if self.config.recap {
            Projection::Recap
        } else {
            Projection::Full
        };
        Ok(RecordBatch {
            records,
            projection,
            report,
        })
    }

    async fn fetch_identifier(&self, identifier: String) -> IdentifierFetch {
        self.admit().await;
        debug!(identifier = %identifier, "Fetching identifier");

        let mut fragments: HashMap<SourceId, RawFragment> = join_all(
            self.game_sources(LookupKey::AppId)
                .into_iter()
                .map(|fetcher| self.timed_fetch(fetcher, &identifier, &identifier, &self.options)),
        )
        .await
        .into_iter()
        .collect();

        let name_based = self.game_sources(LookupKey::GameName);
        if !name_based.is_empty() {
            match resolve_name(&fragments, self.now()) {
                Some(name) => {
                    debug!(identifier = %identifier, name = %name, "Resolved game name");
                    let by_name = join_all(name_based.into_iter().map(|fetcher| {
                        self.timed_fetch(fetcher, &identifier, &name, &self.options)
                    }))
                    .await;
                    fragments.extend(by_name);
                }
                None => {
                    for fetcher in name_based {
                        let error = FetchError::not_found("no game name resolved");
                        log_failure(fetcher.source(), &identifier, &error);
                        fragments.insert(fetcher.source(), RawFragment::failure(error));
                    }
                }
            }
        }

        IdentifierFetch {
            identifier,
            fragments,
        }
    }

    async fn timed_fetch(
        &self,
        fetcher: &Arc<dyn SourceFetcher>,
        identifier: &str,
        key: &str,
        options: &FetchOptions,
    ) -> (SourceId, RawFragment) {
        let source = fetcher.source();
        let started = Instant::now();
        let fragment = fetcher.fetch(key, options, &self.limiter).await;
        let elapsed = started.elapsed();

        match fragment.error() {
            Some(error) => log_failure(source, identifier, error),
            None => debug!(
                source = %source,
                identifier = %identifier,
                duration_ms = elapsed.as_millis() as u64,
                "Source fetch succeeded"
            ),
        }
        metrics::record_fetch(source, identifier, elapsed, fragment.is_success());
        (source, fragment)
    }

    // ========================================================================
    // Active players
    // ========================================================================

    /// Monthly average players per identifier as a table
    ///
    /// Columns: `steam_appid`, `name`, `peak_active_player_all_time`, then
    /// every observed month (`YYYY-MM`) in order. Missing cells hold `fill`.
    pub async fn collect_active_players<S: AsRef<str>>(
        &self,
        identifiers: &[S],
        fill: i64,
    ) -> CollectorResult<Table> {
        let requested = validate_batch(identifiers)?;
        let fetcher = self.source(SourceId::SteamCharts)?;

        let fetched: HashMap<String, RawFragment> = stream::iter(dedupe(&requested))
            .map(|identifier| async move {
                self.admit().await;
                let (_, fragment) = self
                    .timed_fetch(fetcher, &identifier, &identifier, &self.options)
                    .await;
                (identifier, fragment)
            })
            .buffered(self.config.max_concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        let mut months = BTreeSet::new();
        let mut rows: Vec<BTreeMap<String, Value>> = Vec::with_capacity(requested.len());
        for (key, original) in requested.iter().zip(identifiers) {
            let mut row = BTreeMap::new();
            row.insert(APPID_COLUMN.to_string(), Value::String(original.as_ref().to_string()));

            if let Some(RawData::SteamCharts(data)) = fetched.get(key).and_then(RawFragment::data) {
                if let Some(name) = &data.name {
                    row.insert(Field::Name.name().to_string(), name.clone());
                }
                if let Some(peak) = &data.peak_active_player_all_time {
                    row.insert(Field::PeakActivePlayerAllTime.name().to_string(), peak.clone());
                }
                for month in &data.monthly_active_player {
                    if let Some(average) = month.average_players {
                        months.insert(month.month.clone());
                        row.insert(month.month.clone(), Value::from(average));
                    }
                }
            }
            rows.push(row);
        }

        let columns: Vec<String> = [
            APPID_COLUMN,
            Field::Name.name(),
            Field::PeakActivePlayerAllTime.name(),
        ]
        .into_iter()
        .map(str::to_string)
        .chain(months)
        .collect();

        let rows = rows
            .into_iter()
            .map(|mut row| {
                columns
                    .iter()
                    .map(|column| row.remove(column).unwrap_or_else(|| Value::from(fill)))
                    .collect()
            })
            .collect();

        Ok(Table { columns, rows })
    }

    // ========================================================================
    // Reviews and users
    // ========================================================================

    /// Individual reviews for one app
    ///
    /// A failed listing is logged and yields an empty listing.
    pub async fn collect_reviews(
        &self,
        appid: &str,
        query: ReviewQuery,
    ) -> CollectorResult<ReviewListing> {
        let appid = validate_batch(&[appid])?.remove(0);
        let fetcher = self.source(SourceId::SteamReview)?;
        let options = FetchOptions {
            review_mode: ReviewMode::Listing,
            review_query: query,
            ..self.options.clone()
        };

        let (_, fragment) = self.timed_fetch(fetcher, &appid, &appid, &options).await;
        match fragment {
            SourceResult::Success {
                data: RawData::ReviewListing(listing),
            } => Ok(listing),
            SourceResult::Success { .. } => {
                warn!(appid = %appid, "Review source returned a non-listing payload");
                Ok(ReviewListing::default())
            }
            SourceResult::Failure { .. } => Ok(ReviewListing::default()),
        }
    }

    /// Profile and game lists per Steam id, in request order
    pub async fn collect_users<S: AsRef<str>>(
        &self,
        steamids: &[S],
    ) -> CollectorResult<Vec<UserRecord>> {
        let requested = validate_batch(steamids)?;
        let fetcher = self
            .sources
            .iter()
            .find(|f| f.lookup() == LookupKey::SteamId)
            .ok_or_else(|| CollectorError::InvalidConfig("No user source configured".into()))?;

        let fetched: HashMap<String, RawFragment> = stream::iter(dedupe(&requested))
            .map(|steamid| async move {
                self.admit().await;
                let (_, fragment) = self
                    .timed_fetch(fetcher, &steamid, &steamid, &self.options)
                    .await;
                (steamid, fragment)
            })
            .buffered(self.config.max_concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        Ok(requested
            .into_iter()
            .map(|steamid| match fetched.get(&steamid).and_then(RawFragment::data) {
                Some(RawData::SteamUser(data)) => UserRecord::Found(data.clone()),
                _ => UserRecord::Missing { steamid },
            })
            .collect())
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("config", &self.config)
            .field(
                "sources",
                &self.sources.iter().map(|s| s.source()).collect::<Vec<_>>(),
            )
            .field("limiter", &self.limiter)
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Trimmed identifiers; rejects empty batches and blank identifiers
fn validate_batch<S: AsRef<str>>(identifiers: &[S]) -> CollectorResult<Vec<String>> {
    if identifiers.is_empty() {
        return Err(CollectorError::EmptyBatch);
    }
    identifiers
        .iter()
        .enumerate()
        .map(|(position, id)| {
            let id = id.as_ref().trim();
            if id.is_empty() {
                Err(CollectorError::InvalidIdentifier { position })
            } else {
                Ok(id.to_string())
            }
        })
        .collect()
}

/// First occurrence of each identifier, request order
fn dedupe(identifiers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    identifiers
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = T>,
) -> CollectorResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("Batch cancelled");
            Err(CollectorError::Cancelled)
        }
        result = work => Ok(result),
    }
}

fn log_failure(source: SourceId, identifier: &str, error: &FetchError) {
    warn!(
        source = %source,
        identifier = %identifier,
        kind = ?error.kind,
        status = error.status,
        error = %error.message,
        "Source fetch failed"
    );
}

/// Game name from id-based fragments, by `name` precedence
fn resolve_name(fragments: &HashMap<SourceId, RawFragment>, now: DateTime<Utc>) -> Option<String> {
    let normalized: HashMap<SourceId, NormalizedFragment> = fragments
        .iter()
        .map(|(source, fragment)| (*source, normalize(*source, fragment, now)))
        .collect();

    resolve_field(Field::Name, &normalized)
        .and_then(|(_, value)| value.as_text())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn merge_identifier(fetch: &IdentifierFetch, now: DateTime<Utc>) -> UnifiedRecord {
    let normalized: HashMap<SourceId, NormalizedFragment> = fetch
        .fragments
        .iter()
        .map(|(source, fragment)| (*source, normalize(*source, fragment, now)))
        .collect();

    let errors: BTreeMap<SourceId, FetchError> = fetch
        .fragments
        .iter()
        .filter_map(|(source, fragment)| fragment.error().map(|e| (*source, e.clone())))
        .collect();

    let applicable = fetch.fragments.len();
    let status = if applicable > 0 && errors.is_empty() {
        RecordStatus::Ok
    } else if errors.len() < applicable {
        RecordStatus::Partial
    } else {
        RecordStatus::Failed
    };

    merge(&fetch.identifier, &normalized).with_outcome(status, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{Budget, SimulatedClock};
    use crate::raw::{HltbData, SteamSpyData, SteamStoreData};
    use crate::sources::mock::StubFetcher;
    use crate::schema::FieldValue;
    use crate::types::FetchErrorKind;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> CollectorConfig {
        CollectorConfig {
            inter_call_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn store(name: &str) -> RawData {
        RawData::SteamStore(SteamStoreData {
            name: Some(json!(name)),
            ..Default::default()
        })
    }

    fn collector(sources: Vec<Arc<dyn SourceFetcher>>) -> Collector {
        Collector::with_sources(config(), sources, Arc::new(RateLimiter::unlimited())).unwrap()
    }

    #[test]
    fn test_validate_batch() {
        assert!(matches!(validate_batch::<&str>(&[]), Err(CollectorError::EmptyBatch)));
        assert!(matches!(
            validate_batch(&["570", "  "]),
            Err(CollectorError::InvalidIdentifier { position: 1 })
        ));
        assert_eq!(validate_batch(&[" 570 "]).unwrap(), vec!["570".to_string()]);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let ids = ["b", "a", "b", "c", "a"].map(String::from);
        assert_eq!(dedupe(&ids), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_name_based_source_gets_resolved_name() {
        let hltb = Arc::new(StubFetcher::new(SourceId::HowLongToBeat).by_name().with_data(
            "Portal 2",
            RawData::HowLongToBeat(HltbData {
                comp_main: Some(json!(36000)),
                ..Default::default()
            }),
        ));
        let sources: Vec<Arc<dyn SourceFetcher>> = vec![
            Arc::new(StubFetcher::new(SourceId::SteamStore).with_data("620", store("Portal 2"))),
            hltb.clone(),
        ];

        let batch = collector(sources).collect(&["620"]).await.unwrap();
        let record = &batch.records[0];

        assert_eq!(hltb.calls(), vec!["Portal 2".to_string()]);
        assert_eq!(record.get(Field::CompMain), &FieldValue::Float(10.0));
        assert_eq!(record.provenance.get(&Field::CompMain), Some(&SourceId::HowLongToBeat));
        assert_eq!(record.status, RecordStatus::Ok);
    }

    #[tokio::test]
    async fn test_missing_name_records_not_found_for_name_sources() {
        let hltb = Arc::new(StubFetcher::new(SourceId::HowLongToBeat).by_name());
        let sources: Vec<Arc<dyn SourceFetcher>> = vec![
            Arc::new(StubFetcher::new(SourceId::SteamSpy).with_data(
                "570",
                RawData::SteamSpy(SteamSpyData {
                    ccu: Some(json!(500000)),
                    ..Default::default()
                }),
            )),
            hltb.clone(),
        ];

        let batch = collector(sources).collect(&["570"]).await.unwrap();
        let record = &batch.records[0];

        assert!(hltb.calls().is_empty());
        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(
            record.errors.get(&SourceId::HowLongToBeat).map(|e| e.kind),
            Some(FetchErrorKind::NotFound)
        );
    }

    #[tokio::test]
    async fn test_user_source_excluded_from_game_records() {
        let user = Arc::new(StubFetcher::new(SourceId::SteamUser));
        let sources: Vec<Arc<dyn SourceFetcher>> = vec![
            Arc::new(StubFetcher::new(SourceId::SteamStore).with_data("570", store("Dota 2"))),
            user.clone(),
        ];

        let batch = collector(sources).collect(&["570"]).await.unwrap();
        assert!(user.calls().is_empty());
        assert_eq!(batch.records[0].status, RecordStatus::Ok);
    }

    #[tokio::test]
    async fn test_duplicates_fetched_once_but_kept() {
        let steam =
            Arc::new(StubFetcher::new(SourceId::SteamStore).with_data("570", store("Dota 2")));
        let batch = collector(vec![steam.clone() as Arc<dyn SourceFetcher>])
            .collect(&["570", "570 ", "570"])
            .await
            .unwrap();

        assert_eq!(steam.calls(), vec!["570".to_string()]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.records[1].identifier, "570 ");
        assert_eq!(batch.report.identifiers, 3);
        assert_eq!(batch.report.unique, 1);
    }

    #[tokio::test]
    async fn test_reference_time_drives_days_since_release() {
        let sources: Vec<Arc<dyn SourceFetcher>> = vec![
            Arc::new(StubFetcher::new(SourceId::SteamStore).with_data(
                "570",
                RawData::SteamStore(SteamStoreData {
                    name: Some(json!("Dota 2")),
                    release_date: Some(json!("2013-07-09")),
                    ..Default::default()
                }),
            )),
            Arc::new(StubFetcher::new(SourceId::Gamalytic).with_failure(
                "570",
                FetchError::auth_required("rejected key").with_status(401),
            )),
        ];
        let now = DateTime::parse_from_rfc3339("2013-07-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let batch = collector(sources).with_reference_time(now).collect(&["570"]).await.unwrap();
        let record = &batch.records[0];

        assert_eq!(record.get(Field::DaysSinceRelease), &FieldValue::Integer(10));
        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.errors[&SourceId::Gamalytic].kind, FetchErrorKind::AuthRequired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identifier_fan_out_is_bounded() {
        let steam = Arc::new(
            StubFetcher::new(SourceId::SteamStore)
                .with_data("1", store("One"))
                .with_delay(Duration::from_secs(1)),
        );
        let config = CollectorConfig {
            max_concurrency: 2,
            ..config()
        };
        let sources: Vec<Arc<dyn SourceFetcher>> = vec![steam.clone()];
        let collector =
            Collector::with_sources(config, sources, Arc::new(RateLimiter::unlimited())).unwrap();

        let started = tokio::time::Instant::now();
        collector.collect(&["1", "2", "3", "4"]).await.unwrap();

        assert_eq!(steam.calls().len(), 4);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_global_budget_is_spent_per_identifier() {
        let clock = Arc::new(SimulatedClock::new());
        let global = Budget::new(2, Duration::from_secs(60));
        let limiter = Arc::new(RateLimiter::with_clock(HashMap::new(), global, clock.clone()));
        let sources: Vec<Arc<dyn SourceFetcher>> = vec![
            Arc::new(
                StubFetcher::new(SourceId::SteamStore)
                    .with_data("570", store("Dota 2"))
                    .with_data("440", store("Team Fortress 2")),
            ),
            Arc::new(StubFetcher::new(SourceId::SteamSpy)),
        ];
        let collector = Collector::with_sources(config(), sources, limiter).unwrap();

        // Two identifiers times two sources is four calls but only two grants
        collector.collect(&["570", "730"]).await.unwrap();
        assert!(clock.sleeps().is_empty());

        collector.collect(&["440"]).await.unwrap();
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn test_missing_review_source_is_config_error() {
        let collector = collector(vec![Arc::new(StubFetcher::new(SourceId::SteamStore))]);
        let result = collector.collect_reviews("570", ReviewQuery::default()).await;
        assert!(matches!(result, Err(CollectorError::InvalidConfig(_))));
    }
}
