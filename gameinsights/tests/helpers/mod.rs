//! Shared fixtures for collector integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use gameinsights::ratelimit::RateLimiter;
use gameinsights::raw::{GamalyticData, RawData, SteamStoreData};
use gameinsights::types::{FetchError, FetchOptions, LookupKey, RawFragment};
use gameinsights::{Collector, CollectorConfig, SourceFetcher, SourceId};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned fragment per key; unknown keys fail with `NotFound`
pub struct ScriptedFetcher {
    source: SourceId,
    lookup: LookupKey,
    responses: HashMap<String, RawFragment>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            lookup: LookupKey::AppId,
            responses: HashMap::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn lookup(mut self, lookup: LookupKey) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn data(mut self, key: &str, data: RawData) -> Self {
        self.responses.insert(key.to_string(), RawFragment::success(data));
        self
    }

    pub fn failure(mut self, key: &str, error: FetchError) -> Self {
        self.responses.insert(key.to_string(), RawFragment::failure(error));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    fn source(&self) -> SourceId {
        self.source
    }

    fn lookup(&self) -> LookupKey {
        self.lookup
    }

    async fn fetch(
        &self,
        key: &str,
        _options: &FetchOptions,
        limiter: &RateLimiter,
    ) -> RawFragment {
        limiter.acquire(self.source).await;
        self.calls.lock().unwrap().push(key.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses.get(key).cloned().unwrap_or_else(|| {
            RawFragment::failure(FetchError::not_found(format!("no data for {}", key)))
        })
    }
}

/// Config with pacing disabled
pub fn test_config() -> CollectorConfig {
    CollectorConfig {
        inter_call_delay: Duration::ZERO,
        ..Default::default()
    }
}

pub fn collector(config: CollectorConfig, sources: Vec<Arc<dyn SourceFetcher>>) -> Collector {
    Collector::with_sources(config, sources, Arc::new(RateLimiter::unlimited())).unwrap()
}

pub fn store(name: &str, developer: &str) -> RawData {
    RawData::SteamStore(SteamStoreData {
        name: Some(json!(name)),
        developers: Some(json!([developer])),
        genres: vec!["Action".to_string()],
        ..Default::default()
    })
}

pub fn gamalytic(name: &str, copies_sold: i64) -> RawData {
    RawData::Gamalytic(GamalyticData {
        name: Some(json!(name)),
        copies_sold: Some(json!(copies_sold)),
        ..Default::default()
    })
}
