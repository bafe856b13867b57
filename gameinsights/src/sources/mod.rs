//! Provider fetchers
//!
//! One module per data provider, all sharing the [`http`] transport. Every
//! fetcher implements [`SourceFetcher`](crate::types::SourceFetcher) and
//! acquires the rate limiter before each request it makes.

pub mod gamalytic;
pub mod howlongtobeat;
pub mod http;
pub mod steamachievements;
pub mod steamcharts;
pub mod steamreview;
pub mod steamspy;
pub mod steamstore;
pub mod steamuser;

pub use gamalytic::GamalyticFetcher;
pub use howlongtobeat::HowLongToBeatFetcher;
pub use http::HttpClient;
pub use steamachievements::SteamAchievementsFetcher;
pub use steamcharts::SteamChartsFetcher;
pub use steamreview::SteamReviewFetcher;
pub use steamspy::SteamSpyFetcher;
pub use steamstore::SteamStoreFetcher;
pub use steamuser::SteamUserFetcher;

use crate::types::{SourceFetcher, SourceId};
use std::sync::Arc;

/// Live fetcher for one provider
pub fn fetcher_for(source: SourceId, http: &HttpClient) -> Arc<dyn SourceFetcher> {
    let http = http.clone();
    match source {
        SourceId::SteamStore => Arc::new(SteamStoreFetcher::new(http)),
        SourceId::Gamalytic => Arc::new(GamalyticFetcher::new(http)),
        SourceId::SteamSpy => Arc::new(SteamSpyFetcher::new(http)),
        SourceId::SteamCharts => Arc::new(SteamChartsFetcher::new(http)),
        SourceId::SteamReview => Arc::new(SteamReviewFetcher::new(http)),
        SourceId::SteamAchievements => Arc::new(SteamAchievementsFetcher::new(http)),
        SourceId::HowLongToBeat => Arc::new(HowLongToBeatFetcher::new(http)),
        SourceId::SteamUser => Arc::new(SteamUserFetcher::new(http)),
    }
}

// ============================================================================
// Test fetchers
// ============================================================================
