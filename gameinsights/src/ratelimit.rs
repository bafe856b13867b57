//! Sliding-window rate limiter
//!
//! Each source has an optional `(calls, period)` budget counted per provider
//! request. The limiter as a whole has an optional global budget counted once
//! per identifier, taken by the collector before it fans out to the sources.
//! Each window is checked and recorded in one critical section, so
//! concurrent callers can never overshoot a budget.
//!
//! The limiter never fails. `acquire` only delays.
//!
//! Time comes from an injectable [`Clock`] so tests can run multi-hour
//! windows instantly with [`SimulatedClock`].

use crate::types::SourceId;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MINUTE: Duration = Duration::from_secs(60);

// ============================================================================
// Clock
// ============================================================================

/// Time source for the limiter
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` advances time instantly and is recorded
#[derive(Debug)]
pub struct SimulatedClock {
    origin: Instant,
    inner: Mutex<SimulatedState>,
}

#[derive(Debug, Default)]
struct SimulatedState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            inner: Mutex::new(SimulatedState::default()),
        }
    }

    /// Move virtual time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.elapsed += duration;
    }

    /// Virtual time since construction
    pub fn elapsed(&self) -> Duration {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sleeps
            .clone()
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            state.elapsed += duration;
            state.sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Budgets
// ============================================================================

/// At most `calls` grants in any rolling window of length `period`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    calls: u32,
    period: Duration,
}

impl Budget {
    /// Returns `None` for a zero call count or a zero period
    pub fn new(calls: u32, period: Duration) -> Option<Self> {
        if calls == 0 || period.is_zero() {
            None
        } else {
            Some(Self { calls, period })
        }
    }

    const fn fixed(calls: u32, period: Duration) -> Self {
        Self { calls, period }
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Provider budgets (published limits, or 60/min where none is published)
pub fn default_source_budgets() -> HashMap<SourceId, Budget> {
    HashMap::from([
        (SourceId::SteamStore, Budget::fixed(60, MINUTE)),
        (SourceId::Gamalytic, Budget::fixed(500, DAY)),
        (SourceId::SteamSpy, Budget::fixed(60, MINUTE)),
        (SourceId::SteamCharts, Budget::fixed(60, MINUTE)),
        (SourceId::SteamReview, Budget::fixed(100_000, DAY)),
        (SourceId::SteamAchievements, Budget::fixed(100_000, DAY)),
        (SourceId::HowLongToBeat, Budget::fixed(60, MINUTE)),
        (SourceId::SteamUser, Budget::fixed(100_000, DAY)),
    ])
}

/// Log of grant instants inside the current window
#[derive(Debug)]
struct Window {
    budget: Budget,
    grants: VecDeque<Instant>,
}

impl Window {
    fn new(budget: Budget) -> Self {
        Self {
            budget,
            grants: VecDeque::with_capacity(budget.calls.min(1024) as usize),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.grants.front() {
            if now.saturating_duration_since(oldest) >= self.budget.period {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until a slot frees up, `None` if one is free now
    fn wait(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);
        if self.grants.len() < self.budget.calls as usize {
            return None;
        }
        self.grants
            .front()
            .map(|&oldest| self.budget.period - now.saturating_duration_since(oldest))
    }

    fn record(&mut self, now: Instant) {
        self.grants.push_back(now);
    }
}

// ============================================================================
// Limiter
// ============================================================================

#[derive(Debug)]
struct LimiterState {
    sources: HashMap<SourceId, Window>,
    global: Option<Window>,
}

/// Per-source plus global sliding-window limiter
///
/// Owned by the collector and passed by reference into every fetch.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Limiter on the tokio clock
    pub fn new(budgets: HashMap<SourceId, Budget>, global: Option<Budget>) -> Self {
        Self::with_clock(budgets, global, Arc::new(TokioClock))
    }

    /// Limiter with an explicit clock
    pub fn with_clock(
        budgets: HashMap<SourceId, Budget>,
        global: Option<Budget>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sources = budgets
            .into_iter()
            .map(|(source, budget)| (source, Window::new(budget)))
            .collect();

        Self {
            clock,
            state: Mutex::new(LimiterState {
                sources,
                global: global.map(Window::new),
            }),
        }
    }

    /// Default provider budgets plus the given global budget
    pub fn with_defaults(global: Option<Budget>) -> Self {
        Self::new(default_source_budgets(), global)
    }

    /// No budgets at all
    pub fn unlimited() -> Self {
        Self::new(HashMap::new(), None)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Take a source slot now, or report how long until one frees up
    pub fn try_acquire(&self, source: SourceId) -> Result<(), Duration> {
        self.try_take(Slot::Source(source))
    }

    /// Take a global (per identifier) slot now, or report the wait
    pub fn try_acquire_identifier(&self) -> Result<(), Duration> {
        self.try_take(Slot::Identifier)
    }

    /// Wait until a slot is available for `source`, then take it
    pub async fn acquire(&self, source: SourceId) {
        self.take(Slot::Source(source)).await;
    }

    /// Wait until the global budget admits another identifier, then take it
    pub async fn acquire_identifier(&self) {
        self.take(Slot::Identifier).await;
    }

    fn try_take(&self, slot: Slot) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let window = match slot {
            Slot::Source(source) => state.sources.get_mut(&source),
            Slot::Identifier => state.global.as_mut(),
        };
        let Some(window) = window else {
            return Ok(());
        };

        match window.wait(now) {
            Some(wait) => Err(wait),
            None => {
                window.record(now);
                Ok(())
            }
        }
    }

    async fn take(&self, slot: Slot) {
        loop {
            match self.try_take(slot) {
                Ok(()) => return,
                Err(wait) => {
                    debug!(
                        window = %slot,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limit reached, waiting for window to roll"
                    );
                    self.clock.sleep(wait).await;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Source(SourceId),
    Identifier,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Source(source) => write!(f, "{}", source),
            Slot::Identifier => f.write_str("global"),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn simulated(
        budgets: HashMap<SourceId, Budget>,
        global: Option<Budget>,
    ) -> (RateLimiter, Arc<SimulatedClock>) {
        let clock = Arc::new(SimulatedClock::new());
        let limiter = RateLimiter::with_clock(budgets, global, clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_budget_rejects_zero() {
        assert!(Budget::new(0, MINUTE).is_none());
        assert!(Budget::new(1, Duration::ZERO).is_none());
        assert!(Budget::new(1, MINUTE).is_some());
    }

    #[test]
    fn test_default_budgets_cover_every_source() {
        let budgets = default_source_budgets();
        for source in SourceId::ALL {
            assert!(budgets.contains_key(&source), "missing budget for {}", source);
        }
        assert_eq!(budgets[&SourceId::Gamalytic].calls(), 500);
        assert_eq!(budgets[&SourceId::Gamalytic].period(), DAY);
    }

    #[test]
    fn test_try_acquire_reports_wait() {
        let budget = Budget::new(2, Duration::from_secs(10)).unwrap();
        let (limiter, clock) = simulated(HashMap::from([(SourceId::SteamSpy, budget)]), None);

        assert!(limiter.try_acquire(SourceId::SteamSpy).is_ok());
        clock.advance(Duration::from_secs(3));
        assert!(limiter.try_acquire(SourceId::SteamSpy).is_ok());

        assert_eq!(
            limiter.try_acquire(SourceId::SteamSpy),
            Err(Duration::from_secs(7))
        );

        clock.advance(Duration::from_secs(7));
        assert!(limiter.try_acquire(SourceId::SteamSpy).is_ok());
    }

    #[test]
    fn test_sources_are_independent() {
        let budget = Budget::new(1, MINUTE).unwrap();
        let (limiter, _clock) = simulated(
            HashMap::from([(SourceId::SteamSpy, budget), (SourceId::SteamStore, budget)]),
            None,
        );

        assert!(limiter.try_acquire(SourceId::SteamSpy).is_ok());
        assert!(limiter.try_acquire(SourceId::SteamStore).is_ok());
        assert!(limiter.try_acquire(SourceId::SteamSpy).is_err());
        // No budget declared for this source
        assert!(limiter.try_acquire(SourceId::SteamCharts).is_ok());
    }

    #[test]
    fn test_global_budget_counts_identifiers_not_source_calls() {
        let global = Budget::new(2, MINUTE).unwrap();
        let (limiter, _clock) = simulated(HashMap::new(), Some(global));

        for _ in 0..5 {
            assert!(limiter.try_acquire(SourceId::SteamSpy).is_ok());
            assert!(limiter.try_acquire(SourceId::SteamStore).is_ok());
        }
        assert!(limiter.try_acquire_identifier().is_ok());
        assert!(limiter.try_acquire_identifier().is_ok());
        assert_eq!(limiter.try_acquire_identifier(), Err(MINUTE));
    }

    #[test]
    fn test_identifier_slot_leaves_source_windows_alone() {
        let source = Budget::new(1, MINUTE).unwrap();
        let global = Budget::new(1, MINUTE).unwrap();
        let (limiter, _clock) =
            simulated(HashMap::from([(SourceId::SteamSpy, source)]), Some(global));

        assert!(limiter.try_acquire_identifier().is_ok());
        assert!(limiter.try_acquire(SourceId::SteamSpy).is_ok());
        assert!(limiter.try_acquire(SourceId::SteamSpy).is_err());
        assert!(limiter.try_acquire_identifier().is_err());
    }

    #[tokio::test]
    async fn test_acquire_identifier_without_global_never_waits() {
        let (limiter, clock) = simulated(HashMap::new(), None);
        for _ in 0..100 {
            limiter.acquire_identifier().await;
        }
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let start = TokioClock.now();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(TokioClock.now() - start >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_acquire_delays_until_window_rolls() {
        let budget = Budget::new(3, Duration::from_secs(60)).unwrap();
        let (limiter, clock) = simulated(HashMap::from([(SourceId::SteamStore, budget)]), None);

        for _ in 0..3 {
            limiter.acquire(SourceId::SteamStore).await;
        }
        assert!(clock.sleeps().is_empty());

        limiter.acquire(SourceId::SteamStore).await;
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_never_overshoot() {
        let budget = Budget::new(5, Duration::from_secs(1)).unwrap();
        let limiter = Arc::new(RateLimiter::new(
            HashMap::from([(SourceId::SteamSpy, budget)]),
            None,
        ));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.try_acquire(SourceId::SteamSpy).is_ok()
            }));
        }
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
        assert!(limiter.try_acquire(SourceId::SteamSpy).is_err());
    }

    proptest! {
        /// No rolling window of length `period` ever holds more than `calls` grants
        #[test]
        fn prop_window_never_exceeds_budget(
            calls in 1u32..6,
            period_secs in 1u64..20,
            gaps_ms in proptest::collection::vec(0u64..3_000, 1..40),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let period = Duration::from_secs(period_secs);
            let budget = Budget::new(calls, period).unwrap();
            let (limiter, clock) = simulated(HashMap::from([(SourceId::SteamSpy, budget)]), None);

            let grants: Vec<Duration> = runtime.block_on(async {
                let mut grants = Vec::with_capacity(gaps_ms.len());
                for gap in &gaps_ms {
                    clock.advance(Duration::from_millis(*gap));
                    limiter.acquire(SourceId::SteamSpy).await;
                    grants.push(clock.elapsed());
                }
                grants
            });

            let n = calls as usize;
            for i in 0..grants.len().saturating_sub(n) {
                prop_assert!(grants[i + n] - grants[i] >= period);
            }
        }

        /// A request is only delayed when the window is actually full
        #[test]
        fn prop_under_budget_never_waits(
            calls in 1u32..10,
            period_secs in 1u64..20,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let budget = Budget::new(calls, Duration::from_secs(period_secs)).unwrap();
            let (limiter, clock) = simulated(HashMap::from([(SourceId::SteamSpy, budget)]), None);

            runtime.block_on(async {
                for _ in 0..calls {
                    limiter.acquire(SourceId::SteamSpy).await;
                }
            });
            prop_assert!(clock.sleeps().is_empty());
        }
    }
}
