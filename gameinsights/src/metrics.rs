//! Fetch and batch metrics
//!
//! Metrics are plain `tracing` events on the `gameinsights::metrics` target,
//! emitted only when `GAMEINSIGHTS_METRICS` is truthy (`1`, `true`, `yes`,
//! `on`). Route them with a filter such as
//! `RUST_LOG=gameinsights::metrics=info`.

use crate::collector::state::BatchReport;
use crate::types::SourceId;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

/// Environment switch for metrics events
pub const METRICS_ENV: &str = "GAMEINSIGHTS_METRICS";

static ENABLED: OnceLock<bool> = OnceLock::new();

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Read once per process
pub fn enabled() -> bool {
    *ENABLED.get_or_init(|| {
        std::env::var(METRICS_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false)
    })
}

/// One source fetch finished
pub fn record_fetch(source: SourceId, identifier: &str, elapsed: Duration, success: bool) {
    if !enabled() {
        return;
    }
    info!(
        target: "gameinsights::metrics",
        metric = "source_fetch",
        source = %source,
        identifier = %identifier,
        duration_ms = elapsed.as_millis() as u64,
        success,
    );
}

/// One batch finished
pub fn record_batch(report: &BatchReport) {
    if !enabled() {
        return;
    }
    info!(
        target: "gameinsights::metrics",
        metric = "batch",
        batch_id = %report.batch_id,
        identifiers = report.identifiers,
        unique = report.unique,
        ok = report.ok,
        partial = report.partial,
        failed = report.failed,
        duration_ms = report.duration.as_millis() as u64,
    );
    for (source, count) in &report.source_successes {
        info!(target: "gameinsights::metrics", metric = "source_success", source = %source, count);
    }
    for (source, count) in &report.source_failures {
        info!(target: "gameinsights::metrics", metric = "source_failure", source = %source, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["", "0", "false", "off", "maybe"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}
