//! Batch state machine and run report
//!
//! A batch moves strictly forward through four states:
//! PENDING → FETCHING → MERGING → DONE

use crate::error::CollectorResult;
use crate::fusion::RecordStatus;
use crate::types::SourceId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Batch lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchState {
    /// Validating input and configuration
    Pending,
    /// Source fetches in flight
    Fetching,
    /// Normalizing and merging fragments
    Merging,
    /// Records returned
    Done,
}

impl BatchState {
    /// Only the next state in sequence is reachable
    pub fn can_transition_to(self, next: BatchState) -> bool {
        matches!(
            (self, next),
            (BatchState::Pending, BatchState::Fetching)
                | (BatchState::Fetching, BatchState::Merging)
                | (BatchState::Merging, BatchState::Done)
        )
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub batch_id: Uuid,
    pub old_state: BatchState,
    pub new_state: BatchState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory state of one batch
#[derive(Debug, Clone)]
pub struct BatchSession {
    pub batch_id: Uuid,
    pub state: BatchState,
    pub started_at: DateTime<Utc>,
}

impl Default for BatchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchSession {
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            state: BatchState::Pending,
            started_at: Utc::now(),
        }
    }

    /// Advance to `new_state`, rejecting skips and backward moves
    pub fn transition_to(&mut self, new_state: BatchState) -> CollectorResult<StateTransition> {
        if !self.state.can_transition_to(new_state) {
            return Err(gameinsights_common::Error::Internal(format!(
                "Invalid batch transition {:?} -> {:?}",
                self.state, new_state
            ))
            .into());
        }

        let transition = StateTransition {
            batch_id: self.batch_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        debug!(
            batch_id = %self.batch_id,
            from = ?self.state,
            to = ?new_state,
            "Batch state change"
        );
        self.state = new_state;
        Ok(transition)
    }

    pub fn is_done(&self) -> bool {
        self.state == BatchState::Done
    }
}

/// Per-batch statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    /// Identifiers requested, duplicates included
    pub identifiers: usize,
    /// Distinct identifiers fetched
    pub unique: usize,
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
    pub source_successes: BTreeMap<SourceId, usize>,
    pub source_failures: BTreeMap<SourceId, usize>,
    pub duration: Duration,
}

impl BatchReport {
    pub fn new(batch_id: Uuid, identifiers: usize, unique: usize) -> Self {
        Self {
            batch_id,
            identifiers,
            unique,
            ..Default::default()
        }
    }

    pub fn record_status(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Ok => self.ok += 1,
            RecordStatus::Partial => self.partial += 1,
            RecordStatus::Failed => self.failed += 1,
        }
    }

    pub fn record_source(&mut self, source: SourceId, success: bool) {
        let counts = if success {
            &mut self.source_successes
        } else {
            &mut self.source_failures
        };
        *counts.entry(source).or_insert(0) += 1;
    }
}
