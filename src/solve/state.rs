use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::ErrorKind, models::SolveMode};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Settlement {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "phase", content = "settlement")]
pub enum SolveStatus {
    Idle,
    Submitting,
    Racing,
    Converging,
    Settled(Settlement),
}

impl Default for SolveStatus {
    fn default() -> Self {
        SolveStatus::Idle
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolveState {
    pub status: SolveStatus,
    pub attempt_id: Option<String>,
    pub mode: Option<SolveMode>,
    pub started_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub failure: Option<ErrorKind>,
}

impl SolveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request is between submission and settlement.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.status,
            SolveStatus::Submitting | SolveStatus::Racing | SolveStatus::Converging
        )
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, SolveStatus::Settled(_))
    }

    /// Starts a new attempt. Reached from `Idle` or any `Settled` state.
    pub fn begin(&mut self, attempt_id: String, mode: SolveMode, now: DateTime<Utc>) {
        debug_assert!(!self.is_busy(), "begin while {:?}", self.status);
        *self = Self {
            status: SolveStatus::Submitting,
            attempt_id: Some(attempt_id),
            mode: Some(mode),
            started_at: Some(now),
            settled_at: None,
            failure: None,
        };
    }

    pub fn race(&mut self) {
        debug_assert_eq!(self.status, SolveStatus::Submitting);
        self.status = SolveStatus::Racing;
    }

    pub fn converge(&mut self) {
        debug_assert_eq!(self.status, SolveStatus::Racing);
        self.status = SolveStatus::Converging;
    }

    pub fn settle_success(&mut self, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, SolveStatus::Converging);
        self.status = SolveStatus::Settled(Settlement::Success);
        self.settled_at = Some(now);
    }

    pub fn settle_failure(&mut self, kind: ErrorKind, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, SolveStatus::Converging);
        self.status = SolveStatus::Settled(Settlement::Failure);
        self.settled_at = Some(now);
        self.failure = Some(kind);
    }

    /// `Settled -> Idle`. Returns `false` (and changes nothing) otherwise.
    pub fn dismiss(&mut self) -> bool {
        if !self.is_settled() {
            return false;
        }
        *self = Self::default();
        true
    }
}
