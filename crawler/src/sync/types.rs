use std::{fmt, time::Duration};

use crate::error::{AppError, AppResult};

/// Lifecycle of one sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum RunPhase {
    #[default]
    Idle,
    Fetching,
    Dispatching,
    Draining,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum FailureStage {
    #[strum(serialize = "look up")]
    Lookup,
    #[strum(serialize = "analyze")]
    Analysis,
    #[strum(serialize = "store")]
    Store,
}

/// One per-ticket error, recorded and never raised on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketFailure {
    pub worker_id: usize,
    pub ticket_key: String,
    pub stage: FailureStage,
    pub error: String,
}

impl fmt::Display for TicketFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker {} failed to {} issue {}: {}",
            self.worker_id, self.stage, self.ticket_key, self.error
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOutcome {
    Processed,
    Skipped,
    /// Cancelled while the analysis call was in flight
    Interrupted,
}

/// Summary of a finished pass
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub fetched: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failures: Vec<TicketFailure>,
    pub not_attempted: usize,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.not_attempted == 0
    }

    /// Collapse per-ticket errors into one aggregate error
    pub fn into_result(self) -> AppResult<SyncReport> {
        if let Some(first) = self.failures.first() {
            return Err(AppError::PartialFailure {
                failed: self.failures.len(),
                first: first.to_string(),
            });
        }
        if self.not_attempted > 0 {
            return Err(AppError::Cancelled(self.not_attempted));
        }

        Ok(self)
    }
}
