//! Sync Tracker Module
//!
//! Live counters and phase for the current sync pass, rendered as a status table
//! at phase changes and when a pass ends.

use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{info, warn};

use crate::sync::{RunPhase, SyncReport, TicketOutcome};

// ============================================================================
// Status Rendering
// ============================================================================

/// Render one status line as a boxed two-row table, each column sized to the
/// wider of its label and value
fn render_status(columns: &[(&str, String)]) -> String {
    let mut labels = Vec::with_capacity(columns.len());
    let mut rules = Vec::with_capacity(columns.len());
    let mut values = Vec::with_capacity(columns.len());

    for (label, value) in columns {
        let width = label.len().max(value.len());
        labels.push(format!("{label:<width$}"));
        rules.push("-".repeat(width));
        values.push(format!("{value:<width$}"));
    }

    format!(
        "| {} |\n|-{}-|\n| {} |\n",
        labels.join(" | "),
        rules.join("-|-"),
        values.join(" | ")
    )
}

/// Format elapsed seconds as "Xm Ys" or "Ys"
fn format_elapsed(secs: u64) -> String {
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

// ============================================================================
// Sync Tracking
// ============================================================================

#[derive(Default)]
struct Counters {
    fetched: AtomicUsize,
    processed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    in_queue: AtomicUsize,
}

/// Point-in-time copy of the tracker state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub phase: RunPhase,
    pub fetched: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub in_queue: usize,
}

/// Thread-safe tracker shared by the orchestrator and its workers
#[derive(Clone, Default)]
pub struct SyncTracker {
    phase: Arc<RwLock<RunPhase>>,
    started_at: Arc<RwLock<Option<Instant>>>,
    counters: Arc<Counters>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all counters for a new pass
    pub fn start_run(&self) {
        for counter in [
            &self.counters.fetched,
            &self.counters.processed,
            &self.counters.skipped,
            &self.counters.failed,
            &self.counters.in_queue,
        ] {
            counter.store(0, Relaxed);
        }
        if let Ok(mut started_at) = self.started_at.write() {
            *started_at = Some(Instant::now());
        }
        self.set_phase(RunPhase::Fetching);
    }

    pub fn set_phase(&self, phase: RunPhase) {
        if let Ok(mut current) = self.phase.write() {
            *current = phase;
        }
        tracing::debug!("Sync phase: {}\n{}", phase, self.get_status_table());
    }

    pub fn phase(&self) -> RunPhase {
        self.phase.read().map(|p| *p).unwrap_or_default()
    }

    pub fn set_fetched(&self, fetched: usize) {
        self.counters.fetched.store(fetched, Relaxed);
        self.counters.in_queue.store(fetched, Relaxed);
    }

    pub fn ticket_taken(&self) {
        let _ = self
            .counters
            .in_queue
            .fetch_update(Relaxed, Relaxed, |n| n.checked_sub(1));
    }

    pub fn record_outcome(&self, outcome: TicketOutcome) {
        match outcome {
            TicketOutcome::Processed => self.counters.processed.fetch_add(1, Relaxed),
            TicketOutcome::Skipped => self.counters.skipped.fetch_add(1, Relaxed),
            TicketOutcome::Interrupted => 0,
        };
    }

    pub fn record_failure(&self) {
        self.counters.failed.fetch_add(1, Relaxed);
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started_at
            .read()
            .ok()
            .and_then(|s| *s)
            .map(|s| s.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            phase: self.phase(),
            fetched: self.counters.fetched.load(Relaxed),
            processed: self.counters.processed.load(Relaxed),
            skipped: self.counters.skipped.load(Relaxed),
            failed: self.counters.failed.load(Relaxed),
            in_queue: self.counters.in_queue.load(Relaxed),
        }
    }

    /// Current pass as a status table
    pub fn get_status_table(&self) -> String {
        let s = self.snapshot();
        render_status(&[
            ("Phase", s.phase.to_string()),
            ("Fetched", s.fetched.to_string()),
            ("Processed", s.processed.to_string()),
            ("Skipped", s.skipped.to_string()),
            ("Failed", s.failed.to_string()),
            ("In Queue", s.in_queue.to_string()),
            ("Elapsed", format_elapsed(self.elapsed_secs())),
        ])
    }

    /// Log the status table for a finished pass
    pub fn log_report(&self, report: &SyncReport) {
        let table = render_status(&[
            ("Phase", self.phase().to_string()),
            ("Fetched", report.fetched.to_string()),
            ("Processed", report.processed.to_string()),
            ("Skipped", report.skipped.to_string()),
            ("Failed", report.failed().to_string()),
            ("Not Attempted", report.not_attempted.to_string()),
            ("Elapsed", format_elapsed(report.elapsed.as_secs())),
        ]);

        if report.is_clean() {
            info!("Sync Status Update:\n{}", table);
        } else {
            warn!("Sync Status Update:\n{}", table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_status_sizes_columns() {
        let table = render_status(&[
            ("Phase", "Dispatching".to_string()),
            ("Fetched", "7".to_string()),
        ]);

        assert_eq!(
            table,
            concat!(
                "| Phase       | Fetched |\n",
                "|-------------|---------|\n",
                "| Dispatching | 7       |\n",
            )
        );
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(42), "42s");
        assert_eq!(format_elapsed(125), "2m 5s");
    }

    #[test]
    fn test_counters() {
        let tracker = SyncTracker::new();
        tracker.start_run();
        tracker.set_fetched(3);
        tracker.ticket_taken();
        tracker.record_outcome(TicketOutcome::Processed);
        tracker.ticket_taken();
        tracker.record_outcome(TicketOutcome::Skipped);
        tracker.ticket_taken();
        tracker.record_failure();
        tracker.ticket_taken();
        tracker.set_phase(RunPhase::Done);

        assert_eq!(
            tracker.snapshot(),
            SyncSnapshot {
                phase: RunPhase::Done,
                fetched: 3,
                processed: 1,
                skipped: 1,
                failed: 1,
                in_queue: 0,
            }
        );
        assert!(tracker.get_status_table().contains("| Done "));
    }

    #[test]
    fn test_start_run_resets() {
        let tracker = SyncTracker::new();
        tracker.start_run();
        tracker.set_fetched(5);
        tracker.record_failure();

        tracker.start_run();
        let s = tracker.snapshot();
        assert_eq!((s.fetched, s.failed), (0, 0));
        assert_eq!(s.phase, RunPhase::Fetching);
    }
}
