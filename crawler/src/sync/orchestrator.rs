use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicUsize, Ordering::Relaxed},
    Arc, Mutex,
};
use std::time::{Duration, Instant};

use futures::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    app_config::{JiraConfig, SyncConfig},
    error::{AnalysisError, AppResult, SourceError},
    jira::{IssueSource, Ticket},
    model::{ResultStore, StoredRecord},
    observability::SyncTracker,
    prompt::IssueAnalyzer,
};

use super::{
    FailureStage, LookupErrorPolicy, RunPhase, SyncReport, TicketFailure, TicketOutcome,
};

#[derive(Default)]
struct RunCounts {
    processed: AtomicUsize,
    skipped: AtomicUsize,
    interrupted: AtomicUsize,
}

/// Fetch, fan out to a fixed worker pool, analyze, upsert
pub struct SyncOrchestrator {
    source: Arc<dyn IssueSource>,
    analyzer: Arc<dyn IssueAnalyzer>,
    store: Arc<dyn ResultStore>,
    jira: JiraConfig,
    sync: SyncConfig,
    tracker: SyncTracker,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn IssueSource>,
        analyzer: Arc<dyn IssueAnalyzer>,
        store: Arc<dyn ResultStore>,
        jira: JiraConfig,
        sync: SyncConfig,
    ) -> Self {
        Self {
            source,
            analyzer,
            store,
            jira,
            sync,
            tracker: SyncTracker::new(),
        }
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    /// Run one pass. Only a failed fetch is returned as an error; per-ticket
    /// failures are collected into the report.
    pub async fn run(&self, shutdown: CancellationToken) -> AppResult<SyncReport> {
        let started = Instant::now();
        let token = shutdown.child_token();
        let _run_guard = token.clone().drop_guard();

        if let Some(minutes) = self.sync.run_timeout_minutes {
            spawn_run_timer(token.clone(), Duration::from_secs(minutes * 60));
        }

        self.tracker.start_run();
        tracing::info!("Starting sync pass");

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => Err(SourceError::Cancelled),
            res = self.source.fetch_all(&self.jira.jql) => res,
        };
        let tickets = match fetched {
            Ok(tickets) => tickets,
            Err(e) => {
                self.tracker.set_phase(RunPhase::Failed);
                tracing::error!("Failed to fetch issues: {}", e);
                return Err(e.into());
            }
        };

        let fetched = tickets.len();
        tracing::info!("Fetched {} issues", fetched);
        self.tracker.set_fetched(fetched);
        self.tracker.set_phase(RunPhase::Dispatching);

        let queue = Mutex::new(VecDeque::from(tickets));
        let counts = RunCounts::default();
        let (failure_tx, mut failure_rx) = mpsc::unbounded_channel::<TicketFailure>();

        let workers = self.sync.workers.max(1).min(fetched);
        {
            let queue = &queue;
            let counts = &counts;
            let token = &token;
            stream::iter(0..workers)
                .for_each_concurrent(workers, |worker_id| {
                    let failure_tx = failure_tx.clone();
                    async move {
                        while !token.is_cancelled() {
                            let Some(ticket) = self.next_ticket(queue) else {
                                break;
                            };

                            match self.process_ticket(worker_id, &ticket, token).await {
                                Ok(TicketOutcome::Processed) => {
                                    counts.processed.fetch_add(1, Relaxed);
                                    self.tracker.record_outcome(TicketOutcome::Processed);
                                }
                                Ok(TicketOutcome::Skipped) => {
                                    counts.skipped.fetch_add(1, Relaxed);
                                    self.tracker.record_outcome(TicketOutcome::Skipped);
                                }
                                Ok(TicketOutcome::Interrupted) => {
                                    counts.interrupted.fetch_add(1, Relaxed);
                                }
                                Err(failure) => {
                                    tracing::error!("{}", failure);
                                    self.tracker.record_failure();
                                    let _ = failure_tx.send(failure);
                                }
                            }
                        }
                    }
                })
                .await;
        }
        drop(failure_tx);

        let mut failures = Vec::new();
        while let Some(failure) = failure_rx.recv().await {
            failures.push(failure);
        }

        let remaining = queue.lock().map(|q| q.len()).unwrap_or(0);
        let not_attempted = remaining + counts.interrupted.load(Relaxed);
        if not_attempted > 0 {
            tracing::warn!("Sync pass cancelled, {} issues not attempted", not_attempted);
        }

        let report = SyncReport {
            fetched,
            processed: counts.processed.load(Relaxed),
            skipped: counts.skipped.load(Relaxed),
            failures,
            not_attempted,
            elapsed: started.elapsed(),
        };

        self.tracker.set_phase(RunPhase::Done);
        self.tracker.log_report(&report);

        Ok(report)
    }

    fn next_ticket(&self, queue: &Mutex<VecDeque<Ticket>>) -> Option<Ticket> {
        let mut queue = queue.lock().ok()?;
        let ticket = queue.pop_front()?;
        if queue.is_empty() {
            self.tracker.set_phase(RunPhase::Draining);
        }
        self.tracker.ticket_taken();
        Some(ticket)
    }

    async fn process_ticket(
        &self,
        worker_id: usize,
        ticket: &Ticket,
        token: &CancellationToken,
    ) -> Result<TicketOutcome, TicketFailure> {
        let failure = |stage: FailureStage, error: String| TicketFailure {
            worker_id,
            ticket_key: ticket.key.clone(),
            stage,
            error,
        };

        match self.store.find_by_key(&ticket.key).await {
            Ok(Some(existing)) if self.sync.skip_policy.should_skip(&existing, ticket) => {
                tracing::info!(
                    "Worker {}: issue {} already analyzed, skipping",
                    worker_id,
                    ticket.key
                );
                return Ok(TicketOutcome::Skipped);
            }
            Ok(Some(_)) => {
                tracing::info!(
                    "Worker {}: issue {} needs re-analysis",
                    worker_id,
                    ticket.key
                );
            }
            Ok(None) => {}
            Err(e) => match self.sync.lookup_error_policy {
                LookupErrorPolicy::Process => {
                    tracing::warn!(
                        "Worker {}: lookup for issue {} failed, processing as new: {}",
                        worker_id,
                        ticket.key,
                        e
                    );
                }
                LookupErrorPolicy::Fail => {
                    return Err(failure(FailureStage::Lookup, e.to_string()));
                }
            },
        }

        tracing::info!("Worker {}: analyzing issue {}", worker_id, ticket.key);
        let analyzed = tokio::select! {
            biased;
            _ = token.cancelled() => Err(AnalysisError::Cancelled),
            res = self.analyzer.analyze(ticket) => res,
        };

        let analysis = match analyzed {
            Ok(analysis) => analysis,
            Err(AnalysisError::Cancelled) => {
                tracing::warn!(
                    "Worker {}: analysis of issue {} interrupted",
                    worker_id,
                    ticket.key
                );
                return Ok(TicketOutcome::Interrupted);
            }
            Err(e) => return Err(failure(FailureStage::Analysis, e.to_string())),
        };

        let record =
            StoredRecord::from_analysis(ticket, &analysis, self.jira.browse_url(&ticket.key));
        self.store
            .upsert(&record)
            .await
            .map_err(|e| failure(FailureStage::Store, e.to_string()))?;

        tracing::info!(
            "Worker {}: analyzed and saved issue {}",
            worker_id,
            ticket.key
        );
        Ok(TicketOutcome::Processed)
    }
}

fn spawn_run_timer(token: CancellationToken, limit: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                tracing::warn!("Sync pass exceeded {:?}, cancelling", limit);
                token.cancel();
            }
        }
    });
}
