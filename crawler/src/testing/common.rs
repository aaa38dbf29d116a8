use std::collections::{HashMap, HashSet};
use std::sync::{
    atomic::{AtomicUsize, Ordering::Relaxed},
    Mutex,
};

use async_trait::async_trait;
use reqwest::StatusCode;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tokio_util::sync::CancellationToken;

use crate::{
    app_config::JiraConfig,
    db_core::ensure_schema,
    error::{AnalysisError, SourceError},
    jira::{IssueSource, Ticket},
    model::{ResultStore, StoredRecord},
    prompt::{AnalysisResult, IssueAnalyzer},
};

pub async fn memory_store() -> DatabaseConnection {
    let mut db_options = ConnectOptions::new("sqlite::memory:");
    db_options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let conn = Database::connect(db_options)
        .await
        .expect("in-memory sqlite failed to open");
    ensure_schema(&conn).await.expect("schema bootstrap failed");
    conn
}

pub fn jira_config() -> JiraConfig {
    JiraConfig {
        url: "https://jira.example.com".to_string(),
        username: "bot".to_string(),
        password: "secret".to_string(),
        token: None,
        jql: "project = OPS".to_string(),
        page_size: 100,
        qa_field: None,
    }
}

pub fn ticket(key: &str) -> Ticket {
    Ticket {
        key: key.to_string(),
        title: format!("Issue {}", key),
        description: "Checkout spins forever".to_string(),
        ..Default::default()
    }
}

/// Tickets OPS-1 through OPS-n
pub fn tickets(n: usize) -> Vec<Ticket> {
    (1..=n).map(|i| ticket(&format!("OPS-{}", i))).collect()
}

pub fn analysis() -> AnalysisResult {
    AnalysisResult {
        module_category: "Payments".to_string(),
        symptom_category: "Timeout".to_string(),
        symptom_description: "Checkout spins forever".to_string(),
        root_cause_category: "Configuration".to_string(),
        root_cause_description: "Connection pool too small".to_string(),
        solution_category: "Config change".to_string(),
        solution_description: "Raised pool size".to_string(),
        is_closed: true,
        is_fixed: true,
        defect_type: "Performance".to_string(),
        technical_debt_description: "Pool size hard coded".to_string(),
        industry_solution: "Adaptive pools".to_string(),
        gap_analysis: "No autoscaling".to_string(),
        extended: None,
    }
}

// -- Issue source

pub struct FakeSource {
    tickets: Mutex<Vec<Ticket>>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        Self {
            tickets: Mutex::new(tickets),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn set_tickets(&self, tickets: Vec<Ticket>) {
        *self.tickets.lock().unwrap() = tickets;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Relaxed)
    }
}

#[async_trait]
impl IssueSource for FakeSource {
    async fn fetch_all(&self, _query: &str) -> Result<Vec<Ticket>, SourceError> {
        self.calls.fetch_add(1, Relaxed);
        if self.fail {
            return Err(SourceError::Status {
                status: StatusCode::BAD_GATEWAY,
                body: "tracker down".to_string(),
            });
        }
        Ok(self.tickets.lock().unwrap().clone())
    }
}

// -- Analyzer

#[derive(Default)]
pub struct FakeAnalyzer {
    failing: HashSet<String>,
    hanging: HashSet<String>,
    cancel_on: Option<(usize, CancellationToken)>,
    calls: Mutex<Vec<String>>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    /// Never answer for `key`
    pub fn hang_on(mut self, key: &str) -> Self {
        self.hanging.insert(key.to_string());
        self
    }

    /// Cancel `token` during the nth call and never answer it
    pub fn cancel_on_call(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on = Some((call, token));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueAnalyzer for FakeAnalyzer {
    async fn analyze(&self, ticket: &Ticket) -> Result<AnalysisResult, AnalysisError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(ticket.key.clone());
            calls.len()
        };

        if let Some((n, token)) = &self.cancel_on {
            if *n == call {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }
        if self.hanging.contains(&ticket.key) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&ticket.key) {
            return Err(AnalysisError::SchemaMismatch(
                "missing field `gap_analysis`".to_string(),
            ));
        }

        Ok(analysis())
    }
}

// -- Result store

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, StoredRecord>>,
    upserts: AtomicUsize,
    fail_lookups: bool,
    fail_upserts: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn fail_upsert_on(mut self, key: &str) -> Self {
        self.fail_upserts.insert(key.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<StoredRecord> {
        self.records.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Relaxed)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<StoredRecord>, DbErr> {
        if self.fail_lookups {
            return Err(DbErr::Conn(sea_orm::RuntimeErr::Internal(
                "connection reset".to_string(),
            )));
        }
        Ok(self.get(key))
    }

    async fn upsert(&self, record: &StoredRecord) -> Result<(), DbErr> {
        if self.fail_upserts.contains(&record.jira_key) {
            return Err(DbErr::Custom("disk full".to_string()));
        }
        self.upserts.fetch_add(1, Relaxed);
        self.records
            .lock()
            .unwrap()
            .insert(record.jira_key.clone(), record.clone());
        Ok(())
    }
}
