use derive_more::derive::Display;
use reqwest::StatusCode;
use sea_orm::DbErr;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Display)]
pub enum AppError {
    #[display("configuration error: {_0}")]
    Config(config::ConfigError),
    #[display("connection error: {_0}")]
    Connect(String),
    #[display("issue source error: {_0}")]
    Source(SourceError),
    #[display("store error: {_0}")]
    Store(DbErr),
    #[display("encountered {failed} errors during processing, first error: {first}")]
    PartialFailure { failed: usize, first: String },
    #[display("sync cancelled with {_0} issues not attempted")]
    Cancelled(usize),
    Internal(anyhow::Error),
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error)
    }
}

impl From<SourceError> for AppError {
    fn from(error: SourceError) -> Self {
        AppError::Source(error)
    }
}

impl From<DbErr> for AppError {
    fn from(error: DbErr) -> Self {
        AppError::Store(error)
    }
}

/// Failure while paging through the issue tracker. Always fatal for the run.
#[derive(Debug, Display)]
pub enum SourceError {
    #[display("request failed: {_0}")]
    Request(reqwest::Error),
    #[display("tracker returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[display("could not decode search page: {_0}")]
    Decode(String),
    #[display("tracker reported {total} issues but stopped returning them after {retrieved}")]
    Incomplete { retrieved: usize, total: usize },
    #[display("fetch cancelled")]
    Cancelled,
}

impl std::error::Error for SourceError {}

impl From<reqwest::Error> for SourceError {
    fn from(error: reqwest::Error) -> Self {
        tracing::error!("Reqwest error: {:?}", error);
        match error.status() {
            Some(status) => SourceError::Status {
                status,
                body: error.to_string(),
            },
            None if error.is_decode() => SourceError::Decode(error.to_string()),
            None => SourceError::Request(error),
        }
    }
}

/// Failure to produce a structured verdict for one ticket. Recoverable per ticket.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[display("service unavailable: {_0}")]
    ServiceUnavailable(String),
    #[display("no structured content in reply")]
    NoStructuredContent,
    #[display("schema mismatch: {_0}")]
    SchemaMismatch(String),
    #[display("analysis cancelled")]
    Cancelled,
}

impl std::error::Error for AnalysisError {}

impl From<reqwest::Error> for AnalysisError {
    fn from(error: reqwest::Error) -> Self {
        AnalysisError::ServiceUnavailable(error.to_string())
    }
}
