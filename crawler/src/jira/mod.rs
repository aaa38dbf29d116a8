mod client;
pub(crate) mod issue;

use async_trait::async_trait;

use crate::error::SourceError;

pub use client::JiraClient;
pub use issue::Ticket;

/// Anything that can list every ticket matching a query.
/// Implementations return the full result set or an error, never a partial set.
#[async_trait]
pub trait IssueSource: Send + Sync {
    async fn fetch_all(&self, query: &str) -> Result<Vec<Ticket>, SourceError>;
}
