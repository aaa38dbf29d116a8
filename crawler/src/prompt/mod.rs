pub(crate) mod analysis;
pub(crate) mod chat;

use async_trait::async_trait;

use crate::{error::AnalysisError, jira::Ticket};

pub use analysis::{AnalysisResult, ChatAnalyzer};

/// Produces a structured verdict for one ticket
#[async_trait]
pub trait IssueAnalyzer: Send + Sync {
    async fn analyze(&self, ticket: &Ticket) -> Result<AnalysisResult, AnalysisError>;
}
