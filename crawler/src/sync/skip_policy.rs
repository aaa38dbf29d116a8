use serde::Deserialize;

use crate::{jira::Ticket, model::StoredRecord};

/// Decides whether an already stored ticket needs another analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipPolicy {
    /// Any stored record is final
    Always,
    /// Skip only while both the stored record and the fresh ticket are unresolved
    #[default]
    UntilResolved,
    /// Re-analyze once, when a ticket stored while open comes back resolved
    ResolveOnce,
}

impl SkipPolicy {
    pub fn should_skip(&self, existing: &StoredRecord, fresh: &Ticket) -> bool {
        match self {
            SkipPolicy::Always => true,
            SkipPolicy::UntilResolved => existing.resolved_at.is_none() && !fresh.is_resolved(),
            SkipPolicy::ResolveOnce => existing.resolved_at.is_some() || !fresh.is_resolved(),
        }
    }
}

/// What to do when the lookup that decides skip-or-process fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LookupErrorPolicy {
    /// Treat the ticket as not stored yet and analyze it
    #[default]
    Process,
    /// Record a per-ticket failure and move on
    Fail,
}
