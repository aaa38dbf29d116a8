mod orchestrator;
mod skip_policy;
mod types;

pub use orchestrator::SyncOrchestrator;
pub use skip_policy::{LookupErrorPolicy, SkipPolicy};
pub use types::{FailureStage, RunPhase, SyncReport, TicketFailure, TicketOutcome};
