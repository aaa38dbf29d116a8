//! Observability Module
//!
//! Progress tracking for sync passes.

mod sync_tracker;

pub use sync_tracker::SyncTracker;
