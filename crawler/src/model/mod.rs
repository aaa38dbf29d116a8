pub mod analyzed_issue;

pub use analyzed_issue::{AnalyzedIssueCtrl, DbResultStore, ResultStore, StoredRecord};
