//! `SeaORM` Entity prelude

pub use super::analyzed_issue::Entity as AnalyzedIssue;
