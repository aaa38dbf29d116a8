//! `SeaORM` Entity definitions for the issue crawler store

pub mod prelude;

pub mod analyzed_issue;
