//! statskv Common - Shared types, configuration and schema validation

pub mod config;
pub mod record;
pub mod schema;

pub use config::*;
pub use record::*;
pub use schema::{ValidationIssue, ValidationIssues};
