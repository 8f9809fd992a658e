//! Stable DTOs and IDs used across the policyguard workspace.
//!
//! This crate is intentionally boring:
//! - rule, result, and report types produced by a check
//! - the report envelope written by the CLI
//! - stable string IDs (schema ids, builtin names, query roots)
//! - canonical module path handling

#![forbid(unsafe_code)]

pub mod github;
pub mod ids;
pub mod path;
pub mod receipt;
pub mod rule;

pub use github::GitHubResponse;
pub use path::ModulePath;
pub use receipt::{
    FailOn, NamespaceReport, ReportEnvelope, SCHEMA_REPORT_V1, Summary, ToolMeta, Verdict,
};
pub use rule::{Report, Rule, RuleKind, RuleResult};
