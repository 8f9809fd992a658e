//! Use case orchestration for policyguard.
//!
//! This crate provides the application layer: it runs an [`policyguard_domain::Engine`] over the
//! requested namespaces and wraps the results in a [`policyguard_types::ReportEnvelope`]. It is
//! intentionally thin; loading lives in `policyguard-repo` and evaluation in `policyguard-domain`.
//!
//! The CLI crate depends on this; it only handles argument parsing and I/O.

#![forbid(unsafe_code)]

mod check;
mod report;

pub use check::{CheckInput, CheckOutput, compute_verdict, run_check, verdict_exit_code};
pub use report::{runtime_error_report, serialize_report, write_report};
