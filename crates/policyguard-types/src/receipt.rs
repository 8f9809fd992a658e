use crate::Report;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stable schema identifier for policyguard reports.
pub const SCHEMA_REPORT_V1: &str = "policyguard.report.v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

/// Which failed rule kinds turn the verdict into `fail`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FailOn {
    /// Only failed `deny`/`violation`/`fail` rules.
    #[default]
    Error,
    /// Failed `warn` rules as well.
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

/// Counts across every namespace in the envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub namespaces: u32,
    pub rules: u32,
    pub passed: u32,
    pub warnings: u32,
    pub failures: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceReport {
    pub namespace: String,
    pub report: Report,
}

/// Envelope written by the CLI for one check run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportEnvelope {
    /// Versioned schema identifier for the envelope shape.
    pub schema: String,
    pub tool: ToolMeta,
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub verdict: Verdict,
    pub summary: Summary,
    pub namespaces: Vec<NamespaceReport>,

    /// Set when the run aborted; `namespaces` is empty in that case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Summary {
    pub fn from_reports(reports: &[NamespaceReport]) -> Self {
        let mut s = Summary {
            namespaces: reports.len() as u32,
            ..Summary::default()
        };
        for nr in reports {
            s.rules += nr.report.rules.len() as u32;
            s.passed += nr.report.passed_count();
            s.warnings += nr.report.warning_count();
            s.failures += nr.report.failure_count();
        }
        s
    }
}
