//! The `check` use case: evaluate every requested namespace and produce an envelope.

use anyhow::Context;
use policyguard_domain::{Backend, Engine};
use policyguard_types::{
    FailOn, NamespaceReport, ReportEnvelope, SCHEMA_REPORT_V1, Summary, ToolMeta, Verdict, ids,
};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

/// Input for the check use case.
pub struct CheckInput<'a, B: Backend> {
    pub engine: &'a Engine<B>,
    /// Document the rules are evaluated against.
    pub input: &'a JsonValue,
    /// Namespaces to check. Empty means every namespace the engine knows.
    pub namespaces: Vec<String>,
    pub fail_on: FailOn,
}

/// Output from the check use case.
#[derive(Clone, Debug)]
pub struct CheckOutput {
    pub envelope: ReportEnvelope,
}

/// Run the check use case. The first query error aborts the run.
pub fn run_check<B: Backend>(input: CheckInput<'_, B>) -> anyhow::Result<CheckOutput> {
    let started_at = OffsetDateTime::now_utc();

    let namespaces = if input.namespaces.is_empty() {
        input.engine.namespaces()
    } else {
        input.namespaces
    };

    let mut reports = Vec::with_capacity(namespaces.len());
    for namespace in namespaces {
        let report = input
            .engine
            .check(&namespace, input.input)
            .with_context(|| format!("check namespace {namespace}"))?;
        if report.is_empty() {
            tracing::warn!(namespace = %namespace, "namespace has no rules");
        }
        reports.push(NamespaceReport { namespace, report });
    }

    let verdict = compute_verdict(&reports, input.fail_on);
    let summary = Summary::from_reports(&reports);
    let finished_at = OffsetDateTime::now_utc();

    tracing::info!(
        namespaces = summary.namespaces,
        failures = summary.failures,
        warnings = summary.warnings,
        ?verdict,
        "check finished"
    );

    Ok(CheckOutput {
        envelope: ReportEnvelope {
            schema: SCHEMA_REPORT_V1.to_string(),
            tool: ToolMeta {
                name: ids::TOOL_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            started_at,
            finished_at,
            verdict,
            summary,
            namespaces: reports,
            error: None,
        },
    })
}

/// Failed failure-kind rules fail the run. Failed warnings warn, or fail under
/// [`FailOn::Warning`].
pub fn compute_verdict(reports: &[NamespaceReport], fail_on: FailOn) -> Verdict {
    let failures: u32 = reports.iter().map(|r| r.report.failure_count()).sum();
    let warnings: u32 = reports.iter().map(|r| r.report.warning_count()).sum();

    if failures > 0 {
        Verdict::Fail
    } else if warnings > 0 {
        match fail_on {
            FailOn::Error => Verdict::Warn,
            FailOn::Warning => Verdict::Fail,
        }
    } else {
        Verdict::Pass
    }
}

/// Map a verdict to an exit code.
///
/// Exit codes:
/// - 0: pass or warn
/// - 2: policy failure
///
/// Note: exit code 1 is reserved for tool/runtime errors and handled by the CLI.
pub fn verdict_exit_code(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Pass => 0,
        Verdict::Warn => 0,
        Verdict::Fail => 2,
    }
}
