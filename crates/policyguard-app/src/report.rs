use anyhow::Context;
use camino::Utf8Path;
use policyguard_types::{ReportEnvelope, SCHEMA_REPORT_V1, Summary, ToolMeta, Verdict, ids};
use time::OffsetDateTime;

pub fn serialize_report(envelope: &ReportEnvelope) -> anyhow::Result<Vec<u8>> {
    let mut data = serde_json::to_vec_pretty(envelope).context("serialize report")?;
    data.push(b'\n');
    Ok(data)
}

/// Write `envelope` to `path`, creating parent directories as needed.
pub fn write_report(path: &Utf8Path, envelope: &ReportEnvelope) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| format!("create directory: {parent}"))?;
    }
    let data = serialize_report(envelope)?;
    std::fs::write(path, data).with_context(|| format!("write report: {path}"))?;
    Ok(())
}

/// A failing envelope for a run that aborted before producing results.
pub fn runtime_error_report(message: &str) -> ReportEnvelope {
    let now = OffsetDateTime::now_utc();
    ReportEnvelope {
        schema: SCHEMA_REPORT_V1.to_string(),
        tool: ToolMeta {
            name: ids::TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        started_at: now,
        finished_at: now,
        verdict: Verdict::Fail,
        summary: Summary::default(),
        namespaces: Vec::new(),
        error: Some(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_error_report_fails_with_message() {
        let envelope = runtime_error_report("load: no policies found in policy");
        assert_eq!(envelope.verdict, Verdict::Fail);
        assert_eq!(envelope.schema, "policyguard.report.v1");
        assert!(envelope.namespaces.is_empty());

        let value: serde_json::Value =
            serde_json::from_slice(&serialize_report(&envelope).expect("serialize")).expect("json");
        assert_eq!(value["error"], "load: no policies found in policy");
        assert_eq!(value["verdict"], "fail");
        assert_eq!(value["tool"]["name"], "policyguard");
    }

    #[test]
    fn write_report_creates_parent_directories() {
        let tmp = tempfile::TempDir::new().expect("temp dir");
        let root = Utf8Path::from_path(tmp.path()).expect("utf8");
        let path = root.join("out").join("nested").join("report.json");

        write_report(&path, &runtime_error_report("boom")).expect("write");

        let text = std::fs::read_to_string(&path).expect("read back");
        let parsed: ReportEnvelope = serde_json::from_str(&text).expect("parse back");
        assert_eq!(parsed.error.as_deref(), Some("boom"));
    }
}
