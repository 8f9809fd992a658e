//! Black-box tests of the `policyguard` binary. No test reaches the network.

use assert_cmd::Command;
use camino::{Utf8Path, Utf8PathBuf};
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to get a Command for the policyguard binary.
#[allow(deprecated)]
fn policyguard_cmd() -> Command {
    Command::cargo_bin("policyguard").unwrap()
}

fn fixtures_dir() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Utf8Path::parent)
        .expect("repo root")
        .join("tests")
        .join("fixtures")
}

fn temp_root() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf8");
    (tmp, root)
}

#[test]
fn help_works() {
    policyguard_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("namespaces"));
}

#[test]
fn check_help_lists_flags() {
    policyguard_cmd()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--namespace"))
        .stdout(predicate::str::contains("--report-out"))
        .stdout(predicate::str::contains("--fail-on"));
}

#[test]
fn version_works() {
    policyguard_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("policyguard "));
}

#[test]
fn namespaces_lists_fixture_namespaces() {
    policyguard_cmd()
        .arg("--policy")
        .arg(fixtures_dir().join("policies").as_str())
        .arg("namespaces")
        .assert()
        .success()
        .stdout("github.organization\ngithub.repository\n");
}

#[test]
fn namespaces_honors_config_file() {
    let (_tmp, root) = temp_root();
    let config = root.join("policyguard.toml");
    std::fs::write(
        &config,
        format!(
            "policy = [{:?}]\nexclude = [\"organization/**\"]\n",
            fixtures_dir().join("policies").as_str()
        ),
    )
    .expect("write config");

    policyguard_cmd()
        .arg("--config")
        .arg(config.as_str())
        .arg("namespaces")
        .assert()
        .success()
        .stdout("github.repository\n");
}

#[test]
fn missing_config_file_is_an_error() {
    let (_tmp, root) = temp_root();
    policyguard_cmd()
        .arg("--config")
        .arg(root.join("absent.toml").as_str())
        .arg("namespaces")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("policyguard error: read config"));
}

#[test]
fn no_policies_is_a_runtime_error() {
    policyguard_cmd()
        .arg("--policy")
        .arg(fixtures_dir().join("no_policies").as_str())
        .arg("namespaces")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no policies found in"));
}

#[test]
fn parse_errors_are_reported() {
    policyguard_cmd()
        .arg("--policy")
        .arg(fixtures_dir().join("broken").as_str())
        .arg("namespaces")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unbalanced.rego"));
}

#[test]
fn check_writes_runtime_error_report_when_github_is_unreachable() {
    let (_tmp, root) = temp_root();
    let config = root.join("policyguard.toml");
    std::fs::write(&config, "[github]\nbase_url = \"http://127.0.0.1:9/\"\ntimeout_secs = 5\n")
        .expect("write config");
    let report = root.join("out").join("report.json");

    policyguard_cmd()
        .env_remove("GITHUB_TOKEN")
        .arg("--config")
        .arg(config.as_str())
        .arg("--policy")
        .arg(fixtures_dir().join("policies").as_str())
        .args(["check", "--namespace", "github.repository", "--input"])
        .arg(fixtures_dir().join("inputs").join("repository.json").as_str())
        .arg("--report-out")
        .arg(report.as_str())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("policyguard error: check namespace github.repository"))
        .stderr(predicate::str::contains(
            "query rule: github.repository.deny_unprotected_default_branch",
        ))
        .stderr(predicate::str::contains("github.request: send request"));

    let text = std::fs::read_to_string(&report).expect("runtime error report");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["schema"], "policyguard.report.v1");
    assert_eq!(value["verdict"], "fail");
    assert!(
        value["error"]
            .as_str()
            .is_some_and(|e| e.contains("github.request"))
    );
}

fn check_organization(input: &str) -> assert_cmd::assert::Assert {
    let (_tmp, root) = temp_root();
    let path = root.join("organization.json");
    std::fs::write(&path, input).expect("write input");

    policyguard_cmd()
        .arg("--policy")
        .arg(fixtures_dir().join("policies").as_str())
        .args(["check", "--namespace", "github.organization", "--input"])
        .arg(path.as_str())
        .assert()
}

#[test]
fn check_passes_a_compliant_organization() {
    let assert = check_organization(r#"{"two_factor_requirement_enabled": true, "members": ["octocat"]}"#)
        .code(0);
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("report json");
    assert_eq!(value["verdict"], "pass");
}

#[test]
fn check_fails_a_noncompliant_organization() {
    let assert = check_organization(r#"{"two_factor_requirement_enabled": false, "members": []}"#)
        .code(2);
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("report json");
    assert_eq!(value["verdict"], "fail");
    assert_eq!(value["summary"]["failures"], 2);
}

#[test]
fn print_output_reaches_stderr() {
    let (_tmp, root) = temp_root();
    let policy = root.join("policy");
    std::fs::create_dir_all(&policy).expect("policy dir");
    std::fs::write(
        policy.join("debug.rego"),
        "package demo\n\nimport rego.v1\n\ndeny_named if {\n\tprint(\"checking\", input.name)\n\tinput.name == \"bad\"\n}\n",
    )
    .expect("write policy");

    policyguard_cmd()
        .arg("--policy")
        .arg(policy.as_str())
        .args(["check", "--no-github", "--input", "-"])
        .write_stdin(r#"{"name": "octo"}"#)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("checking"))
        .stderr(predicate::str::contains("octo"));
}

#[test]
fn check_rejects_invalid_input_json() {
    let (_tmp, root) = temp_root();
    let input = root.join("input.json");
    std::fs::write(&input, "{ not json").expect("write input");

    policyguard_cmd()
        .arg("--policy")
        .arg(fixtures_dir().join("policies").as_str())
        .arg("check")
        .arg("--input")
        .arg(input.as_str())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("parse input json"));
}

#[test]
fn check_rejects_unknown_fail_on() {
    policyguard_cmd()
        .arg("--policy")
        .arg(fixtures_dir().join("policies").as_str())
        .args(["check", "--fail-on", "sometimes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown fail_on"));
}
