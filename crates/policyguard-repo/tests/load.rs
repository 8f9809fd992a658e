//! Integration tests for loading policy modules from disk.

use camino::{Utf8Path, Utf8PathBuf};
use policyguard_domain::{EngineError, LoadError};
use policyguard_repo::{LoadOptions, load_engine, load_engine_with, load_modules};
use policyguard_test_util::ScriptedBackend;
use serde_json::json;
use tempfile::TempDir;

/// Repo root / tests / fixtures.
fn fixtures_dir() -> Utf8PathBuf {
    let manifest_dir = Utf8Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/policyguard-repo -> crates -> repo root
    manifest_dir
        .parent()
        .and_then(Utf8Path::parent)
        .expect("repo root")
        .join("tests")
        .join("fixtures")
}

#[test]
fn fixture_policies_load_and_expose_namespaces() {
    let engine = load_engine(&[fixtures_dir().join("policies")], ScriptedBackend::new())
        .expect("engine");

    assert_eq!(engine.modules().len(), 3);
    assert_eq!(
        engine.namespaces(),
        vec!["github.organization", "github.repository"]
    );

    let report = engine
        .check("github.repository", &json!({}))
        .expect("check");
    let uids: Vec<&str> = report.rules.keys().map(String::as_str).collect();
    assert_eq!(
        uids,
        vec![
            "github.repository.deny_missing_license",
            "github.repository.deny_unprotected_default_branch",
            "github.repository.warn_stale",
        ]
    );
    let license = &report.rules["github.repository.deny_missing_license"];
    assert_eq!(license.title.as_deref(), Some("Repository has a license"));
    assert!(
        license
            .description
            .as_deref()
            .is_some_and(|d| d.starts_with("Public repositories"))
    );
    assert_eq!(license.custom["severity"], "high");
}

#[test]
fn directory_without_rego_files_is_no_policies() {
    let err = load_engine(&[fixtures_dir().join("no_policies")], ScriptedBackend::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::Load(LoadError::NoPolicies { .. })));
    assert!(err.to_string().starts_with("load: no policies found in"));
}

#[test]
fn parse_errors_are_fatal() {
    let err = load_engine(&[fixtures_dir().join("broken")], ScriptedBackend::new())
        .unwrap_err();
    match err {
        EngineError::Load(LoadError::Parse(e)) => {
            assert!(e.path.ends_with("broken/unbalanced.rego"), "{}", e.path);
            assert!(e.message.contains("unclosed"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_path_is_reported() {
    let err = load_engine(&[fixtures_dir().join("does-not-exist")], ScriptedBackend::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::Load(LoadError::Missing { .. })));
}

#[test]
fn excludes_apply_before_parsing() {
    let options = LoadOptions {
        paths: vec![fixtures_dir().join("policies"), fixtures_dir().join("broken")],
        exclude: vec!["**/unbalanced.rego".to_string(), "organization/**".to_string()],
    };
    let modules = load_modules(&options, &ScriptedBackend::new()).expect("modules");
    assert_eq!(modules.len(), 2);
    assert!(modules.iter().all(|m| m.package == "data.github.repository"));
}

#[test]
fn compile_failures_surface_after_loading() {
    let tmp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf8");
    std::fs::write(root.join("a.rego"), "package a\n\ndeny := true\n").expect("write");

    let backend = ScriptedBackend::new()
        .failing_compile(policyguard_domain::CompileErrors::single("rego_type_error: boom"));
    let err = load_engine_with(
        &LoadOptions::new(vec![root]),
        backend,
        policyguard_domain::BuiltinRegistry::new(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "compiler: 1 error occurred: rego_type_error: boom");
}
