//! Developer tasks (schema generation, report conformance).
//!
//! Keeping this separate avoids bloating the end-user CLI.

use anyhow::{Context, bail};
use policyguard_test_util::normalize_nondeterministic;
use policyguard_types::{ReportEnvelope, SCHEMA_REPORT_V1, Summary, ids};
use schemars::schema_for;
use std::fs;
use std::path::PathBuf;

/// Get the project root (parent of xtask directory).
fn project_root() -> anyhow::Result<PathBuf> {
    let manifest_dir = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir().context("determine current directory")?,
    };

    // If we're in the xtask directory, go up one level
    if manifest_dir.ends_with("xtask")
        && let Some(parent) = manifest_dir.parent()
    {
        return Ok(parent.to_path_buf());
    }
    Ok(manifest_dir)
}

fn schemas_dir() -> anyhow::Result<PathBuf> {
    Ok(project_root()?.join("schemas"))
}

fn contracts_fixtures_dir() -> anyhow::Result<PathBuf> {
    Ok(project_root()?.join("contracts").join("fixtures"))
}

/// Schema definition with its target filename.
struct SchemaSpec {
    filename: &'static str,
    generate: fn() -> schemars::Schema,
}

fn generate_report_schema() -> schemars::Schema {
    schema_for!(ReportEnvelope)
}

fn generate_config_schema() -> schemars::Schema {
    schema_for!(policyguard_settings::PolicyguardConfigV1)
}

fn schema_specs() -> Vec<SchemaSpec> {
    vec![
        SchemaSpec {
            filename: "policyguard.report.v1.json",
            generate: generate_report_schema,
        },
        SchemaSpec {
            filename: "policyguard.config.v1.json",
            generate: generate_config_schema,
        },
    ]
}

/// Serialize a schema to pretty-printed JSON with trailing newline.
fn serialize_schema(schema: &schemars::Schema) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(schema).context("Failed to serialize schema")?;
    json.push('\n');
    Ok(json)
}

/// Emit schemas to the schemas/ directory.
fn emit_schemas() -> anyhow::Result<()> {
    let dir = schemas_dir()?;
    fs::create_dir_all(&dir).context("Failed to create schemas directory")?;

    for spec in schema_specs() {
        let json = serialize_schema(&(spec.generate)())?;
        let path = dir.join(spec.filename);
        fs::write(&path, &json)
            .with_context(|| format!("Failed to write schema to {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    println!("\nSchemas emitted successfully.");
    Ok(())
}

/// Validate that schemas in the repo match what would be generated.
fn validate_schemas() -> anyhow::Result<()> {
    let dir = schemas_dir()?;
    let mut missing = Vec::new();
    let mut mismatched = Vec::new();

    for spec in schema_specs() {
        let path = dir.join(spec.filename);
        if !path.exists() {
            missing.push(spec.filename);
            continue;
        }

        let expected = serialize_schema(&(spec.generate)())?;
        let actual = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if expected != actual {
            mismatched.push(spec.filename);
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        println!("All schemas are up to date.");
        return Ok(());
    }

    if !missing.is_empty() {
        eprintln!("Missing schemas:");
        for name in &missing {
            eprintln!("  - {name}");
        }
    }
    if !mismatched.is_empty() {
        eprintln!("Schemas out of date:");
        for name in &mismatched {
            eprintln!("  - {name}");
        }
    }
    eprintln!("\nRun `cargo xtask emit-schemas` to regenerate.");
    bail!("Schema validation failed")
}

fn print_help() {
    eprintln!("xtask commands:");
    eprintln!("  help              Show this message");
    eprintln!("  emit-schemas      Generate JSON schemas from Rust types to schemas/");
    eprintln!("  validate-schemas  Check if schemas/ matches generated output (for CI)");
    eprintln!("  print-schema-ids  Print known schema IDs");
    eprintln!("  conform           Validate contract fixtures against the report schema");
}

/// Consistency rules the schema cannot express.
fn envelope_errors(filename: &str, envelope: &ReportEnvelope) -> Vec<String> {
    let mut errors = Vec::new();

    if envelope.schema != SCHEMA_REPORT_V1 {
        errors.push(format!("{filename}: schema '{}' is not {SCHEMA_REPORT_V1}", envelope.schema));
    }
    if envelope.tool.name != ids::TOOL_NAME {
        errors.push(format!("{filename}: tool.name '{}' is not {}", envelope.tool.name, ids::TOOL_NAME));
    }
    if envelope.error.is_some() && !envelope.namespaces.is_empty() {
        errors.push(format!("{filename}: runtime error report carries namespaces"));
    }

    let summary = Summary::from_reports(&envelope.namespaces);
    if summary != envelope.summary {
        errors.push(format!(
            "{filename}: summary {:?} does not match results {:?}",
            envelope.summary, summary
        ));
    }

    for ns in &envelope.namespaces {
        for (uid, rule) in &ns.report.rules {
            if rule.namespace != ns.namespace {
                errors.push(format!("{filename}: rule {uid} is outside namespace {}", ns.namespace));
            }
            if *uid != rule.uid() {
                errors.push(format!("{filename}: rule key {uid} does not match uid {}", rule.uid()));
            }
        }
        for (uid, result) in &ns.report.results {
            let Some(rule) = ns.report.rules.get(uid) else {
                errors.push(format!("{filename}: result {uid} has no rule"));
                continue;
            };
            if result.query != rule.query() {
                errors.push(format!(
                    "{filename}: result {uid} queried '{}', expected '{}'",
                    result.query,
                    rule.query()
                ));
            }
        }
    }

    errors
}

/// Validate contract fixtures.
///
/// This checks:
/// 1. Schema validation against the generated report schema
/// 2. Round-trip through `ReportEnvelope` without loss (timestamps normalized)
/// 3. Summary counts and rule uid/query conventions
fn conform() -> anyhow::Result<()> {
    let schema_value =
        serde_json::to_value(generate_report_schema()).context("Failed to serialize schema")?;
    let compiled = jsonschema::validator_for(&schema_value)
        .map_err(|e| anyhow::anyhow!("Failed to compile schema: {e}"))?;
    println!("✓ {SCHEMA_REPORT_V1} schema compiles");

    let fixtures_dir = contracts_fixtures_dir()?;
    if !fixtures_dir.exists() {
        bail!("contracts/fixtures/ not found at {}", fixtures_dir.display());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(&fixtures_dir)
        .context("Failed to read contracts/fixtures/")?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    let mut fixture_count = 0;
    let mut errors = Vec::new();

    for path in entries {
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {filename}"))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {filename} as JSON"))?;

        for err in compiled.iter_errors(&value) {
            errors.push(format!("{filename}: schema validation: {err}"));
        }

        match serde_json::from_value::<ReportEnvelope>(value.clone()) {
            Ok(envelope) => {
                let round_trip = serde_json::to_value(&envelope)?;
                if normalize_nondeterministic(round_trip) != normalize_nondeterministic(value) {
                    errors.push(format!("{filename}: does not round-trip through ReportEnvelope"));
                }
                errors.extend(envelope_errors(&filename, &envelope));
            }
            Err(e) => errors.push(format!("{filename}: deserialize: {e}")),
        }

        fixture_count += 1;
        println!("  ✓ {filename} checked");
    }

    if fixture_count == 0 {
        bail!("No JSON fixtures found in {}", fixtures_dir.display());
    }

    if !errors.is_empty() {
        eprintln!("\nConformance errors:");
        for err in &errors {
            eprintln!("  - {err}");
        }
        bail!("Conformance validation failed with {} errors", errors.len());
    }

    println!("\n✓ All {fixture_count} contract fixtures pass conformance checks!");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match cmd {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        "emit-schemas" => emit_schemas(),
        "validate-schemas" => validate_schemas(),
        "conform" => conform(),
        "print-schema-ids" => {
            println!("{SCHEMA_REPORT_V1}");
            println!("{}", ids::SCHEMA_CONFIG_V1);
            Ok(())
        }
        other => bail!("unknown xtask command: {other}\n\nRun `cargo xtask help` for usage."),
    }
    .context("xtask failed")
}
