//! CLI entry point for policyguard.
//!
//! This module is intentionally thin: it handles argument parsing, I/O, and exit codes.
//! All business logic lives in the `policyguard-app`, `policyguard-repo`, and
//! `policyguard-domain` crates.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use policyguard_app::{
    CheckInput, run_check, runtime_error_report, serialize_report, verdict_exit_code,
    write_report,
};
use policyguard_domain::{Backend, BuiltinRegistry};
use policyguard_github::GitHubRequest;
use policyguard_regorus::RegorusBackend;
use policyguard_repo::LoadOptions;
use policyguard_settings::{Overrides, ResolvedConfig, ResolvedGitHub};
use policyguard_types::ids;
use serde_json::Value as JsonValue;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "POLICYGUARD_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "policyguard",
    version,
    about = "Rego policy checks over structured input"
)]
struct Cli {
    /// Path to policyguard config TOML (defaults to ./policyguard.toml when present).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Policy file or directory. Repeatable; overrides `policy` from the config.
    #[arg(long = "policy")]
    policy: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate every rule against an input document and write the report.
    Check {
        /// Namespace to check. Repeatable; defaults to every namespace found.
        #[arg(long = "namespace")]
        namespace: Vec<String>,

        /// JSON input document, or `-` for stdin. Defaults to an empty object.
        #[arg(long)]
        input: Option<String>,

        /// Where to write the JSON report (stdout when omitted).
        #[arg(long)]
        report_out: Option<Utf8PathBuf>,

        /// Fail on `error` (default) or `warning`.
        #[arg(long)]
        fail_on: Option<String>,

        /// Do not register the `github.request` builtin.
        #[arg(long)]
        no_github: bool,
    },

    /// Print the namespaces declared by the policies, one per line.
    Namespaces,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match &cli.cmd {
        Commands::Check {
            namespace,
            input,
            report_out,
            fail_on,
            no_github,
        } => cmd_check(
            &cli,
            namespace.clone(),
            input.as_deref(),
            report_out.as_deref(),
            fail_on.clone(),
            *no_github,
        ),
        Commands::Namespaces => cmd_namespaces(&cli),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_check(
    cli: &Cli,
    namespaces: Vec<String>,
    input: Option<&str>,
    report_out: Option<&Utf8Path>,
    fail_on: Option<String>,
    no_github: bool,
) {
    let result = (|| -> anyhow::Result<i32> {
        let overrides = Overrides {
            policy: cli.policy.clone(),
            namespaces,
            fail_on,
            github_enabled: no_github.then_some(false),
        };
        let resolved = load_config(cli.config.as_deref(), overrides)?;

        let input = read_input(input)?;
        let backend = RegorusBackend::new();
        let builtins = builtin_registry(&backend, &resolved.github)?;
        let engine = policyguard_repo::load_engine_with(&load_options(&resolved), backend, builtins)?;

        let output = run_check(CheckInput {
            engine: &engine,
            input: &input,
            namespaces: resolved.namespaces.clone(),
            fail_on: resolved.fail_on,
        })?;

        match report_out {
            Some(path) => write_report(path, &output.envelope).context("write report json")?,
            None => {
                let data = serialize_report(&output.envelope)?;
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(&data)
                    .and_then(|()| stdout.flush())
                    .context("write report to stdout")?;
            }
        }

        Ok(verdict_exit_code(output.envelope.verdict))
    })();

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if let Some(path) = report_out {
                let report = runtime_error_report(&format!("{err:#}"));
                let _ = write_report(path, &report);
            }
            exit_with_error(&err)
        }
    }
}

fn cmd_namespaces(cli: &Cli) {
    let result = (|| -> anyhow::Result<()> {
        let overrides = Overrides {
            policy: cli.policy.clone(),
            ..Overrides::default()
        };
        let resolved = load_config(cli.config.as_deref(), overrides)?;

        // Compile as `check` does before listing.
        let backend = RegorusBackend::new();
        let builtins = builtin_registry(&backend, &resolved.github)?;
        let engine =
            policyguard_repo::load_engine_with(&load_options(&resolved), backend, builtins)?;

        let mut stdout = std::io::stdout().lock();
        for ns in engine.namespaces() {
            writeln!(stdout, "{ns}").context("write namespaces")?;
        }
        stdout.flush().context("write namespaces")
    })();

    if let Err(err) = result {
        exit_with_error(&err);
    }
}

fn exit_with_error(err: &anyhow::Error) -> ! {
    eprintln!("policyguard error: {err:#}");
    std::process::exit(1);
}

/// An explicit `--config` must exist; the default file is optional.
fn load_config(path: Option<&Utf8Path>, overrides: Overrides) -> anyhow::Result<ResolvedConfig> {
    let text = match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("read config: {path}"))?
        }
        None => std::fs::read_to_string(ids::CONFIG_FILE_NAME).unwrap_or_default(),
    };

    let cfg = if text.trim().is_empty() {
        policyguard_settings::PolicyguardConfigV1::default()
    } else {
        policyguard_settings::parse_config_toml(&text).context("parse config")?
    };
    policyguard_settings::resolve_config(cfg, overrides).context("resolve config")
}

fn load_options(resolved: &ResolvedConfig) -> LoadOptions {
    LoadOptions {
        paths: resolved.policy.iter().map(Utf8PathBuf::from).collect(),
        exclude: resolved.exclude.clone(),
    }
}

fn read_input(input: Option<&str>) -> anyhow::Result<JsonValue> {
    let text = match input {
        None => return Ok(JsonValue::Object(serde_json::Map::new())),
        Some("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("read input from stdin")?;
            text
        }
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("read input: {path}"))?,
    };
    serde_json::from_str(&text).context("parse input json")
}

fn builtin_registry<B: Backend>(
    backend: &B,
    github: &ResolvedGitHub,
) -> anyhow::Result<BuiltinRegistry> {
    let mut registry = BuiltinRegistry::new();
    if !github.enabled {
        return Ok(registry);
    }
    if !backend.supports_builtins() {
        tracing::warn!(
            builtin = ids::BUILTIN_GITHUB_REQUEST,
            "evaluation backend cannot host custom builtins; skipping"
        );
        return Ok(registry);
    }

    let client = github_client(github)?;
    registry.register(Arc::new(GitHubRequest::with_base_url(
        client,
        github.base_url.clone(),
    )));
    Ok(registry)
}

fn github_client(github: &ResolvedGitHub) -> anyhow::Result<reqwest::blocking::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    match std::env::var(&github.token_env) {
        Ok(token) if !token.trim().is_empty() => {
            let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .with_context(|| format!("invalid token in {}", github.token_env))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        _ => tracing::debug!(env = %github.token_env, "no github token; requests are anonymous"),
    }

    reqwest::blocking::Client::builder()
        .default_headers(headers)
        .timeout(github.timeout)
        .build()
        .context("build http client")
}
