use crate::model::PolicyguardConfigV1;
use anyhow::Context;
use globset::Glob;
use policyguard_types::{FailOn, ids};
use std::time::Duration;
use url::Url;

const DEFAULT_POLICY_PATH: &str = "policy";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Values supplied on the command line. Set values win over the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub policy: Vec<String>,
    pub namespaces: Vec<String>,
    pub fail_on: Option<String>,
    pub github_enabled: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedGitHub {
    pub enabled: bool,
    pub base_url: Url,
    pub token_env: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub policy: Vec<String>,
    /// Empty means every namespace.
    pub namespaces: Vec<String>,
    pub exclude: Vec<String>,
    pub fail_on: FailOn,
    pub github: ResolvedGitHub,
}

pub fn resolve_config(
    cfg: PolicyguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedConfig> {
    if let Some(schema) = cfg.schema.as_deref()
        && schema != ids::SCHEMA_CONFIG_V1
    {
        anyhow::bail!(
            "unsupported config schema: {schema} (expected {})",
            ids::SCHEMA_CONFIG_V1
        );
    }

    let policy = first_non_empty(overrides.policy, cfg.policy)
        .unwrap_or_else(|| vec![DEFAULT_POLICY_PATH.to_string()]);
    if policy.iter().any(|p| p.trim().is_empty()) {
        anyhow::bail!("policy paths must not be empty");
    }

    let namespaces = first_non_empty(overrides.namespaces, cfg.namespaces).unwrap_or_default();

    validate_excludes(&cfg.exclude)?;

    let fail_on = match overrides.fail_on.or(cfg.fail_on) {
        Some(v) => parse_fail_on(&v)?,
        None => FailOn::default(),
    };

    let base_url = cfg
        .github
        .base_url
        .as_deref()
        .unwrap_or(ids::GITHUB_API_BASE_URL);
    let base_url = parse_base_url(base_url).context("invalid github.base_url")?;

    let timeout_secs = cfg.github.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be greater than zero");
    }

    let token_env = cfg
        .github
        .token_env
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| ids::GITHUB_TOKEN_ENV.to_string());

    let github = ResolvedGitHub {
        enabled: overrides
            .github_enabled
            .or(cfg.github.enabled)
            .unwrap_or(true),
        base_url,
        token_env,
        timeout: Duration::from_secs(timeout_secs),
    };

    Ok(ResolvedConfig {
        policy,
        namespaces,
        exclude: cfg.exclude,
        fail_on,
        github,
    })
}

fn first_non_empty(primary: Vec<String>, fallback: Vec<String>) -> Option<Vec<String>> {
    if !primary.is_empty() {
        Some(primary)
    } else if !fallback.is_empty() {
        Some(fallback)
    } else {
        None
    }
}

fn validate_excludes(patterns: &[String]) -> anyhow::Result<()> {
    for pattern in patterns {
        Glob::new(pattern).with_context(|| format!("invalid exclude glob: {pattern}"))?;
    }
    Ok(())
}

fn parse_fail_on(v: &str) -> anyhow::Result<FailOn> {
    match v {
        "error" => Ok(FailOn::Error),
        "warning" | "warn" => Ok(FailOn::Warning),
        other => anyhow::bail!("unknown fail_on: {other} (expected error|warning)"),
    }
}

fn parse_base_url(v: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(v).with_context(|| format!("parse {v}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("unsupported scheme {} (expected http or https)", url.scheme());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
