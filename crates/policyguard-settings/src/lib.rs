//! Config parsing and resolution.
//!
//! This crate is intentionally IO-free: it parses and resolves configuration provided as strings.

#![forbid(unsafe_code)]

mod model;
mod resolve;

pub use model::{GitHubConfig, PolicyguardConfigV1};
pub use resolve::{Overrides, ResolvedConfig, ResolvedGitHub};

/// Parse `policyguard.toml` (or equivalent) into a typed model.
pub fn parse_config_toml(input: &str) -> anyhow::Result<PolicyguardConfigV1> {
    let cfg: PolicyguardConfigV1 = toml::from_str(input)?;
    Ok(cfg)
}

/// Resolve the effective config (defaults + file + overrides).
pub fn resolve_config(
    cfg: PolicyguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedConfig> {
    resolve::resolve_config(cfg, overrides)
}
