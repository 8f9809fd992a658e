//! Stable identifiers shared between the engine, the builtins, and the CLI.

/// Root document every rule query is resolved against.
pub const DATA_ROOT: &str = "data";

/// File extension of rule modules (without the leading dot).
pub const MODULE_EXTENSION: &str = "rego";

// Builtins
pub const BUILTIN_GITHUB_REQUEST: &str = "github.request";

/// `User-Agent` sent by HTTP builtins.
pub const USER_AGENT: &str = "policyguard";

/// GitHub REST API root used when none is configured.
pub const GITHUB_API_BASE_URL: &str = "https://api.github.com/";

/// Environment variable holding the GitHub token by default.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

// Annotation scopes
pub const SCOPE_RULE: &str = "rule";
pub const SCOPE_DOCUMENT: &str = "document";
pub const SCOPE_PACKAGE: &str = "package";
pub const SCOPE_SUBPACKAGES: &str = "subpackages";

// Tool-level
pub const TOOL_NAME: &str = "policyguard";
pub const CONFIG_FILE_NAME: &str = "policyguard.toml";
pub const SCHEMA_CONFIG_V1: &str = "policyguard.config.v1";
