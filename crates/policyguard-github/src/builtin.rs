use crate::client::{HttpClient, TransportError};
use crate::request::{RequestError, build_request};
use policyguard_domain::builtin::{Builtin, BuiltinResult};
use policyguard_types::{GitHubResponse, ids};
use serde_json::Value as JsonValue;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// API root used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = ids::GITHUB_API_BASE_URL;

static DEFAULT_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_BASE_URL).expect("valid default base url"));

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("request line must be a string, got {0}")]
    LineNotString(String),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("send request: {0}")]
    Transport(TransportError),

    #[error("decode response body: {0}")]
    Decode(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// `github.request(line, data)`: one declarative call to the GitHub REST API.
pub struct GitHubRequest<C> {
    client: C,
    base_url: Url,
}

impl<C: HttpClient> GitHubRequest<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_BASE.clone())
    }

    /// Use `base_url` as the API root. A missing trailing slash is added so relative paths
    /// resolve below it.
    pub fn with_base_url(client: C, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Perform the request described by `line` and `data`.
    pub fn request(&self, line: &str, data: &JsonValue) -> Result<GitHubResponse, GitHubError> {
        let request = build_request(&self.base_url, line, data)?;
        tracing::debug!(method = %request.method, url = %request.url, "github request");

        let response = self
            .client
            .execute(request)
            .map_err(GitHubError::Transport)?;
        tracing::debug!(status = response.status, "github response");

        let body: JsonValue = serde_json::from_slice(&response.body)
            .map_err(|e| GitHubError::Decode(e.to_string()))?;

        if response.status == 403 {
            let message = match body.get("message").and_then(JsonValue::as_str) {
                Some(m) => m.to_string(),
                None => body.to_string(),
            };
            return Err(GitHubError::Forbidden(message));
        }

        Ok(GitHubResponse {
            status_code: response.status,
            body,
        })
    }
}

impl<C: HttpClient> Builtin for GitHubRequest<C> {
    fn name(&self) -> &str {
        ids::BUILTIN_GITHUB_REQUEST
    }

    fn arity(&self) -> usize {
        2
    }

    fn memoize(&self) -> bool {
        true
    }

    fn call(&self, args: &[JsonValue]) -> BuiltinResult {
        let [line, data] = args else {
            return Err(format!("expected 2 arguments, got {}", args.len()).into());
        };
        let line = line
            .as_str()
            .ok_or_else(|| GitHubError::LineNotString(line.to_string()))?;
        let response = self.request(line, data)?;
        Ok(serde_json::to_value(response)?)
    }
}
