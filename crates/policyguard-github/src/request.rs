//! Turning a `"<METHOD> <path>"` line plus a data object into an HTTP request.

use crate::client::HttpRequest;
use policyguard_types::ids;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

static PATH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z]+)\}").expect("valid path parameter pattern"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("malformed request line {0:?}: expected \"<METHOD> <path>\"")]
    MalformedLine(String),

    #[error("request data must be an object, got {0}")]
    DataNotObject(&'static str),

    #[error("missing value for path parameter {0:?}")]
    MissingParam(String),

    #[error("parse error: can't parse '{0}' to string")]
    UnsupportedValue(String),

    #[error("invalid url {path:?}: {message}")]
    InvalidUrl { path: String, message: String },

    #[error("url {url} is outside the configured api root {base}")]
    ForeignOrigin { url: String, base: String },

    #[error("encode request body: {0}")]
    Encode(String),
}

/// Split a request line on its first space into method and path.
pub fn split_request_line(line: &str) -> Result<(&str, &str), RequestError> {
    let malformed = || RequestError::MalformedLine(line.to_string());
    let (method, path) = line.split_once(' ').ok_or_else(malformed)?;
    let (method, path) = (method.trim(), path.trim());
    if method.is_empty() || path.is_empty() {
        return Err(malformed());
    }
    Ok((method, path))
}

/// Names of the `{param}` tokens in `path`, in order of appearance.
pub fn path_params(path: &str) -> Vec<&str> {
    PATH_PARAM
        .captures_iter(path)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Build the request for `line` and `data` against `base`.
///
/// Path parameters are substituted from `data` and removed from it. For `GET` and `POST` the
/// remaining keys become query parameters; whatever is left is sent as the JSON body.
///
/// An absolute URL in the request line must share the origin of `base`, so credentials
/// attached for the API root never reach another host.
pub fn build_request(base: &Url, line: &str, data: &JsonValue) -> Result<HttpRequest, RequestError> {
    let (method, raw_path) = split_request_line(line)?;

    let mut data: Map<String, JsonValue> = match data {
        JsonValue::Object(map) => map.clone(),
        JsonValue::Null => Map::new(),
        other => return Err(RequestError::DataNotObject(json_kind(other))),
    };

    let params = path_params(raw_path);
    let mut path = raw_path.to_string();
    for param in &params {
        let value = data
            .get(*param)
            .ok_or_else(|| RequestError::MissingParam(param.to_string()))?;
        path = path.replacen(&format!("{{{param}}}"), &value_to_string(value)?, 1);
    }
    for param in &params {
        data.remove(*param);
    }

    let mut url = resolve_url(base, &path)?;
    let method = method.to_ascii_uppercase();

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in url.query_pairs() {
        query.entry(k.into_owned()).or_default().push(v.into_owned());
    }
    if method == "GET" || method == "POST" {
        for (k, v) in std::mem::take(&mut data) {
            query.entry(k).or_default().push(value_to_string(&v)?);
        }
    }

    if query.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, values) in &query {
            for v in values {
                pairs.append_pair(k, v);
            }
        }
    }

    let body = serde_json::to_vec(&JsonValue::Object(data))
        .map_err(|e| RequestError::Encode(e.to_string()))?;

    Ok(HttpRequest {
        method,
        url,
        headers: vec![
            ("User-Agent".to_string(), ids::USER_AGENT.to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ],
        body,
    })
}

fn resolve_url(base: &Url, path: &str) -> Result<Url, RequestError> {
    let invalid = |e: url::ParseError| RequestError::InvalidUrl {
        path: path.to_string(),
        message: e.to_string(),
    };
    match Url::parse(path) {
        Ok(absolute) if absolute.origin() == base.origin() => Ok(absolute),
        Ok(absolute) => Err(RequestError::ForeignOrigin {
            url: absolute.to_string(),
            base: base.origin().ascii_serialization(),
        }),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(path.trim_start_matches('/')).map_err(invalid)
        }
        Err(e) => Err(invalid(e)),
    }
}

fn value_to_string(value: &JsonValue) -> Result<String, RequestError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(RequestError::UnsupportedValue(other.to_string())),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
