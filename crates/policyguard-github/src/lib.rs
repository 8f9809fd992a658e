//! The `github.request` builtin.
//!
//! Rules describe a GitHub REST call as a request line (`"GET /repos/{owner}/{repo}"`) plus a
//! data object; the builtin resolves path parameters, builds the query or body, and returns
//! `{statusCode, body}`. Transport goes through the [`HttpClient`] seam so the caller owns
//! authentication, timeouts, and proxies.

#![forbid(unsafe_code)]

mod builtin;
mod client;
pub mod request;

pub use builtin::{DEFAULT_BASE_URL, GitHubError, GitHubRequest};
pub use client::{HttpClient, HttpRequest, HttpResponse, TransportError};
pub use request::RequestError;
