use policyguard_github::{HttpClient, HttpRequest, HttpResponse, TransportError};
use serde_json::Value as JsonValue;
use std::sync::{Mutex, PoisonError};

/// [`HttpClient`] that records every request and answers with a fixed response.
#[derive(Debug)]
pub struct FakeHttpClient {
    reply: Result<HttpResponse, TransportError>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeHttpClient {
    /// Reply with `status` and `body` serialized as JSON.
    pub fn json(status: u16, body: JsonValue) -> Self {
        Self::raw(status, body.to_string().into_bytes())
    }

    pub fn raw(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            reply: Ok(HttpResponse {
                status,
                body: body.into(),
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request fails before a response arrives.
    pub fn unreachable(message: &str) -> Self {
        Self {
            reply: Err(TransportError(message.to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HttpClient for FakeHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.reply.clone()
    }
}
