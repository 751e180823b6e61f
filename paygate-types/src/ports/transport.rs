//! Outbound HTTP port.
//!
//! Gateways describe the call; an adapter (reqwest in production, a recorder
//! in tests) performs it.

use serde_json::Value;

use crate::domain::Params;
use crate::error::PayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Form(Params),
    Json(Value),
    Raw { content_type: String, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Params,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, query: Params) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn post(url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Params::new(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON, failing with the raw text attached.
    pub fn json(&self) -> Result<Value, PayError> {
        serde_json::from_str(self.body.trim()).map_err(|e| {
            PayError::gateway(
                format!("Unparseable response body: {}", e),
                Value::String(self.body.clone()),
            )
        })
    }
}

/// Port for performing provider HTTP calls.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PayError>;
}
