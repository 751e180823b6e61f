//! Data Transfer Objects exchanged across the gateway boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PayError;

/// Normalized provider response body.
pub type ApiResponse = serde_json::Map<String, Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Request selectors
// ─────────────────────────────────────────────────────────────────────────────

/// Payment-method sub-gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayMethod {
    Web,
    Wap,
    App,
    Scan,
    Pos,
    Mini,
    Transfer,
}

impl PayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayMethod::Web => "web",
            PayMethod::Wap => "wap",
            PayMethod::App => "app",
            PayMethod::Scan => "scan",
            PayMethod::Pos => "pos",
            PayMethod::Mini => "mini",
            PayMethod::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayMethod {
    type Err = PayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(PayMethod::Web),
            "wap" => Ok(PayMethod::Wap),
            "app" => Ok(PayMethod::App),
            "scan" => Ok(PayMethod::Scan),
            "pos" => Ok(PayMethod::Pos),
            "mini" => Ok(PayMethod::Mini),
            "transfer" => Ok(PayMethod::Transfer),
            _ => Err(PayError::InvalidGateway(format!(
                "Pay Gateway [{}] not exists",
                s
            ))),
        }
    }
}

/// Which order book a `find` looks in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    #[default]
    Pay,
    Transfer,
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// What to hand back to the payer's client (or to the provider, for acks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum PayResponse {
    /// Send the client to this URL.
    Redirect(String),
    /// Auto-submitting form page.
    Html(String),
    Json(Value),
    Text(String),
    Xml(String),
}

impl PayResponse {
    pub fn content_type(&self) -> &'static str {
        match self {
            PayResponse::Redirect(_) | PayResponse::Text(_) => "text/plain; charset=utf-8",
            PayResponse::Html(_) => "text/html; charset=utf-8",
            PayResponse::Json(_) => "application/json",
            PayResponse::Xml(_) => "application/xml; charset=utf-8",
        }
    }

    pub fn body(&self) -> String {
        match self {
            PayResponse::Redirect(s)
            | PayResponse::Html(s)
            | PayResponse::Text(s)
            | PayResponse::Xml(s) => s.clone(),
            PayResponse::Json(v) => v.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_method_parsing() {
        assert_eq!("web".parse::<PayMethod>().unwrap(), PayMethod::Web);
        assert_eq!("Scan".parse::<PayMethod>().unwrap(), PayMethod::Scan);

        let err = "foo".parse::<PayMethod>().unwrap_err();
        assert_eq!(err.to_string(), "INVALID_GATEWAY: Pay Gateway [foo] not exists");
    }

    #[test]
    fn test_pay_response_body() {
        let json = PayResponse::Json(serde_json::json!({"a": 1}));
        assert_eq!(json.body(), r#"{"a":1}"#);
        assert_eq!(json.content_type(), "application/json");
        assert_eq!(PayResponse::Text("success".into()).body(), "success");
    }
}
