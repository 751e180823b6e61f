//! Per-provider runtime: credentials, endpoint table and HTTP calls.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use paygate_types::{
    ApiResponse, GatewayConfig, HttpRequest, HttpResponse, HttpTransport, Mode, PayError, Params,
    RequestBody, json_scalar_to_string,
};

/// Built-in URL per mode.
pub type Endpoints = &'static [(Mode, &'static str)];

pub struct Support {
    name: &'static str,
    config: GatewayConfig,
    urls: Endpoints,
    http: Arc<dyn HttpTransport>,
}

impl Support {
    /// `name` is the display name used in error messages (`Jiupay`).
    pub fn new(
        name: &'static str,
        config: GatewayConfig,
        urls: Endpoints,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            name,
            config,
            urls,
            http,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn http(&self) -> &dyn HttpTransport {
        self.http.as_ref()
    }

    /// Config value, empty when unset.
    pub fn get(&self, key: &str) -> &str {
        self.config.get(key).unwrap_or_default()
    }

    pub fn require(&self, key: &str) -> Result<&str, PayError> {
        self.config.require(self.name, key)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Endpoints
    // ─────────────────────────────────────────────────────────────────────────────

    /// URL for a mode: config override first, then the built-in table.
    pub fn endpoint(&self, mode: Mode) -> Result<&str, PayError> {
        self.config
            .endpoints
            .get(&mode)
            .map(String::as_str)
            .or_else(|| {
                self.urls
                    .iter()
                    .find(|(m, _)| *m == mode)
                    .map(|(_, url)| *url)
            })
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                PayError::InvalidConfig(format!("{} has no [{}] endpoint", self.name, mode))
            })
    }

    /// Payment URL for the configured mode (`normal`, `dev` or `service`).
    pub fn pay_endpoint(&self) -> Result<&str, PayError> {
        let mode = match self.config.mode {
            m @ (Mode::Normal | Mode::Dev | Mode::Service) => m,
            _ => Mode::Normal,
        };
        self.endpoint(mode)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // HTTP
    // ─────────────────────────────────────────────────────────────────────────────

    /// Sends a request, failing on non-2xx statuses.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PayError> {
        debug!(gateway = self.name, url = %request.url, body = ?request.body, "Api requesting");

        let response = self.http.send(request).await?;

        info!(
            gateway = self.name,
            status = response.status,
            "Api requested"
        );
        debug!(gateway = self.name, body = %response.body, "Api response body");

        if !response.is_success() {
            return Err(self.api_error(
                format!("HTTP {}", response.status),
                Value::String(response.body),
            ));
        }
        Ok(response)
    }

    /// Form POST with empty values dropped; JSON response.
    pub async fn post_form(&self, url: &str, params: &Params) -> Result<ApiResponse, PayError> {
        let request = HttpRequest::post(url, RequestBody::Form(params.filtered()));
        self.send(request).await?.json().and_then(into_object)
    }

    /// GET with query parameters; JSON response.
    pub async fn get_json(&self, url: &str, params: &Params) -> Result<ApiResponse, PayError> {
        let request = HttpRequest::get(url, params.filtered());
        self.send(request).await?.json().and_then(into_object)
    }

    pub async fn post_json(&self, url: &str, body: Value) -> Result<ApiResponse, PayError> {
        let request = HttpRequest::post(url, RequestBody::Json(body));
        self.send(request).await?.json().and_then(into_object)
    }

    /// `Get {Name} API Error:{message}` with the response attached.
    pub fn api_error(&self, message: impl fmt::Display, raw: impl Into<Value>) -> PayError {
        let raw = raw.into();
        warn!(gateway = self.name, error = %message, "Api error");
        PayError::gateway(format!("Get {} API Error:{}", self.name, message), raw)
    }

    /// Rejected notification signature.
    pub fn sign_failed(&self, data: &Params) -> PayError {
        warn!(gateway = self.name, "Sign verify failed");
        PayError::invalid_sign(self.name, data)
    }
}

/// Requires a JSON object response.
pub fn into_object(value: Value) -> Result<ApiResponse, PayError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PayError::gateway("Response is not a JSON object", other)),
    }
}

/// A response field as the string the provider compares against.
pub fn field(resp: &ApiResponse, key: &str) -> String {
    resp.get(key).map(json_scalar_to_string).unwrap_or_default()
}

/// The provider's message field, `unknown` when absent.
pub fn message(resp: &ApiResponse, key: &str) -> String {
    match resp.get(key) {
        None | Some(Value::Null) => "unknown".to_string(),
        Some(v) => json_scalar_to_string(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;

    const URLS: Endpoints = &[
        (Mode::Normal, "http://pay.example/normal"),
        (Mode::Dev, "http://pay.example/dev"),
        (Mode::Query, "http://pay.example/query"),
    ];

    #[test]
    fn test_endpoint_per_mode_with_override() {
        let mut config = GatewayConfig::default();
        config
            .endpoints
            .insert(Mode::Query, "http://localhost/q".to_string());
        let (support, _) = mock::support("Demo", URLS, config);

        assert_eq!(support.pay_endpoint().unwrap(), "http://pay.example/normal");
        assert_eq!(support.endpoint(Mode::Query).unwrap(), "http://localhost/q");
        assert!(matches!(
            support.endpoint(Mode::Transfer),
            Err(PayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pay_endpoint_follows_dev_mode_only() {
        let config = GatewayConfig {
            mode: Mode::Dev,
            ..Default::default()
        };
        let (support, _) = mock::support("Demo", URLS, config);
        assert_eq!(support.pay_endpoint().unwrap(), "http://pay.example/dev");

        let config = GatewayConfig {
            mode: Mode::Query,
            ..Default::default()
        };
        let (support, _) = mock::support("Demo", URLS, config);
        assert_eq!(support.pay_endpoint().unwrap(), "http://pay.example/normal");
    }

    #[tokio::test]
    async fn test_post_form_drops_empty_values() {
        let (support, http) = mock::support("Demo", URLS, GatewayConfig::default());
        http.push_json(serde_json::json!({"code": "0000"}));

        let params = Params::new().with("a", "1").with("b", "");
        let resp = support
            .post_form("http://pay.example/normal", &params)
            .await
            .unwrap();
        assert_eq!(field(&resp, "code"), "0000");

        match http.last_request().body {
            RequestBody::Form(sent) => {
                assert_eq!(sent.get("a"), Some("1"));
                assert!(!sent.contains("b"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_status_is_gateway_error() {
        let (support, http) = mock::support("Demo", URLS, GatewayConfig::default());
        http.push_status(502, "bad gateway");

        let err = support
            .get_json("http://pay.example/query", &Params::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "GATEWAY_ERROR: Get Demo API Error:HTTP 502");
    }

    #[test]
    fn test_message_defaults_to_unknown() {
        let resp = into_object(serde_json::json!({"msg": "余额不足", "n": null})).unwrap();
        assert_eq!(message(&resp, "msg"), "余额不足");
        assert_eq!(message(&resp, "n"), "unknown");
        assert_eq!(message(&resp, "missing"), "unknown");
    }
}
