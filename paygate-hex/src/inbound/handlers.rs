//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use paygate_gateways::xml::from_xml;
use paygate_types::{AppError, Params, PayResponse, PayableStore};

use crate::PayService;

/// Application state shared across handlers.
pub struct AppState<S: PayableStore> {
    pub service: PayService<S>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Provider notification endpoint; answers with the provider's ack body.
#[tracing::instrument(skip(state, headers, body))]
pub async fn notify<S: PayableStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(gateway): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let data = parse_notification(query.as_deref(), content_type, &body)?;
    tracing::debug!(fields = data.len(), "Notification received");

    let ack = state.service.handle_notification(&gateway, data).await?;
    Ok(ack_response(ack))
}

fn ack_response(ack: PayResponse) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, ack.content_type())],
        ack.body(),
    )
        .into_response()
}

/// Merges query string and body into notification parameters.
///
/// The body is read as JSON, XML or a form depending on the content type;
/// body fields win over query fields of the same name.
pub fn parse_notification(
    query: Option<&str>,
    content_type: &str,
    body: &[u8],
) -> Result<Params, AppError> {
    let mut params = match query {
        Some(q) if !q.is_empty() => parse_form(q.as_bytes())?,
        _ => Params::new(),
    };

    let text = std::str::from_utf8(body)
        .map_err(|_| AppError::BadRequest("Notification body is not UTF-8".into()))?
        .trim();
    if text.is_empty() {
        return Ok(params);
    }

    let fields = if content_type.contains("json") || text.starts_with('{') {
        match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => Params::from_json_object(&value),
            _ => return Err(AppError::BadRequest("Expected a JSON object".into())),
        }
    } else if content_type.contains("xml") || text.starts_with('<') {
        from_xml(text).map_err(|e| AppError::BadRequest(e.to_string()))?
    } else {
        parse_form(text.as_bytes())?
    };

    for (key, value) in fields.iter() {
        params.insert(key, value);
    }
    Ok(params)
}

fn parse_form(raw: &[u8]) -> Result<Params, AppError> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw)
        .map(|pairs| pairs.into_iter().collect())
        .map_err(|e| AppError::BadRequest(format!("Invalid form body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_and_form_merge() {
        let params = parse_notification(
            Some("orderid=T1&amount=1.00"),
            "application/x-www-form-urlencoded",
            b"amount=10.00&sign=ABC",
        )
        .unwrap();
        assert_eq!(params.get("orderid"), Some("T1"));
        assert_eq!(params.get("amount"), Some("10.00"));
        assert_eq!(params.get("sign"), Some("ABC"));
    }

    #[test]
    fn test_json_body_flattens_scalars() {
        let params = parse_notification(
            None,
            "application/json",
            br#"{"orderNo": "X1", "amount": 100, "paid": true, "extra": null}"#,
        )
        .unwrap();
        assert_eq!(params.get("amount"), Some("100"));
        assert_eq!(params.get("paid"), Some("true"));
        assert!(!params.contains("extra"));
    }

    #[test]
    fn test_xml_body() {
        let params = parse_notification(
            None,
            "text/xml",
            b"<xml><return_code><![CDATA[SUCCESS]]></return_code><total_fee>101</total_fee></xml>",
        )
        .unwrap();
        assert_eq!(params.get("return_code"), Some("SUCCESS"));
        assert_eq!(params.get("total_fee"), Some("101"));
    }

    #[test]
    fn test_json_array_is_rejected() {
        let err = parse_notification(None, "application/json", b"[1, 2]").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_empty_request() {
        assert!(parse_notification(None, "", b"").unwrap().is_empty());
    }
}
