//! Integration tests for the notification endpoint.
//!
//! Requests go through the full router; the order store is in memory.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use paygate_gateways::security::{md5_lower, sorted_query_with_key};
use paygate_hex::{Pay, PayService, inbound::HttpServer};
use paygate_types::{
    Amount, Charge, PayConfig, Params, PayableStore, PurchaseResult, StoreError,
};

#[derive(Default)]
struct MemoryStore {
    orders: Mutex<HashMap<String, Charge>>,
}

#[async_trait]
impl PayableStore for MemoryStore {
    async fn retrieve_by_trade_no(&self, trade_no: &str) -> Result<Option<Charge>, StoreError> {
        Ok(self.orders.lock().unwrap().get(trade_no).cloned())
    }

    async fn on_complete(
        &self,
        charge: &Charge,
        _result: &PurchaseResult,
    ) -> Result<(), StoreError> {
        match self.orders.lock().unwrap().get_mut(&charge.trade_no) {
            Some(order) => {
                order.complete = true;
                Ok(())
            }
            None => Err(StoreError::NotFound(charge.trade_no.clone())),
        }
    }
}

fn app() -> axum::Router {
    let config = PayConfig::from_json_str(
        r#"{"gateways": {"cypay": {"app_id": "C7", "app_key": "cy"}}}"#,
    )
    .unwrap();
    let store = MemoryStore::default();
    store.orders.lock().unwrap().insert(
        "T1".into(),
        Charge::new("T1", Amount::from_fen(300).unwrap()),
    );
    HttpServer::new(PayService::new(Pay::new(config), store)).router()
}

fn signed_form(money: &str) -> String {
    let mut data = Params::new()
        .with("out_trade_no", "T1")
        .with("trade_no", "CY900")
        .with("money", money);
    let sign = md5_lower(&sorted_query_with_key(&data, "cy"));
    data.insert("sign", sign);
    serde_urlencoded::to_string(data.as_map()).unwrap()
}

fn notify_request(gateway: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/notify/{}", gateway))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn read_body(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_valid_notification_gets_provider_ack() {
    let response = app()
        .oneshot(notify_request("cypay", signed_form("3.00")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(read_body(response).await, "success");
}

#[tokio::test]
async fn test_query_string_notification() {
    let request = Request::builder()
        .uri(format!("/notify/cypay?{}", signed_form("3.00")))
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forged_notification_is_unauthorized() {
    let forged = signed_form("3.00").replace("money=3.00", "money=0.01");
    let response = app()
        .oneshot(notify_request("cypay", forged))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
    assert_eq!(json["code"], 401);
}

#[tokio::test]
async fn test_unknown_gateway_is_not_found() {
    let response = app()
        .oneshot(notify_request("paypal", String::new()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
    assert_eq!(json["error"], "Gateway [paypal] Not Exists");
}
