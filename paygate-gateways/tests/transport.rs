//! HTTP adapters against a live mock server.

use paygate_gateways::security::verify_payload_signature;
use paygate_gateways::{HttpOrderStore, ReqwestTransport, SIGNATURE_HEADER};
use paygate_types::{
    Amount, Charge, HttpOptions, HttpRequest, HttpTransport, Params, PayableStore,
    PurchaseResult, RequestBody, StoreError, now,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(&HttpOptions::default()).unwrap()
}

#[tokio::test]
async fn test_form_post_with_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pay"))
        .and(header("Token", "t-1"))
        .and(body_string_contains("amount=10.00"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"code":"0000"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let form = Params::new().with("amount", "10.00").with("orderid", "T1");
    let request = HttpRequest::post(format!("{}/pay", server.uri()), RequestBody::Form(form))
        .header("Token", "t-1");
    let response = transport().send(request).await.unwrap();

    assert!(response.is_success());
    assert_eq!(response.json().unwrap()["code"], "0000");
}

#[tokio::test]
async fn test_get_sends_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("order_sn", "J-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let request = HttpRequest::get(
        format!("{}/query", server.uri()),
        Params::new().with("order_sn", "J-1"),
    );
    let response = transport().send(request).await.unwrap();
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn test_non_success_status_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let request = HttpRequest::post(
        server.uri(),
        RequestBody::Raw {
            content_type: "text/plain".into(),
            body: "cipher".into(),
        },
    );
    let response = transport().send(request).await.unwrap();
    assert_eq!(response.status, 502);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_store_retrieve_found_and_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "trade_no": "T1",
            "amount": 1000,
            "subject": "VIP"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/T404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = HttpOrderStore::new(format!("{}/", server.uri()), "s3cret");

    let charge = store.retrieve_by_trade_no("T1").await.unwrap().unwrap();
    assert_eq!(charge.amount, Amount::from_fen(1000).unwrap());
    assert_eq!(charge.subject, "VIP");
    assert!(!charge.complete);

    assert!(store.retrieve_by_trade_no("T404").await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_complete_is_signed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/T1/complete"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpOrderStore::new(server.uri(), "s3cret");
    let charge = Charge::new("T1", Amount::from_fen(1000).unwrap());
    let result = PurchaseResult::new(
        "jiupay",
        "T1",
        "J99",
        Amount::from_fen(1000).unwrap(),
        true,
        now(),
        Params::new(),
    );
    store.on_complete(&charge, &result).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let request = &received[0];
    let signature = request
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(verify_payload_signature(&request.body, signature, "s3cret"));
    assert!(!verify_payload_signature(&request.body, signature, "other"));
}

#[tokio::test]
async fn test_store_complete_unknown_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = HttpOrderStore::new(server.uri(), "s3cret");
    let charge = Charge::new("T9", Amount::from_fen(1).unwrap());
    let result = PurchaseResult::new(
        "cypay",
        "T9",
        "",
        Amount::from_fen(1).unwrap(),
        true,
        now(),
        Params::new(),
    );
    let err = store.on_complete(&charge, &result).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(ref t) if t == "T9"));
}
