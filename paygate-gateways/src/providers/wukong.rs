//! Wukong aggregator.
//!
//! Signs are pipe-joined fixed fields wrapped in `app_key` and `iv`, MD5
//! lower case. The API reports success with `code == 100` and puts the
//! payload in `data`. Endpoints come from config.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpMethod, HttpTransport, Mode, PayError,
    PayMethod, PayResponse, Payable, Params, PurchaseResult, QueryKind, parse_provider_time,
};

use super::{AggregatorFormat, aggregator_format, aggregator_pay_type, ensure_method};
use crate::form::build_pay_html;
use crate::security::{md5_lower, sign_matches};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[];

#[derive(Debug, Clone, Copy)]
enum SignKind {
    Pay,
    Find,
    Notify,
}

pub struct Wukong {
    support: Support,
}

impl Wukong {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Wukong", config, URLS, http),
        }
    }

    fn sign(&self, params: &Params, kind: SignKind) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let iv = self.support.get("iv");
        let fields: &[&str] = match kind {
            SignKind::Pay => &["bid", "money", "order_sn", "notify_url"],
            SignKind::Find => &["bid", "order_sn"],
            SignKind::Notify => &["pay_time", "money", "pay_money", "order_sn", "sys_order_sn"],
        };

        let mut parts = vec![key];
        parts.extend(fields.iter().map(|f| params.get_or_empty(f)));
        parts.push(iv);
        let sign = md5_lower(&parts.join("|"));
        debug!(kind = ?kind, sign = %sign, "Wukong Generate Sign");
        Ok(sign)
    }

    /// Returns `data` on `code == 100`, or the bare body for an uncoded find answer.
    async fn request_api(&self, url: &str, payload: &Params) -> Result<ApiResponse, PayError> {
        let resp = self.support.post_form(url, payload).await?;
        let code_ok = field(&resp, "code") == "100";
        let unanswered_find = payload.contains("find") && !resp.contains_key("code");
        if !code_ok && !unanswered_find {
            return Err(self.support.api_error(message(&resp, "msg"), resp));
        }
        Ok(match resp.get("data") {
            Some(Value::Object(data)) => data.clone(),
            _ => resp,
        })
    }
}

fn pay_url(resp: &ApiResponse) -> Option<String> {
    ["data", "pay_url", "qrcode", "url"]
        .iter()
        .map(|k| field(resp, k))
        .find(|v| v.starts_with("http"))
}

#[async_trait]
impl Gateway for Wukong {
    fn name(&self) -> &'static str {
        "wukong"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web, PayMethod::Wap]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        let kind = charge.extra("method").unwrap_or_default();
        let mut payload = Params::new()
            .with("bid", self.support.get("app_id"))
            .with("money", charge.amount().to_yuan())
            .with("order_sn", charge.trade_no())
            .with("notify_url", self.support.get("notify_url"))
            .with("return_url", self.support.get("return_url"))
            .with("pay_type", aggregator_pay_type(kind))
            .with("client_ip", charge.client_ip());
        let sign = self.sign(&payload, SignKind::Pay)?;
        payload.insert("sign", sign);

        let endpoint = self.support.pay_endpoint()?;
        match aggregator_format(kind) {
            Some(AggregatorFormat::JumpPage) => {
                build_pay_html(endpoint, &payload.filtered(), HttpMethod::Post)
            }
            _ => {
                let resp = self.request_api(endpoint, &payload).await?;
                match pay_url(&resp) {
                    Some(url) => Ok(PayResponse::Redirect(url)),
                    None => Err(self.support.api_error(message(&resp, "msg"), resp)),
                }
            }
        }
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let mut payload = Params::new()
            .with("bid", self.support.get("app_id"))
            .with("order_sn", order);
        let sign = self.sign(&payload, SignKind::Find)?;
        payload.insert("sign", sign);
        payload.insert("find", "1");

        let url = self.support.endpoint(Mode::Query)?;
        self.request_api(url, &payload).await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        let expected = self.sign(&data, SignKind::Notify)?;
        if !sign_matches(&expected, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let paid = match data.get("pay_money").filter(|v| !v.is_empty()) {
            Some(v) => Amount::from_yuan(v)?,
            None => Amount::from_yuan(data.require("money")?)?,
        };
        let order_id = data.require("order_sn")?.to_string();
        let trade_no = data.get_or_empty("sys_order_sn").to_string();
        let pay_time = parse_provider_time(data.get("pay_time"));

        Ok(PurchaseResult::new(
            "wukong", order_id, trade_no, paid, true, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use paygate_types::{Charge, RequestBody};

    fn gateway() -> (Wukong, Arc<MockTransport>) {
        let mut config = GatewayConfig {
            app_id: "B01".into(),
            app_key: "wk-key".into(),
            iv: "wk-iv".into(),
            notify_url: "http://shop.example/notify/wukong".into(),
            ..Default::default()
        };
        config
            .endpoints
            .insert(Mode::Normal, "http://wukong.example/pay".into());
        config
            .endpoints
            .insert(Mode::Query, "http://wukong.example/query".into());
        let http = MockTransport::new();
        (Wukong::new(config, http.clone()), http)
    }

    #[tokio::test]
    async fn test_pay_signs_pipe_joined_fields() {
        let (wukong, http) = gateway();
        http.push_json(serde_json::json!({"code": 100, "data": "https://cashier.example/x"}));

        let charge = Charge::new("W1", Amount::from_fen(2000).unwrap()).with_extra("method", "wechat");
        let resp = wukong.pay(PayMethod::Web, &charge).await.unwrap();
        assert_eq!(resp, PayResponse::Redirect("https://cashier.example/x".into()));

        let RequestBody::Form(sent) = http.last_request().body else {
            panic!("expected form body");
        };
        let expected = md5_lower("wk-key|B01|20.00|W1|http://shop.example/notify/wukong|wk-iv");
        assert_eq!(sent.get("sign"), Some(expected.as_str()));
        assert_eq!(sent.get("pay_type"), Some("901"));
    }

    #[tokio::test]
    async fn test_non_100_code_is_error() {
        let (wukong, http) = gateway();
        http.push_json(serde_json::json!({"code": 101, "msg": "商户不存在"}));

        let charge = Charge::new("W1", Amount::from_fen(2000).unwrap()).with_extra("method", "alipay");
        let err = wukong.pay(PayMethod::Web, &charge).await.unwrap_err();
        assert_eq!(err.to_string(), "GATEWAY_ERROR: Get Wukong API Error:商户不存在");
    }

    #[tokio::test]
    async fn test_find_returns_data_object() {
        let (wukong, http) = gateway();
        http.push_json(serde_json::json!({"code": 100, "data": {"status": "paid"}}));

        let found = wukong.find("W1", QueryKind::Pay).await.unwrap();
        assert_eq!(field(&found, "status"), "paid");

        let req = http.last_request();
        assert_eq!(req.url, "http://wukong.example/query");
        let RequestBody::Form(sent) = req.body else {
            panic!("expected form body");
        };
        assert_eq!(sent.get("sign"), Some(md5_lower("wk-key|B01|W1|wk-iv").as_str()));
    }

    #[tokio::test]
    async fn test_verify_notification() {
        let (wukong, _) = gateway();
        let mut data = Params::new()
            .with("pay_time", "2024-02-01 10:00:00")
            .with("money", "20.00")
            .with("pay_money", "19.99")
            .with("order_sn", "W1")
            .with("sys_order_sn", "SYS9");
        data.insert(
            "sign",
            md5_lower("wk-key|2024-02-01 10:00:00|20.00|19.99|W1|SYS9|wk-iv"),
        );

        let result = wukong.verify(data.clone()).await.unwrap();
        assert!(result.is_paid());
        assert_eq!(result.order_id(), "W1");
        assert_eq!(result.trade_no(), "SYS9");
        assert_eq!(result.amount().fen(), 1999);

        data.insert("pay_money", "0.01");
        assert!(matches!(
            wukong.verify(data).await,
            Err(PayError::InvalidSign { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_config_error() {
        let wukong = Wukong::new(
            GatewayConfig {
                app_key: "k".into(),
                ..Default::default()
            },
            MockTransport::new(),
        );
        let charge = Charge::new("W1", Amount::from_fen(100).unwrap());
        assert!(matches!(
            wukong.pay(PayMethod::Web, &charge).await,
            Err(PayError::InvalidConfig(_))
        ));
    }
}
