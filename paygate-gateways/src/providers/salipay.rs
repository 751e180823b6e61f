//! Salipay Alipay payouts with a balance endpoint.
//!
//! Requests carry `scene` (the merchant id) and an MD5 sign, lower case,
//! over the sorted fields plus `&key=`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};

use paygate_types::{
    ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayResponse, Params,
    PurchaseResult, QueryKind, TransferOutcome, TransferResult, Transferable, now,
};

use super::payout_notification;
use crate::security::{md5_lower, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Transfer, "http://222.186.46.71:33500/api/to_alipay"),
    (Mode::TransferQueryBalance, "http://222.186.46.71:33500/api/get_balance"),
];

pub struct Salipay {
    support: Support,
}

impl Salipay {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Salipay", config, URLS, http),
        }
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_lower(&sorted_query_with_key(&params.without(&["sign"]).filtered(), key));
        debug!(sign = %sign, "Salipay Generate Sign");
        Ok(sign)
    }

    /// Signs and posts; `code != 0` is an error.
    async fn request_api(&self, mode: Mode, mut payload: Params) -> Result<ApiResponse, PayError> {
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        let url = self.support.endpoint(mode)?;
        let resp = self.support.post_form(url, &payload).await?;
        if resp.contains_key("code") && field(&resp, "code") != "0" {
            error!(response = ?resp, "Salipay request error");
            return Err(self.support.api_error(message(&resp, "msg"), resp));
        }
        Ok(resp)
    }

    fn base_payload(&self) -> Params {
        Params::new().with("scene", self.support.get("app_id"))
    }
}

#[async_trait]
impl Gateway for Salipay {
    fn name(&self) -> &'static str {
        "salipay"
    }

    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let payload = self
            .base_payload()
            .with("order_num", payout.transfer_no())
            .with("account", payout.account())
            .with("name", payout.real_name())
            .with("money", payout.amount().to_yuan());

        let resp = self.request_api(Mode::Transfer, payload).await?;
        if resp.is_empty() {
            return Ok(TransferOutcome::Accepted);
        }
        Ok(TransferOutcome::Completed(TransferResult::new(
            field(&resp, "msg"),
            now(),
        )))
    }

    async fn balance(&self) -> Result<ApiResponse, PayError> {
        let payload = self
            .base_payload()
            .with("time", Utc::now().timestamp().to_string());
        self.request_api(Mode::TransferQueryBalance, payload).await
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let payload = self
            .base_payload()
            .with("out_order_sn", order)
            .with("time", Utc::now().timestamp().to_string());
        self.request_api(Mode::TransferQuery, payload).await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        if !sign_matches(&self.sign(&data)?, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }
        payout_notification("salipay", data)
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use paygate_types::{Amount, Payout, RequestBody};

    fn gateway() -> (Salipay, Arc<MockTransport>) {
        let config = GatewayConfig {
            app_id: "scene-9".into(),
            app_key: "sa".into(),
            ..Default::default()
        };
        let http = MockTransport::new();
        (Salipay::new(config, http.clone()), http)
    }

    #[tokio::test]
    async fn test_transfer_completes_with_msg_as_trade_no() {
        let (salipay, http) = gateway();
        http.push_json(serde_json::json!({"code": 0, "msg": "2024020122001"}));

        let payout = Payout::new("SA-1", Amount::from_fen(1001).unwrap(), "王五", "wangwu@example.com");
        let outcome = salipay.transfer(&payout).await.unwrap();
        assert_eq!(outcome.result().unwrap().trade_no(), "2024020122001");

        let req = http.last_request();
        assert_eq!(req.url, "http://222.186.46.71:33500/api/to_alipay");
        let RequestBody::Form(sent) = req.body else {
            panic!("expected form body");
        };
        assert_eq!(sent.get("money"), Some("10.01"));
        assert_eq!(
            sent.get("sign"),
            Some(md5_lower(&sorted_query_with_key(&sent.without(&["sign"]), "sa")).as_str())
        );
    }

    #[tokio::test]
    async fn test_transfer_error_code() {
        let (salipay, http) = gateway();
        http.push_json(serde_json::json!({"code": 3, "msg": "账户不存在"}));

        let payout = Payout::new("SA-1", Amount::from_fen(1001).unwrap(), "王五", "x");
        let err = salipay.transfer(&payout).await.unwrap_err();
        assert_eq!(err.to_string(), "GATEWAY_ERROR: Get Salipay API Error:账户不存在");
    }

    #[tokio::test]
    async fn test_balance() {
        let (salipay, http) = gateway();
        http.push_json(serde_json::json!({"code": 0, "balance": "8888.00"}));

        let resp = salipay.balance().await.unwrap();
        assert_eq!(field(&resp, "balance"), "8888.00");
        assert_eq!(http.last_request().url, "http://222.186.46.71:33500/api/get_balance");
    }

    #[tokio::test]
    async fn test_find_needs_configured_endpoint() {
        let (salipay, _) = gateway();
        assert!(matches!(
            salipay.find("SA-1", QueryKind::Transfer).await,
            Err(PayError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_payout_notification() {
        let (salipay, _) = gateway();
        let mut data = Params::new()
            .with("out_biz_no", "SA-1")
            .with("order_id", "AL900")
            .with("orderstatus", "1")
            .with("endtime", "2024-02-01 08:00:00");
        let sign = md5_lower(&sorted_query_with_key(&data, "sa"));
        data.insert("sign", sign);

        let result = salipay.verify(data).await.unwrap();
        assert_eq!(result.channel(), "salipay");
        assert!(result.is_paid());
        assert_eq!(result.trade_no(), "AL900");
    }
}
