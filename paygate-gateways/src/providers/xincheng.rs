//! Xincheng bank-card payouts.
//!
//! The signed fields are JSON encoded, RSA encrypted with the provider's
//! public key in 100-byte blocks and posted as a raw body with a `Token`
//! header. `status == 1` means success; `msg` may be an array. Endpoints come
//! from config.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpRequest, HttpTransport, Mode, PayError,
    PayResponse, Params, PurchaseResult, QueryKind, RequestBody, TransferOutcome, Transferable,
    parse_provider_time,
};

use crate::crypto::{public_encrypt_chunked, public_key};
use crate::security::{md5_lower, sign_matches, sorted_query};
use crate::support::{Endpoints, Support, field, into_object};

const URLS: Endpoints = &[];

const ENCRYPT_CHUNK: usize = 100;

pub struct Xincheng {
    support: Support,
}

impl Xincheng {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Xincheng", config, URLS, http),
        }
    }

    /// `md5(sorted k=v pairs + "&" + key)`, lower case.
    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_lower(&format!("{}&{}", sorted_query(&params.without(&["sign"])), key));
        debug!(sign = %sign, "Xincheng Generate Sign");
        Ok(sign)
    }

    async fn request_api(&self, mode: Mode, payload: Params) -> Result<ApiResponse, PayError> {
        let mut payload = payload.filtered();
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        let key = public_key(self.support.require("public_key")?)?;
        let sealed = public_encrypt_chunked(&key, payload.to_json().to_string().as_bytes(), ENCRYPT_CHUNK)?;
        let request = HttpRequest::post(
            self.support.endpoint(mode)?,
            RequestBody::Raw {
                content_type: "text/plain".into(),
                body: sealed,
            },
        )
        .header("Token", self.support.get("token"));

        let resp = self.support.send(request).await?.json().and_then(into_object)?;
        if field(&resp, "status") != "1" {
            error!(response = ?resp, "Xincheng request error");
            return Err(self.support.api_error(error_message(&resp), resp));
        }
        Ok(resp)
    }
}

/// `msg` as text; arrays and objects are JSON encoded.
fn error_message(resp: &ApiResponse) -> String {
    match resp.get("msg") {
        None | Some(Value::Null) => "unknown".to_string(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => v.to_string(),
        Some(_) => field(resp, "msg"),
    }
}

#[async_trait]
impl Gateway for Xincheng {
    fn name(&self) -> &'static str {
        "xincheng"
    }

    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let payload = Params::new()
            .with("merchant_id", self.support.get("app_id"))
            .with("order_no", payout.transfer_no())
            .with("amount", payout.amount().to_yuan())
            .with("account_name", payout.real_name())
            .with("account_no", payout.account())
            .with("bank_name", payout.channel())
            .with("notify_url", self.support.get("notify_url"))
            .with("remark", payout.remark());
        self.request_api(Mode::Transfer, payload).await?;
        Ok(TransferOutcome::Accepted)
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let payload = Params::new()
            .with("merchant_id", self.support.get("app_id"))
            .with("order_no", order);
        self.request_api(Mode::TransferQuery, payload).await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        if data.is_empty() || !sign_matches(&self.sign(&data)?, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let amount = match data.get("amount").filter(|a| !a.is_empty()) {
            Some(a) => Amount::from_yuan(a)?,
            None => Amount::ZERO,
        };
        let mut data = data;
        let err_msg = data.get_or_empty("msg").to_string();
        data.insert("err_msg", err_msg);
        let order_id = data.require("order_no")?.to_string();
        let trade_no = data.get_or_empty("trade_no").to_string();
        let is_paid = data.get("status") == Some("1");
        let pay_time = parse_provider_time(data.get("finish_time"));

        Ok(PurchaseResult::new(
            "xincheng", order_id, trade_no, amount, is_paid, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::private_decrypt_chunked;
    use crate::mock::{MockTransport, test_keys};
    use paygate_types::Payout;

    fn gateway() -> (Xincheng, Arc<MockTransport>) {
        let mut config = GatewayConfig {
            app_id: "XC9".into(),
            app_key: "xc".into(),
            token: "tk-123".into(),
            public_key: test_keys().public_b64.clone(),
            ..Default::default()
        };
        config
            .endpoints
            .insert(Mode::Transfer, "http://xincheng.example/withdraw".into());
        let http = MockTransport::new();
        (Xincheng::new(config, http.clone()), http)
    }

    fn payout() -> Payout {
        Payout::new("XC-1", Amount::from_fen(30000).unwrap(), "孙八", "6228480000000000000")
            .with_channel("农业银行")
    }

    #[tokio::test]
    async fn test_transfer_sends_encrypted_body_with_token() {
        let (xincheng, http) = gateway();
        http.push_json(serde_json::json!({"status": 1, "msg": "ok"}));

        assert_eq!(
            xincheng.transfer(&payout()).await.unwrap(),
            TransferOutcome::Accepted
        );

        let req = http.last_request();
        assert_eq!(req.headers, vec![("Token".to_string(), "tk-123".to_string())]);
        let RequestBody::Raw { body, .. } = req.body else {
            panic!("expected raw body");
        };
        let plain = private_decrypt_chunked(&test_keys().private, &body).unwrap();
        let sent = Params::from_json_object(&serde_json::from_slice(&plain).unwrap());
        assert_eq!(sent.get("amount"), Some("300.00"));
        assert_eq!(sent.get("bank_name"), Some("农业银行"));
        assert!(!sent.contains("remark"));
        let expected = md5_lower(&format!("{}&xc", sorted_query(&sent.without(&["sign"]))));
        assert_eq!(sent.get("sign"), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_array_msg_is_json_encoded() {
        let (xincheng, http) = gateway();
        http.push_json(serde_json::json!({"status": 0, "msg": ["金额错误", "卡号错误"]}));

        let err = xincheng.transfer(&payout()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"GATEWAY_ERROR: Get Xincheng API Error:["金额错误","卡号错误"]"#
        );
    }

    #[tokio::test]
    async fn test_verify_signed_notification() {
        let (xincheng, _) = gateway();
        let mut data = Params::new()
            .with("order_no", "XC-1")
            .with("trade_no", "XCT5")
            .with("amount", "300.00")
            .with("status", "1");
        let sign = md5_lower(&format!("{}&xc", sorted_query(&data)));
        data.insert("sign", sign);

        let result = xincheng.verify(data).await.unwrap();
        assert!(result.is_paid());
        assert_eq!(result.amount().fen(), 30000);

        assert!(matches!(
            xincheng.verify(Params::new()).await,
            Err(PayError::InvalidSign { .. })
        ));
    }
}
