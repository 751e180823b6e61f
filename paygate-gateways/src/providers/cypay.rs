//! Cypay aggregator: sorted MD5 (lower case) with `&key=`, `code == 200`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayMethod,
    PayResponse, Payable, Params, PurchaseResult, QueryKind, parse_provider_time,
};

use super::ensure_method;
use crate::security::{md5_lower, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[];

pub struct Cypay {
    support: Support,
}

impl Cypay {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Cypay", config, URLS, http),
        }
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_lower(&sorted_query_with_key(&params.without(&["sign"]), key));
        debug!(sign = %sign, "Cypay Generate Sign");
        Ok(sign)
    }

    async fn request_api(&self, url: &str, payload: &Params) -> Result<ApiResponse, PayError> {
        let resp = self.support.post_form(url, payload).await?;
        if field(&resp, "code") != "200" {
            return Err(self.support.api_error(message(&resp, "msg"), resp));
        }
        Ok(match resp.get("data") {
            Some(Value::Object(data)) => data.clone(),
            _ => resp,
        })
    }
}

/// Alipay has its own channel, everything else goes through channel 1.
fn pay_type(method: &str) -> &'static str {
    match method {
        "alipay" => "3",
        _ => "1",
    }
}

#[async_trait]
impl Gateway for Cypay {
    fn name(&self) -> &'static str {
        "cypay"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web, PayMethod::Wap]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        let mut payload = Params::new()
            .with("mch_id", self.support.get("app_id"))
            .with("out_trade_no", charge.trade_no())
            .with("money", charge.amount().to_yuan())
            .with("pay_type", pay_type(charge.extra("method").unwrap_or_default()))
            .with("notify_url", self.support.get("notify_url"))
            .with("return_url", self.support.get("return_url"))
            .with("goods_name", charge.subject())
            .with("client_ip", charge.client_ip())
            .filtered();
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        let resp = self
            .request_api(self.support.pay_endpoint()?, &payload)
            .await?;
        match field(&resp, "data") {
            url if !url.is_empty() => Ok(PayResponse::Redirect(url)),
            _ => Err(self.support.api_error(message(&resp, "msg"), resp)),
        }
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let mut payload = Params::new()
            .with("mch_id", self.support.get("app_id"))
            .with("out_trade_no", order);
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        self.request_api(self.support.endpoint(Mode::Query)?, &payload)
            .await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        if !sign_matches(&self.sign(&data)?, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let amount = match data.get("money").filter(|m| !m.is_empty()) {
            Some(m) => Amount::from_yuan(m)?,
            None => Amount::ZERO,
        };
        let order_id = data.require("out_trade_no")?.to_string();
        let trade_no = data.get_or_empty("trade_no").to_string();
        let pay_time = parse_provider_time(data.get("pay_time"));

        Ok(PurchaseResult::new(
            "cypay", order_id, trade_no, amount, true, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}
