//! Jpay (pay007).
//!
//! Sign is `md5(md5(amount . out_trade_no) . key)`, lower case; queries sign
//! `md5(md5(order_sn) . key)`. The built-in table has no query URL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayMethod,
    PayResponse, Payable, Params, PurchaseResult, QueryKind, parse_provider_time,
};

use super::ensure_method;
use crate::security::{md5_lower, sign_matches};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Normal, "https://pay007.net/gateway/index/checkpoint.do"),
    (Mode::Dev, "https://pay007.net/gateway/index/checkpoint.do"),
    (Mode::Query, ""),
];

const PAID_STATUS: &str = "4";

pub struct Jpay {
    support: Support,
}

impl Jpay {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Jpay", config, URLS, http),
        }
    }

    fn base_payload(&self) -> Params {
        Params::new()
            .with("account_id", self.support.get("app_id"))
            .with("success_url", self.support.get("return_url"))
            .with("error_url", self.support.get("return_url"))
            .with("callback_url", self.support.get("notify_url"))
            .with("thoroughfare", self.support.get("pay_type"))
    }

    fn pay_sign(&self, amount: &str, trade_no: &str) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_lower(&format!("{}{}", md5_lower(&format!("{}{}", amount, trade_no)), key));
        debug!(sign = %sign, "Jpay Generate Sign");
        Ok(sign)
    }

    fn find_sign(&self, order: &str) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        Ok(md5_lower(&format!("{}{}", md5_lower(order), key)))
    }
}

/// Cashier URL from `data.pay_url`, `pay_url` or `qrcode`.
fn cashier_url(resp: &ApiResponse) -> Option<String> {
    if let Some(Value::Object(data)) = resp.get("data") {
        let url = field(data, "pay_url");
        if !url.is_empty() {
            return Some(url);
        }
    }
    ["pay_url", "qrcode"]
        .iter()
        .map(|k| field(resp, k))
        .find(|v| !v.is_empty())
}

#[async_trait]
impl Gateway for Jpay {
    fn name(&self) -> &'static str {
        "jpay"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web, PayMethod::Wap]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        let amount = charge.amount().to_yuan();
        let mut payload = self
            .base_payload()
            .with("content_type", "json")
            .with("out_trade_no", charge.trade_no())
            .with("amount", amount.as_str())
            .with("timestamp", Utc::now().timestamp().to_string())
            .with("ip", charge.client_ip());
        payload.insert("sign", self.pay_sign(&amount, charge.trade_no())?);

        let resp = self
            .support
            .post_form(self.support.pay_endpoint()?, &payload)
            .await?;
        match cashier_url(&resp) {
            Some(url) => Ok(PayResponse::Redirect(url)),
            None => Err(self.support.api_error(message(&resp, "msg"), resp)),
        }
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let mut payload = self
            .base_payload()
            .with("order_sn", order)
            .with("order_type", "0");
        payload.insert("sign", self.find_sign(order)?);

        let url = self.support.endpoint(Mode::Query)?;
        self.support.post_form(url, &payload).await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        let signed_amount = data
            .get("amount")
            .filter(|a| !a.is_empty())
            .unwrap_or(data.get_or_empty("pay_amount"));
        let expected = self.pay_sign(signed_amount, data.get_or_empty("out_trade_no"))?;
        if !sign_matches(&expected, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let amount = Amount::from_yuan(data.require("pay_amount")?)?;
        let is_paid = data.get("pay_status") == Some(PAID_STATUS);
        let order_id = data.require("out_trade_no")?.to_string();
        let trade_no = data.get_or_empty("trade_no").to_string();
        let pay_time = parse_provider_time(data.get("pay_time"));

        Ok(PurchaseResult::new(
            "jpay", order_id, trade_no, amount, is_paid, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}
