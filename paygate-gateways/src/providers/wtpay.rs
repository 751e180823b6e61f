//! Wtpay (XxPay-style merchant API).
//!
//! Amounts travel in fen. Every request and notification is signed with MD5,
//! upper case, over the sorted non-empty fields plus `&key=`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayMethod,
    PayResponse, Payable, Params, PurchaseResult, QueryKind, now,
};

use super::ensure_method;
use crate::security::{md5_upper, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Normal, "http://www.wt123456.net:3020/api/pay/create_order"),
    (Mode::Dev, "http://www.wt123456.net:3020/api/pay/create_order"),
    (Mode::Query, "http://www.wt123456.net:3020/api/pay/query_order"),
];

/// Order status the provider uses for a settled payment.
const PAID_STATUS: &str = "2";

pub struct Wtpay {
    support: Support,
}

impl Wtpay {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Wtpay", config, URLS, http),
        }
    }

    fn base_payload(&self) -> Params {
        Params::new()
            .with("mchId", self.support.get("mch_id"))
            .with("appId", self.support.get("app_id"))
            .with("productId", self.support.get("pay_type"))
            .with("returnUrl", self.support.get("return_url"))
            .with("notifyUrl", self.support.get("notify_url"))
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let signed = params.without(&["sign"]).filtered();
        let sign = md5_upper(&sorted_query_with_key(&signed, key));
        debug!(sign = %sign, "Wtpay Generate Sign");
        Ok(sign)
    }

    async fn request_api(&self, url: &str, payload: &Params) -> Result<ApiResponse, PayError> {
        let resp = self.support.post_form(url, payload).await?;
        if field(&resp, "retCode") != "SUCCESS" {
            return Err(self.support.api_error(message(&resp, "retMsg"), resp));
        }
        Ok(resp)
    }
}

/// Cashier URL from `payParams`, falling back to the top level.
fn cashier_url(resp: &ApiResponse) -> Option<String> {
    let scopes: Vec<&ApiResponse> = match resp.get("payParams") {
        Some(Value::Object(params)) => vec![params, resp],
        _ => vec![resp],
    };
    scopes
        .into_iter()
        .flat_map(|scope| ["payUrl", "codeUrl", "codeImgUrl"].map(|k| field(scope, k)))
        .find(|v| !v.is_empty())
}

#[async_trait]
impl Gateway for Wtpay {
    fn name(&self) -> &'static str {
        "wtpay"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web, PayMethod::Wap, PayMethod::Scan]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        let mut payload = self
            .base_payload()
            .with("currency", "cny")
            .with("mchOrderNo", charge.trade_no())
            .with("amount", charge.amount().fen().to_string())
            .with("clientIp", charge.client_ip())
            .with("subject", charge.subject())
            .with("body", charge.body())
            .with("extra", charge.user())
            .filtered();
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        let resp = self
            .request_api(self.support.pay_endpoint()?, &payload)
            .await?;
        match cashier_url(&resp) {
            Some(url) => Ok(PayResponse::Redirect(url)),
            None => Err(self.support.api_error(message(&resp, "retMsg"), resp)),
        }
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let mut payload = self.base_payload().with("mchOrderNo", order).filtered();
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        self.request_api(self.support.endpoint(Mode::Query)?, &payload)
            .await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        let signed = data.filtered();
        if !sign_matches(&self.sign(&signed)?, signed.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let order_id = data.require("mchOrderNo")?.to_string();
        let found = self.find(&order_id, QueryKind::Pay).await?;
        let is_paid = data.get("status") == Some(PAID_STATUS) && field(&found, "status") == PAID_STATUS;
        let amount = Amount::from_fen(data.get_or_empty("amount").parse().unwrap_or_default())?;
        let trade_no = data.get_or_empty("payOrderId").to_string();

        Ok(PurchaseResult::new(
            "wtpay", order_id, trade_no, amount, is_paid, now(), data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("SUCCESS".into())
    }
}
