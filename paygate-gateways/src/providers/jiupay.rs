//! Jiupay (911pay) aggregator.
//!
//! Payload and notification are MD5 signed (upper case) over the sorted
//! fields with `&key=` appended. `pay_str` methods return a QR/redirect URL
//! from the API, `jump_page` methods hand the payer a form.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpMethod, HttpTransport, Mode, PayError,
    PayMethod, PayResponse, Payable, Params, PurchaseResult, QueryKind, now, parse_provider_time,
};

use super::{AggregatorFormat, aggregator_format, aggregator_pay_type, ensure_method};
use crate::form::build_pay_html;
use crate::security::{md5_upper, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Normal, "http://pay.911pay.vip:8020/v2/pay"),
    (Mode::Dev, "http://pay.911pay.vip:8020/v2/pay"),
    (Mode::Query, "http://pay.911pay.vip:8020/v1/query"),
    (Mode::Transfer, "http://pay.911pay.vip:8020/v1/agentPay"),
];

const OK_CODE: &str = "0000";

pub struct Jiupay {
    support: Support,
}

impl Jiupay {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Jiupay", config, URLS, http),
        }
    }

    fn base_payload(&self) -> Params {
        Params::new()
            .with("pay_memberid", self.support.get("app_id"))
            .with("pay_callbackurl", self.support.get("return_url"))
            .with("pay_notifyurl", self.support.get("notify_url"))
            .filtered()
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_upper(&sorted_query_with_key(params, key));
        debug!(sign = %sign, "Jiupay Generate Sign");
        Ok(sign)
    }

    /// Notification sign over the six fixed fields; also requires `returncode=0000`.
    fn verify_sign(&self, data: &Params) -> Result<bool, PayError> {
        let key = self.support.require("app_key")?;
        let signed: Params = ["memberid", "orderid", "transaction_id", "amount", "datetime", "returncode"]
            .into_iter()
            .map(|k| (k, data.get_or_empty(k)))
            .collect();
        let mut plain = String::new();
        for (k, v) in signed.iter() {
            plain.push_str(&format!("{}={}&", k, v));
        }
        plain.push_str(&format!("key={}", key));

        Ok(sign_matches(&md5_upper(&plain), data.get_or_empty("sign"))
            && data.get("returncode") == Some(OK_CODE))
    }

    async fn request_api(&self, url: &str, payload: &Params) -> Result<ApiResponse, PayError> {
        let resp = self.support.post_form(url, payload).await?;
        let code_ok = field(&resp, "code") == OK_CODE;
        let unanswered_find = payload.contains("find") && !resp.contains_key("code");
        if code_ok || unanswered_find {
            return Ok(resp);
        }
        Err(self.support.api_error(message(&resp, "msg"), resp))
    }
}

#[async_trait]
impl Gateway for Jiupay {
    fn name(&self) -> &'static str {
        "jiupay"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web, PayMethod::Wap]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        let kind = charge.extra("method").unwrap_or_default();
        let format = aggregator_format(kind);
        let apply_date = charge
            .extra("orderdate")
            .map(str::to_string)
            .unwrap_or_else(|| now().format("%Y-%m-%d %H:%M:%S").to_string());

        let mut payload = self
            .base_payload()
            .with("pay_orderid", charge.trade_no())
            .with("pay_amount", charge.amount().to_yuan())
            .with("pay_applydate", apply_date)
            .with("pay_bankcode", aggregator_pay_type(kind))
            .with("pay_format", format.map(AggregatorFormat::as_str).unwrap_or_default())
            .with("pay_clientip", charge.client_ip())
            .filtered();
        let sign = self.sign(&payload)?;
        payload.insert("pay_md5sign", sign);

        let endpoint = self.support.pay_endpoint()?;
        match format {
            Some(AggregatorFormat::PayStr) => {
                let resp = self.request_api(endpoint, &payload).await?;
                match field(&resp, "qrcode") {
                    url if !url.is_empty() => Ok(PayResponse::Redirect(url)),
                    _ => Err(self.support.api_error(message(&resp, "msg"), resp)),
                }
            }
            _ => build_pay_html(endpoint, &payload, HttpMethod::Post),
        }
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let mut payload = self.base_payload().with("pay_orderid", order);
        let sign = self.sign(&payload)?;
        payload.insert("pay_md5sign", sign);
        payload.insert("find", "1");

        let url = self.support.endpoint(Mode::Query)?;
        self.request_api(url, &payload).await
    }

    async fn verify(&self, mut data: Params) -> Result<PurchaseResult, PayError> {
        if !self.verify_sign(&data)? {
            return Err(self.support.sign_failed(&data));
        }

        let order_id = data.require("orderid")?.to_string();
        // The signed order amount is what the store checks; the settled
        // amount may be discounted and is kept alongside for reference.
        let amount = Amount::from_yuan(data.require("amount")?)?;
        let found = self.find(&order_id, QueryKind::Pay).await?;
        let actual = field(&found, "actualAmount");
        if !actual.is_empty() {
            data.insert("actual_amount", actual);
        }
        let is_paid = data.get("returncode") == Some(OK_CODE) && field(&found, "status") == "1";
        let trade_no = data.get_or_empty("transaction_id").to_string();
        let pay_time = parse_provider_time(data.get("datetime"));

        Ok(PurchaseResult::new(
            "jiupay", order_id, trade_no, amount, is_paid, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("SUCCESS".into())
    }
}
