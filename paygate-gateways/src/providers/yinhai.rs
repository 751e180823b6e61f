//! Yinhai web payments: the API answers with a `pay_url` to redirect to.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayMethod,
    PayResponse, Payable, Params, PurchaseResult, QueryKind, parse_provider_time,
};

use super::ensure_method;
use crate::security::{md5_upper, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[];

pub struct Yinhai {
    support: Support,
}

impl Yinhai {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Yinhai", config, URLS, http),
        }
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_upper(&sorted_query_with_key(&params.without(&["sign"]), key));
        debug!(sign = %sign, "Yinhai Generate Sign");
        Ok(sign)
    }

    fn signed(&self, payload: Params) -> Result<Params, PayError> {
        let mut payload = payload.filtered();
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);
        Ok(payload)
    }
}

#[async_trait]
impl Gateway for Yinhai {
    fn name(&self) -> &'static str {
        "yinhai"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        let payload = self.signed(
            Params::new()
                .with("mch_id", self.support.get("app_id"))
                .with("out_trade_no", charge.trade_no())
                .with("amount", charge.amount().to_yuan())
                .with("pay_type", self.support.get("pay_type"))
                .with("notify_url", self.support.get("notify_url"))
                .with("return_url", self.support.get("return_url"))
                .with("subject", charge.subject())
                .with("client_ip", charge.client_ip()),
        )?;

        let resp = self
            .support
            .post_form(self.support.pay_endpoint()?, &payload)
            .await?;
        match field(&resp, "pay_url") {
            url if !url.is_empty() => Ok(PayResponse::Redirect(url)),
            _ => Err(self.support.api_error(message(&resp, "msg"), resp)),
        }
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let payload = self.signed(
            Params::new()
                .with("mch_id", self.support.get("app_id"))
                .with("out_trade_no", order),
        )?;
        self.support
            .post_form(self.support.endpoint(Mode::Query)?, &payload)
            .await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        if !sign_matches(&self.sign(&data.filtered())?, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let amount = Amount::from_yuan(data.require("amount")?)?;
        let order_id = data.require("out_trade_no")?.to_string();
        let trade_no = data.get_or_empty("trade_no").to_string();
        let pay_time = parse_provider_time(data.get("pay_time"));

        Ok(PurchaseResult::new(
            "yinhai", order_id, trade_no, amount, true, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}
