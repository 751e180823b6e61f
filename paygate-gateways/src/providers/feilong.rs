//! Feilong web payments: the payer is handed a self-submitting form.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpMethod, HttpTransport, Mode, PayError,
    PayMethod, PayResponse, Payable, Params, PurchaseResult, QueryKind, parse_provider_time,
};

use super::ensure_method;
use crate::form::build_pay_html;
use crate::security::{md5_upper, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support};

const URLS: Endpoints = &[];

pub struct Feilong {
    support: Support,
}

impl Feilong {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Feilong", config, URLS, http),
        }
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_upper(&sorted_query_with_key(&params.without(&["sign"]), key));
        debug!(sign = %sign, "Feilong Generate Sign");
        Ok(sign)
    }
}

#[async_trait]
impl Gateway for Feilong {
    fn name(&self) -> &'static str {
        "feilong"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        let mut payload = Params::new()
            .with("merchant_no", self.support.get("app_id"))
            .with("order_no", charge.trade_no())
            .with("amount", charge.amount().to_yuan())
            .with("pay_type", self.support.get("pay_type"))
            .with("notify_url", self.support.get("notify_url"))
            .with("return_url", self.support.get("return_url"))
            .with("goods_name", charge.subject())
            .filtered();
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        build_pay_html(self.support.pay_endpoint()?, &payload, HttpMethod::Post)
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let mut payload = Params::new()
            .with("merchant_no", self.support.get("app_id"))
            .with("order_no", order);
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        self.support
            .post_form(self.support.endpoint(Mode::Query)?, &payload)
            .await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        if !sign_matches(&self.sign(&data.filtered())?, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let amount = Amount::from_yuan(data.require("amount")?)?;
        let order_id = data.require("order_no")?.to_string();
        let trade_no = data.get_or_empty("trade_no").to_string();
        let pay_time = parse_provider_time(data.get("pay_time"));

        Ok(PurchaseResult::new(
            "feilong", order_id, trade_no, amount, true, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}
