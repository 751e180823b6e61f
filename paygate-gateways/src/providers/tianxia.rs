//! Tianxia Alipay payouts: signed form, `code == 200` or an empty body.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use paygate_types::{
    ApiResponse, Gateway, GatewayConfig, HttpRequest, HttpTransport, Mode, PayError, PayResponse,
    Params, PurchaseResult, QueryKind, RequestBody, TransferOutcome, Transferable,
};

use super::payout_notification;
use crate::security::{md5_lower, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support, field, into_object, message};

const URLS: Endpoints = &[];

pub struct Tianxia {
    support: Support,
}

impl Tianxia {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Tianxia", config, URLS, http),
        }
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_lower(&sorted_query_with_key(&params.without(&["sign"]).filtered(), key));
        debug!(sign = %sign, "Tianxia Generate Sign");
        Ok(sign)
    }

    async fn request_api(&self, mode: Mode, mut payload: Params) -> Result<ApiResponse, PayError> {
        let sign = self.sign(&payload)?;
        payload.insert("sign", sign);

        let request = HttpRequest::post(self.support.endpoint(mode)?, RequestBody::Form(payload.filtered()));
        let response = self.support.send(request).await?;
        if response.body.trim().is_empty() {
            return Ok(ApiResponse::new());
        }
        let resp = response.json().and_then(into_object)?;
        if resp.contains_key("code") && field(&resp, "code") != "200" {
            error!(response = ?resp, "Tianxia transfer request error");
            return Err(self.support.api_error(message(&resp, "msg"), resp));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Gateway for Tianxia {
    fn name(&self) -> &'static str {
        "tianxia"
    }

    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let payload = Params::new()
            .with("mch_id", self.support.get("app_id"))
            .with("out_biz_no", payout.transfer_no())
            .with("account", payout.account())
            .with("name", payout.real_name())
            .with("amount", payout.amount().to_yuan())
            .with("notify_url", self.support.get("notify_url"))
            .with("remark", payout.remark());
        self.request_api(Mode::Transfer, payload).await?;
        Ok(TransferOutcome::Accepted)
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let payload = Params::new()
            .with("mch_id", self.support.get("app_id"))
            .with("out_biz_no", order);
        self.request_api(Mode::TransferQuery, payload).await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        if !sign_matches(&self.sign(&data)?, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }
        payout_notification("tianxia", data)
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}
