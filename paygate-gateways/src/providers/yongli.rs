//! Yongli Alipay payouts.
//!
//! Signs are MD5, upper case, over a fixed field order ending in `&_token=`.
//! A transfer rejected as a duplicate order was already submitted and counts
//! as accepted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};

use paygate_types::{
    ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayResponse, Params,
    PurchaseResult, QueryKind, TransferOutcome, Transferable,
};

use super::payout_notification;
use crate::security::{md5_upper, sign_matches};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Normal, "https://www.banjiagouwu.com/?c=Pay"),
    (Mode::Dev, "https://www.banjiagouwu.com/?c=Pay"),
    (Mode::Query, "http://yl.yonglidf01.com/index/api/transfer"),
    (Mode::Transfer, "http://yl.yonglidf01.com/index/api/transfer"),
    (Mode::TransferQuery, "http://yl.yonglidf01.com/index/api/transfer"),
];

const DUPLICATE_ORDER: &str = "订单号重复，请确认";

pub struct Yongli {
    support: Support,
}

impl Yongli {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Yongli", config, URLS, http),
        }
    }

    /// `md5(k1=v1&k2=v2...&_token=KEY)` over `fields` in the given order.
    fn sign(&self, params: &Params, fields: &[&str]) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let mut plain: Vec<String> = fields
            .iter()
            .map(|f| format!("{}={}", f, params.get_or_empty(f)))
            .collect();
        plain.push(format!("_token={}", key));
        let sign = md5_upper(&plain.join("&"));
        debug!(sign = %sign, "Yongli Generate Sign");
        Ok(sign)
    }
}

#[async_trait]
impl Gateway for Yongli {
    fn name(&self) -> &'static str {
        "yongli"
    }

    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let mut payload = Params::new()
            .with("appid", self.support.get("app_id"))
            .with("order_id", payout.transfer_no())
            .with("recipients", payout.account())
            .with("name", payout.real_name())
            .with("amount", payout.amount().to_yuan())
            .with("mode", "1")
            .with("remark", payout.remark());
        let sign = self.sign(
            &payload,
            &["appid", "recipients", "name", "amount", "order_id", "mode"],
        )?;
        payload.insert("sign", sign);

        let url = self.support.endpoint(Mode::Transfer)?;
        let resp = self.support.post_form(url, &payload).await?;
        if resp.contains_key("code") && field(&resp, "code") != "0" {
            error!(response = ?resp, "Yongli transfer request error");
            if field(&resp, "msg") != DUPLICATE_ORDER {
                return Err(self.support.api_error(message(&resp, "msg"), resp));
            }
        }
        Ok(TransferOutcome::Accepted)
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let mut payload = Params::new()
            .with("appid", self.support.get("app_id"))
            .with("out_order_sn", order)
            .with("time", Utc::now().timestamp().to_string());
        let sign = self.sign(&payload, &["appid", "out_order_sn", "time"])?;
        payload.insert("sign", sign);
        payload.insert("find", "1");

        let url = self.support.endpoint(Mode::Query)?;
        let resp = self.support.post_form(url, &payload).await?;
        if resp.is_empty() {
            return Err(self.support.api_error(message(&resp, "msg"), resp));
        }
        Ok(resp)
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        let signed = data.contains("appid")
            && sign_matches(
                &self.sign(&data, &["appid", "orderstatus", "amount", "endtime"])?,
                data.get_or_empty("sign"),
            );
        if !signed {
            return Err(self.support.sign_failed(&data));
        }

        payout_notification("yongli", data)
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}
