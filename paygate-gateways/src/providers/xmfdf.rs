//! Xmfdf Alipay payouts, submitted as a JSON batch of one.
//!
//! The batch is signed with MD5, lower case, over
//! `shopId`, `createTime`, `amount` and `len` plus `&key=`. Responses wrap
//! their status in `header.code`, zero meaning success.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayResponse,
    Params, PurchaseResult, QueryKind, TransferOutcome, Transferable, now,
};

use crate::security::{md5_lower, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Transfer, "http://47.244.151.121:6901/service/payment/api/payment"),
    (Mode::TransferQuery, "http://47.244.151.121:6901/service/payment/api/detail"),
];

const FAILED_NOTE: &str = "转账失败";

pub struct Xmfdf {
    support: Support,
}

impl Xmfdf {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Xmfdf", config, URLS, http),
        }
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_lower(&sorted_query_with_key(params, key));
        debug!(sign = %sign, "Xmfdf Generate Sign");
        Ok(sign)
    }

    fn check(&self, resp: ApiResponse) -> Result<ApiResponse, PayError> {
        let header = match resp.get("header") {
            Some(Value::Object(header)) => header.clone(),
            _ => ApiResponse::new(),
        };
        if field(&header, "code") != "0" {
            return Err(self.support.api_error(message(&header, "msg"), resp));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Gateway for Xmfdf {
    fn name(&self) -> &'static str {
        "xmfdf"
    }

    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let shop_id = self.support.get("app_id");
        let amount = payout.amount().to_yuan();
        let create_time = now().format("%Y-%m-%d %H:%M:%S").to_string();
        let signed = Params::new()
            .with("shopId", shop_id)
            .with("createTime", create_time.as_str())
            .with("amount", amount.as_str())
            .with("len", "1");
        let sign = self.sign(&signed)?;

        let body = json!({
            "shopId": shop_id,
            "amount": amount,
            "len": "1",
            "data": [{
                "bankAccount": payout.real_name(),
                "amount": amount,
                "orderNo": payout.transfer_no(),
                "bankMark": "ZFB",
                "bankName": "支付宝",
                "cardNo": payout.account(),
                "callBackUrl": self.support.get("notify_url"),
            }],
            "createTime": create_time,
            "sign": sign,
        });

        let url = self.support.endpoint(Mode::Transfer)?;
        let resp = self.support.post_json(url, body).await?;
        self.check(resp)?;
        Ok(TransferOutcome::Accepted)
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let url = format!(
            "{}/{}/{}",
            self.support.endpoint(Mode::TransferQuery)?,
            self.support.get("app_id"),
            order
        );
        let resp = self.support.get_json(&url, &Params::new()).await?;
        self.check(resp)
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        info!(data = ?data, "Xmfdf notify data");
        if !sign_matches(&self.sign(&data.without(&["sign"]))?, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let found = match self.find(data.require("orderNo")?, QueryKind::Transfer).await {
            Ok(found) => found,
            Err(PayError::Gateway { .. }) => return Err(self.support.sign_failed(&data)),
            Err(e) => return Err(e),
        };
        let (order_id, trade_no) = match found.get("data") {
            Some(Value::Object(detail)) => (field(detail, "orderNo"), field(detail, "serverNo")),
            _ => (String::new(), String::new()),
        };

        let mut data = data;
        let is_paid = data.get_or_empty("status").trim() == "PAYED";
        data.insert("err_msg", FAILED_NOTE);

        Ok(PurchaseResult::new(
            "xmfdf",
            order_id,
            trade_no,
            Amount::ZERO,
            is_paid,
            now(),
            data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("OK".into())
    }
}
