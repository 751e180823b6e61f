//! Tongyi Alipay payouts.
//!
//! Requests post `client_id`, `type`, `sign` and the JSON `body`. Signs are
//! MD5, upper case, of `key + k1v1k2v2... + key`. The provider only calls back
//! for failed payouts; successful ones are confirmed by looking the order up
//! right after submission.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayResponse,
    Params, PurchaseResult, QueryKind, TransferOutcome, TransferResult, Transferable, now,
};

use crate::security::{md5_lower, md5_upper, sign_matches};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Transfer, "http://daifu.zhoumuming.com/api/returndata.php"),
    (Mode::TransferQuery, "http://daifu.zhoumuming.com/api/returndata.php"),
];

const FAILED_NOTE: &str = "下单失败";

pub struct Tongyi {
    support: Support,
}

impl Tongyi {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Tongyi", config, URLS, http),
        }
    }

    /// `fields` are concatenated as `name + value` in order.
    fn sign(&self, fields: &[(&str, &str)]) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let plain: String = fields.iter().map(|(k, v)| format!("{}{}", k, v)).collect();
        let sign = md5_upper(&format!("{}{}{}", key, plain, key));
        debug!(sign = %sign, "Tongyi Generate Sign");
        Ok(sign)
    }

    async fn request_api(
        &self,
        mode: Mode,
        kind: &str,
        sign: String,
        body: Value,
        find: bool,
    ) -> Result<ApiResponse, PayError> {
        let mut payload = Params::new()
            .with("client_id", self.support.get("app_id"))
            .with("type", kind)
            .with("sign", sign)
            .with("body", body.to_string());
        if find {
            payload.insert("find", "1");
        }

        let resp = self
            .support
            .post_form(self.support.endpoint(mode)?, &payload)
            .await?;
        if field(&resp, "code") != "200" {
            return Err(self.support.api_error(message(&resp, "message"), resp));
        }
        Ok(resp)
    }

    /// `check_withdraw_detail` by `out_logno` or `clearno`.
    async fn lookup(&self, name: &str, value: &str) -> Result<ApiResponse, PayError> {
        let sign = self.sign(&[(name, value)])?;
        let mut body = serde_json::Map::new();
        body.insert(name.to_string(), Value::String(value.to_string()));
        self.request_api(
            Mode::TransferQuery,
            "check_withdraw_detail",
            sign,
            Value::Object(body),
            true,
        )
        .await
    }
}

fn detail(resp: &ApiResponse, key: &str) -> String {
    match resp.get("data") {
        Some(Value::Object(data)) => field(data, key),
        _ => String::new(),
    }
}

#[async_trait]
impl Gateway for Tongyi {
    fn name(&self) -> &'static str {
        "tongyi"
    }

    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let money = payout.amount().to_yuan();
        let notify_url = self.support.get("notify_url");
        let sign = self.sign(&[
            ("money", &money),
            ("alipayname", payout.real_name()),
            ("alipaynum", payout.account()),
            ("out_logno", payout.transfer_no()),
            ("notifyurl", notify_url),
        ])?;
        let body = json!({
            "money": money,
            "alipayname": payout.real_name(),
            "alipaynum": payout.account(),
            "out_logno": payout.transfer_no(),
            "notifyurl": notify_url,
        });

        let submitted = self
            .request_api(Mode::Transfer, "get_withdraws", sign, body, false)
            .await;
        if let Err(e) = &submitted {
            warn!(error = %e, "Tongyi submit failed, looking the order up");
        }

        match self.lookup("out_logno", payout.transfer_no()).await {
            Ok(found) => Ok(TransferOutcome::Completed(TransferResult::new(
                detail(&found, "clearno"),
                now(),
            ))),
            Err(lookup_err) => match submitted {
                Ok(_) => Ok(TransferOutcome::Accepted),
                Err(_) => Err(lookup_err),
            },
        }
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        self.lookup("out_logno", order).await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        let key = self.support.require("app_key")?;
        let expected = md5_lower(&format!(
            "{}{}{}{}{}",
            self.support.get("app_id"),
            data.get_or_empty("clearno"),
            data.get_or_empty("money"),
            data.get_or_empty("createtime"),
            key
        ));
        if !sign_matches(&expected, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let found = self.lookup("clearno", data.require("clearno")?).await?;
        if found.is_empty() {
            return Err(self.support.sign_failed(&data));
        }

        let mut data = data;
        let order_id = detail(&found, "out_logno");
        let trade_no = detail(&found, "clearno");
        data.insert("err_msg", FAILED_NOTE);
        data.insert("order_id", trade_no.as_str());
        data.insert("out_biz_no", order_id.as_str());

        Ok(PurchaseResult::new(
            "tongyi",
            order_id,
            trade_no,
            Amount::ZERO,
            false,
            now(),
            data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("SUCCESS".into())
    }
}
