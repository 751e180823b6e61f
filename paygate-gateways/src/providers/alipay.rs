//! Alipay open platform (RSA2).
//!
//! Requests are signed with SHA256withRSA over the sorted non-empty fields.
//! API answers nest the result under `{method}_response` next to a `sign`
//! computed over the exact JSON text of that node, so responses are kept as
//! raw JSON until the signature has been checked.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::value::RawValue;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpMethod, HttpRequest, HttpTransport, Mode,
    PayError, PayMethod, PayResponse, Payable, Params, PurchaseResult, QueryKind, RequestBody,
    TransferOutcome, TransferResult, Transferable, now, parse_provider_time,
};

use super::ensure_method;
use crate::crypto::{private_key, public_key, rsa2_sign, rsa2_verify};
use crate::form::build_pay_html;
use crate::security::sorted_query;
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Normal, "https://openapi.alipay.com/gateway.do"),
    (Mode::Dev, "https://openapi.alipaydev.com/gateway.do"),
];

const OK_CODE: &str = "10000";

pub struct Alipay {
    support: Support,
}

impl Alipay {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Alipay", config, URLS, http),
        }
    }

    /// Common request fields around a `biz_content` document.
    fn payload(&self, method: &str, biz_content: Value) -> Params {
        Params::new()
            .with("app_id", self.support.get("app_id"))
            .with("method", method)
            .with("format", "JSON")
            .with("return_url", self.support.get("return_url"))
            .with("charset", "utf-8")
            .with("sign_type", "RSA2")
            .with("version", "1.0")
            .with("notify_url", self.support.get("notify_url"))
            .with("timestamp", now().format("%Y-%m-%d %H:%M:%S").to_string())
            .with("biz_content", biz_content.to_string())
    }

    fn sign(&self, payload: Params) -> Result<Params, PayError> {
        let mut payload = payload.filtered();
        let key = private_key(self.support.require("private_key")?)?;
        let sign = rsa2_sign(&key, &sorted_query(&payload.without(&["sign"])));
        debug!(sign = %sign, "Alipay Generate Sign");
        payload.insert("sign", sign);
        Ok(payload)
    }

    fn verify_sign(&self, content: &str, sign: &str) -> Result<bool, PayError> {
        let key = public_key(self.support.require("public_key")?)?;
        Ok(rsa2_verify(&key, content, sign))
    }

    /// Posts a signed request and returns the verified `{method}_response` node.
    async fn request_api(&self, payload: Params) -> Result<ApiResponse, PayError> {
        let method = payload.get_or_empty("method").to_string();
        let payload = self.sign(payload)?;
        let url = self.support.pay_endpoint()?;
        let response = self
            .support
            .send(HttpRequest::post(url, RequestBody::Form(payload)))
            .await?;

        let nodes: BTreeMap<String, Box<RawValue>> = serde_json::from_str(response.body.trim())
            .map_err(|e| self.support.api_error(e, response.body.clone()))?;
        let node_key = format!("{}_response", method.replace('.', "_"));
        let Some(node) = nodes.get(&node_key) else {
            return Err(self.support.api_error(
                format!("missing {}", node_key),
                response.body.clone(),
            ));
        };

        let resp: Map<String, Value> = serde_json::from_str(node.get())
            .map_err(|e| self.support.api_error(e, response.body.clone()))?;

        // Error answers may arrive unsigned; a success answer never may.
        let signature = nodes
            .get("sign")
            .and_then(|s| serde_json::from_str::<String>(s.get()).ok());
        let verified = match signature {
            Some(signature) => self.verify_sign(node.get(), &signature)?,
            None => field(&resp, "code") != OK_CODE,
        };
        if !verified {
            warn!(method = %method, "Alipay response sign verify failed");
            return Err(PayError::invalid_sign(
                self.support.name(),
                Value::String(response.body.clone()),
            ));
        }

        if field(&resp, "code") != OK_CODE {
            let msg = format!(
                "{}-{}",
                message(&resp, "msg"),
                field(&resp, "sub_msg")
            );
            return Err(self.support.api_error(msg, resp));
        }
        Ok(resp)
    }

    fn purchase_content(&self, charge: &dyn Payable, product_code: &str) -> Value {
        let mut content = json!({
            "out_trade_no": charge.trade_no(),
            "total_amount": charge.amount().to_yuan(),
            "subject": charge.subject(),
            "product_code": product_code,
        });
        if !charge.body().is_empty() {
            content["body"] = Value::String(charge.body().to_string());
        }
        if let Some(expire) = charge.expire() {
            content["time_expire"] = Value::String(expire.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        content
    }
}

#[async_trait]
impl Gateway for Alipay {
    fn name(&self) -> &'static str {
        "alipay"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web, PayMethod::Wap, PayMethod::App, PayMethod::Scan]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        match method {
            PayMethod::Web | PayMethod::Wap => {
                let (api, product) = match method {
                    PayMethod::Web => ("alipay.trade.page.pay", "FAST_INSTANT_TRADE_PAY"),
                    _ => ("alipay.trade.wap.pay", "QUICK_WAP_WAY"),
                };
                let payload = self.sign(self.payload(api, self.purchase_content(charge, product)))?;
                build_pay_html(self.support.pay_endpoint()?, &payload, HttpMethod::Post)
            }
            PayMethod::App => {
                let content = self.purchase_content(charge, "QUICK_MSECURITY_PAY");
                let payload = self.sign(self.payload("alipay.trade.app.pay", content))?;
                let query = serde_urlencoded::to_string(&payload)
                    .map_err(|e| PayError::InvalidArgument(e.to_string()))?;
                Ok(PayResponse::Text(query))
            }
            _ => {
                let content = self.purchase_content(charge, "FACE_TO_FACE_PAYMENT");
                let resp = self
                    .request_api(self.payload("alipay.trade.precreate", content))
                    .await?;
                Ok(PayResponse::Json(Value::Object(resp)))
            }
        }
    }

    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let content = json!({
            "out_biz_no": payout.transfer_no(),
            "trans_amount": payout.amount().to_yuan(),
            "product_code": "TRANS_ACCOUNT_NO_PWD",
            "biz_scene": "DIRECT_TRANSFER",
            "order_title": payout.remark(),
            "payee_info": {
                "identity": payout.account(),
                "identity_type": "ALIPAY_LOGON_ID",
                "name": payout.real_name(),
            },
        });
        let resp = self
            .request_api(self.payload("alipay.fund.trans.uni.transfer", content))
            .await?;

        let trans_date = field(&resp, "trans_date");
        Ok(TransferOutcome::Completed(TransferResult::new(
            field(&resp, "order_id"),
            parse_provider_time(Some(trans_date.as_str())),
        )))
    }

    async fn find(&self, order: &str, kind: QueryKind) -> Result<ApiResponse, PayError> {
        let payload = match kind {
            QueryKind::Pay => self.payload("alipay.trade.query", json!({"out_trade_no": order})),
            QueryKind::Transfer => {
                self.payload("alipay.fund.trans.order.query", json!({"out_biz_no": order}))
            }
        };
        self.request_api(payload).await
    }

    async fn refund(&self, order: &Params) -> Result<ApiResponse, PayError> {
        self.request_api(self.payload("alipay.trade.refund", order.to_json()))
            .await
    }

    async fn cancel(&self, order: &str) -> Result<ApiResponse, PayError> {
        self.request_api(self.payload("alipay.trade.cancel", json!({"out_trade_no": order})))
            .await
    }

    async fn close(&self, order: &str) -> Result<ApiResponse, PayError> {
        self.request_api(self.payload("alipay.trade.close", json!({"out_trade_no": order})))
            .await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        let content = sorted_query(&data.without(&["sign", "sign_type"]).filtered());
        if !self.verify_sign(&content, data.get_or_empty("sign"))? {
            return Err(self.support.sign_failed(&data));
        }

        let amount = match data.get("total_amount").filter(|a| !a.is_empty()) {
            Some(a) => Amount::from_yuan(a)?,
            None => Amount::ZERO,
        };
        let is_paid = matches!(
            data.get("trade_status"),
            Some("TRADE_SUCCESS" | "TRADE_FINISHED")
        );
        let order_id = data.require("out_trade_no")?.to_string();
        let trade_no = data.get_or_empty("trade_no").to_string();
        let pay_time = parse_provider_time(data.get("gmt_payment"));

        Ok(PurchaseResult::new(
            "alipay", order_id, trade_no, amount, is_paid, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("success".into())
    }
}
