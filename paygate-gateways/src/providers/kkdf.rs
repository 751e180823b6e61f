//! Kkdf bank-card payouts.
//!
//! The order fields are url-encoded and RSA "encrypted" with the merchant's
//! private key into `Data`; the envelope is signed with MD5, upper case, over
//! the sorted fields plus `&key=`. Notifications carry `Data` encrypted with
//! the provider's private key.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpRequest, HttpTransport, Mode, PayError,
    Params, PayResponse, PurchaseResult, QueryKind, RequestBody, TransferOutcome, Transferable,
    now,
};

use crate::bank::resolve_bank_code;
use crate::crypto::{private_encrypt_chunked, private_key, public_decrypt_chunked, public_key};
use crate::security::{md5_upper, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support, field, into_object, message};

const URLS: Endpoints = &[
    (Mode::Transfer, "http://gateway.kkmpay.com:88/order/submit"),
    (Mode::TransferQuery, "http://gateway.kkmpay.com:88/order/query"),
];

const ENCRYPT_CHUNK: usize = 117;

pub struct Kkdf {
    support: Support,
}

impl Kkdf {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Kkdf", config, URLS, http),
        }
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let sign = md5_upper(&sorted_query_with_key(&params.without(&["Sign"]), key));
        debug!(sign = %sign, "Kkdf Generate Sign");
        Ok(sign)
    }

    /// `{Version, MerchantNo, Data, Sign}` around the encrypted fields.
    fn envelope(&self, fields: &[(&str, String)]) -> Result<Params, PayError> {
        let query = serde_urlencoded::to_string(fields)
            .map_err(|e| PayError::InvalidArgument(format!("Unencodable Kkdf data: {}", e)))?;
        let key = private_key(self.support.require("private_key")?)?;
        let data = private_encrypt_chunked(&key, query.as_bytes(), ENCRYPT_CHUNK)?;

        let mut payload = Params::new()
            .with("Version", "1.0")
            .with("MerchantNo", self.support.get("app_id"))
            .with("Data", data);
        payload.insert("Sign", self.sign(&payload)?);
        Ok(payload)
    }

    /// Empty bodies count as accepted; a `Code` other than 200 is an error.
    fn check(&self, body: &str) -> Result<ApiResponse, PayError> {
        if body.trim().is_empty() {
            return Ok(ApiResponse::new());
        }
        let resp = serde_json::from_str::<serde_json::Value>(body.trim())
            .map_err(|e| self.support.api_error(e, body.to_string()))
            .and_then(into_object)?;
        if resp.contains_key("Code") && field(&resp, "Code") != "200" {
            error!(response = ?resp, "Kkdf transfer request error");
            return Err(self.support.api_error(message(&resp, "Message"), resp));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Gateway for Kkdf {
    fn name(&self) -> &'static str {
        "kkdf"
    }

    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let bank_code = resolve_bank_code(
            self.support.http(),
            payout.account(),
            payout.extra("bank_name").unwrap_or_default(),
        )
        .await;
        let fields = [
            ("MerchantOrderNo", payout.transfer_no().to_string()),
            ("BankCode", bank_code),
            ("PayeeType", "0".to_string()),
            ("PayeeName", payout.real_name().to_string()),
            ("PayeeAccount", payout.account().to_string()),
            ("Amount", payout.amount().to_yuan()),
            ("NoticeUrl", self.support.get("notify_url").to_string()),
            ("Remark", payout.remark().to_string()),
        ];
        let payload = self.envelope(&fields)?;

        let url = self.support.endpoint(Mode::Transfer)?;
        let request = HttpRequest::post(url, RequestBody::Form(payload.filtered()));
        let response = self.support.send(request).await?;
        self.check(&response.body)?;
        Ok(TransferOutcome::Accepted)
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let payload = self.envelope(&[("OrderNo", order.to_string())])?;
        let url = self.support.endpoint(Mode::TransferQuery)?;
        let response = self
            .support
            .send(HttpRequest::get(url, payload.filtered()))
            .await?;
        self.check(&response.body)
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        if !sign_matches(&self.sign(&data)?, data.get_or_empty("Sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let key = public_key(self.support.require("public_key")?)?;
        let plain = public_decrypt_chunked(&key, data.require("Data")?)?;
        let text = String::from_utf8_lossy(&plain);
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(&text)
            .map_err(|e| PayError::InvalidArgument(format!("Undecodable Kkdf data: {}", e)))?;
        let mut params: Params = pairs.into_iter().collect();

        let order_no = params.require("OrderNo")?.to_string();
        self.find(&order_no, QueryKind::Transfer).await?;

        let err_msg = params.get_or_empty("error_note").to_string();
        params.insert("err_msg", err_msg);
        let order_id = params.require("MerchantOrderNo")?.to_string();
        let is_paid = params.get_or_empty("Status").trim() == "Success";

        Ok(PurchaseResult::new(
            "Kkdf", order_id, order_no, Amount::ZERO, is_paid, now(), params,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("OK".into())
    }
}
