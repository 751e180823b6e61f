//! Xfpay.
//!
//! The signed payload is serialized as sorted JSON (unicode and slashes left
//! unescaped), RSA encrypted with the provider's public key in 117-byte
//! blocks and posted as `{merchNo, data}`. Notifications may arrive the same
//! way, encrypted for the merchant's private key.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpTransport, Mode, PayError, PayMethod,
    PayResponse, Payable, Params, PurchaseResult, QueryKind, now,
};

use super::ensure_method;
use crate::crypto::{private_decrypt_chunked, private_key, public_encrypt_chunked, public_key};
use crate::security::{md5_upper, nonce, sign_matches};
use crate::support::{Endpoints, Support, field, message};

const URLS: Endpoints = &[
    (Mode::Normal, "http://netway.xfzfpay.com:90/api/pay"),
    (Mode::Dev, "http://netway.xfzfpay.com:90/api/pay"),
    (Mode::Query, "http://query.xfzfpay.com:90/api/queryPayResult"),
];

const VERSION: &str = "V3.3.0.0";
const OK_CODE: &str = "00";
const ENCRYPT_CHUNK: usize = 117;

pub struct Xfpay {
    support: Support,
}

impl Xfpay {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Xfpay", config, URLS, http),
        }
    }

    fn base_payload(&self) -> Params {
        Params::new()
            .with("version", VERSION)
            .with("charsetCode", "UTF-8")
            .with("merchNo", self.support.get("app_id"))
            .with("randomNum", nonce(8))
    }

    /// Upper-case MD5 of the sorted JSON object (minus `sign`) followed by the key.
    fn sign(&self, object: &Map<String, Value>) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let mut unsigned = object.clone();
        unsigned.remove("sign");
        let json = Value::Object(unsigned).to_string();
        let sign = md5_upper(&format!("{}{}", json, key));
        debug!(sign = %sign, "Xfpay Generate Sign");
        Ok(sign)
    }

    fn seal(&self, mut payload: Params) -> Result<Params, PayError> {
        let object = match payload.to_json() {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        payload.insert("sign", self.sign(&object)?);

        let key = public_key(self.support.require("public_key")?)?;
        let data = public_encrypt_chunked(&key, payload.to_json().to_string().as_bytes(), ENCRYPT_CHUNK)?;
        Ok(Params::new()
            .with("merchNo", payload.get_or_empty("merchNo"))
            .with("data", data))
    }

    /// Decrypts an encrypted `data` notification into its JSON object.
    fn open(&self, data: &str) -> Result<Map<String, Value>, PayError> {
        let key = private_key(self.support.require("private_key")?)?;
        let plain = private_decrypt_chunked(&key, data)?;
        match serde_json::from_slice(&plain) {
            Ok(Value::Object(object)) => Ok(object),
            _ => Err(PayError::Crypto("Xfpay notification is not a JSON object".into())),
        }
    }

    async fn request_api(&self, url: &str, payload: &Params) -> Result<ApiResponse, PayError> {
        let resp = self.support.post_form(url, payload).await?;
        if field(&resp, "stateCode") != OK_CODE {
            return Err(self.support.api_error(message(&resp, "msg"), resp));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Gateway for Xfpay {
    fn name(&self) -> &'static str {
        "xfpay"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::Web, PayMethod::Wap]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;

        let payload = self
            .base_payload()
            .with("notifyUrl", self.support.get("notify_url"))
            .with("notifyViewUrl", self.support.get("return_url"))
            .with("payType", self.support.get("pay_type"))
            .with("orderNo", charge.trade_no())
            .with("goodsName", charge.subject())
            .with("amount", charge.amount().fen().to_string());
        let sealed = self.seal(payload)?;

        let resp = self
            .request_api(self.support.pay_endpoint()?, &sealed)
            .await?;
        match ["qrcodeUrl", "payUrl"].iter().map(|k| field(&resp, k)).find(|u| !u.is_empty()) {
            Some(url) => Ok(PayResponse::Redirect(url)),
            None => Err(self.support.api_error(message(&resp, "msg"), resp)),
        }
    }

    async fn find(&self, order: &str, _kind: QueryKind) -> Result<ApiResponse, PayError> {
        let sealed = self.seal(self.base_payload().with("orderNo", order))?;
        self.request_api(self.support.endpoint(Mode::Query)?, &sealed)
            .await
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        let object = match data.get("data") {
            Some(encrypted) => self.open(encrypted)?,
            None => match data.to_json() {
                Value::Object(object) => object,
                _ => Map::new(),
            },
        };
        let given = object.get("sign").and_then(Value::as_str).unwrap_or_default();
        if !sign_matches(&self.sign(&object)?, given) {
            return Err(self.support.sign_failed(&data));
        }

        let mut raw = Params::from_json_object(&Value::Object(object));
        raw.insert("err_msg", "");
        let order_id = raw.require("orderNo")?.to_string();
        let amount = Amount::from_fen(raw.get_or_empty("amount").parse().unwrap_or_default())?;
        let is_paid = raw.get("payStateCode") == Some(OK_CODE);

        Ok(PurchaseResult::new(
            "Xfpay",
            order_id.clone(),
            order_id,
            amount,
            is_paid,
            now(),
            raw,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Text("SUCCESS".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, test_keys};
    use paygate_types::{Charge, RequestBody};

    fn gateway() -> (Xfpay, Arc<MockTransport>) {
        let keys = test_keys();
        let config = GatewayConfig {
            app_id: "XF001".into(),
            app_key: "xfkey".into(),
            pay_type: "ZFB".into(),
            notify_url: "http://shop.example/notify/xfpay".into(),
            public_key: keys.public_b64.clone(),
            private_key: keys.private_b64.clone(),
            ..Default::default()
        };
        let http = MockTransport::new();
        (Xfpay::new(config, http.clone()), http)
    }

    fn decrypt(data: &str) -> Map<String, Value> {
        let plain = private_decrypt_chunked(&test_keys().private, data).unwrap();
        match serde_json::from_slice(&plain).unwrap() {
            Value::Object(object) => object,
            other => panic!("unexpected {other}"),
        }
    }

    #[tokio::test]
    async fn test_pay_posts_encrypted_signed_json() {
        let (xfpay, http) = gateway();
        http.push_json(serde_json::json!({"stateCode": "00", "qrcodeUrl": "https://xf.example/qr/1"}));

        let charge = Charge::new("XF-1", Amount::from_fen(880).unwrap()).with_subject("会员/月卡");
        let resp = xfpay.pay(PayMethod::Web, &charge).await.unwrap();
        assert_eq!(resp, PayResponse::Redirect("https://xf.example/qr/1".into()));

        let RequestBody::Form(sent) = http.last_request().body else {
            panic!("expected form body");
        };
        assert_eq!(sent.get("merchNo"), Some("XF001"));

        let mut object = decrypt(sent.get_or_empty("data"));
        assert_eq!(object["amount"], "880");
        assert_eq!(object["goodsName"], "会员/月卡");
        let sign = object.remove("sign").unwrap();
        let json = Value::Object(object).to_string();
        assert!(json.contains("会员/月卡"));
        assert_eq!(sign, md5_upper(&format!("{}xfkey", json)));
    }

    #[tokio::test]
    async fn test_state_code_error() {
        let (xfpay, http) = gateway();
        http.push_json(serde_json::json!({"stateCode": "99", "msg": "金额错误"}));

        let charge = Charge::new("XF-1", Amount::from_fen(880).unwrap());
        let err = xfpay.pay(PayMethod::Wap, &charge).await.unwrap_err();
        assert_eq!(err.to_string(), "GATEWAY_ERROR: Get Xfpay API Error:金额错误");
    }

    #[tokio::test]
    async fn test_verify_encrypted_notification() {
        let (xfpay, _) = gateway();
        let mut object = Map::new();
        object.insert("orderNo".into(), "XF-1".into());
        object.insert("amount".into(), "880".into());
        object.insert("payStateCode".into(), "00".into());
        let sign = md5_upper(&format!("{}xfkey", Value::Object(object.clone())));
        object.insert("sign".into(), sign.into());

        let encrypted = public_encrypt_chunked(
            &test_keys().public,
            Value::Object(object).to_string().as_bytes(),
            ENCRYPT_CHUNK,
        )
        .unwrap();
        let result = xfpay
            .verify(Params::new().with("data", encrypted))
            .await
            .unwrap();
        assert!(result.is_paid());
        assert_eq!(result.channel(), "Xfpay");
        assert_eq!(result.order_id(), "XF-1");
        assert_eq!(result.trade_no(), "XF-1");
        assert_eq!(result.amount().fen(), 880);
        assert_eq!(result.raw_value("err_msg"), Some(""));
    }

    #[tokio::test]
    async fn test_verify_plain_notification_with_bad_sign() {
        let (xfpay, _) = gateway();
        let data = Params::new()
            .with("orderNo", "XF-1")
            .with("amount", "880")
            .with("payStateCode", "00")
            .with("sign", "ABC");
        assert!(matches!(
            xfpay.verify(data).await,
            Err(PayError::InvalidSign { .. })
        ));
    }
}
