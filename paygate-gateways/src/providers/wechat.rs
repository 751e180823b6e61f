//! Wechat Pay v2 (XML).
//!
//! Every request and answer is a flat `<xml>` document signed over the sorted
//! non-empty fields plus `&key=`, with MD5 or HMAC-SHA256 (upper case) picked
//! by `sign_type`. In `service` mode the partner pays on behalf of a sub
//! merchant (`sub_mch_id`, `sub_appid`).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::debug;

use paygate_types::{
    Amount, ApiResponse, Gateway, GatewayConfig, HttpRequest, HttpTransport, Mode, PayError,
    PayMethod, PayResponse, Payable, Params, PurchaseResult, QueryKind, RequestBody,
    parse_provider_time,
};

use super::ensure_method;
use crate::security::{hmac_sha256_upper, md5_upper, nonce, sign_matches, sorted_query_with_key};
use crate::support::{Endpoints, Support};
use crate::xml::{from_xml, to_xml};

const URLS: Endpoints = &[
    (Mode::Normal, "https://api.mch.weixin.qq.com/"),
    (Mode::Dev, "https://api.mch.weixin.qq.com/sandboxnew/"),
    (Mode::Service, "https://api.mch.weixin.qq.com/"),
];

const SUCCESS: &str = "SUCCESS";
const HMAC_SHA256: &str = "HMAC-SHA256";

pub struct Wechat {
    support: Support,
}

impl Wechat {
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            support: Support::new("Wechat", config, URLS, http),
        }
    }

    fn is_service(&self) -> bool {
        self.support.config().mode == Mode::Service
    }

    fn sign_type(&self) -> &str {
        match self.support.get("sign_type") {
            HMAC_SHA256 => HMAC_SHA256,
            _ => "MD5",
        }
    }

    fn sign(&self, params: &Params) -> Result<String, PayError> {
        let key = self.support.require("app_key")?;
        let plain = sorted_query_with_key(&params.without(&["sign"]).filtered(), key);
        let sign = if self.sign_type() == HMAC_SHA256 {
            hmac_sha256_upper(&plain, key)
        } else {
            md5_upper(&plain)
        };
        debug!(sign = %sign, "Wechat Generate Sign");
        Ok(sign)
    }

    /// Fields every API call carries.
    fn payload(&self, appid: &str) -> Params {
        let mut payload = Params::new()
            .with("appid", appid)
            .with("mch_id", self.support.get("mch_id"))
            .with("nonce_str", nonce(32))
            .with("sign_type", self.sign_type());
        if self.is_service() {
            payload.insert("sub_mch_id", self.support.get("sub_mch_id"));
            payload.insert("sub_appid", self.support.get("sub_appid"));
        }
        payload
    }

    /// Posts a signed XML request; both `return_code` and `result_code` must be SUCCESS.
    async fn request_api(&self, path: &str, payload: Params) -> Result<Params, PayError> {
        let mut payload = payload.filtered();
        payload.insert("sign", self.sign(&payload)?);

        let url = format!("{}{}", self.support.pay_endpoint()?, path);
        let request = HttpRequest::post(
            url,
            RequestBody::Raw {
                content_type: "text/xml".into(),
                body: to_xml(&payload),
            },
        );
        let response = self.support.send(request).await?;
        let result = from_xml(&response.body)?;

        if result.get("return_code") != Some(SUCCESS) {
            let msg = result.get_or_empty("return_msg").to_string();
            return Err(self.support.api_error(msg, &result));
        }
        if !sign_matches(&self.sign(&result)?, result.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&result));
        }
        if result.get("result_code") != Some(SUCCESS) {
            let msg = format!(
                "{}-{}",
                result.get_or_empty("err_code"),
                result.get_or_empty("err_code_des")
            );
            return Err(self.support.api_error(msg, &result));
        }
        Ok(result)
    }

    async fn unified_order(
        &self,
        appid: &str,
        trade_type: &str,
        charge: &dyn Payable,
    ) -> Result<Params, PayError> {
        let mut payload = self
            .payload(appid)
            .with("notify_url", self.support.get("notify_url"))
            .with("trade_type", trade_type)
            .with("spbill_create_ip", charge.client_ip())
            .with("body", charge.subject())
            .with("detail", charge.body())
            .with("out_trade_no", charge.trade_no())
            .with("total_fee", charge.amount().fen().to_string())
            .with("attach", charge.user());
        if let Some(expire) = charge.expire() {
            payload.insert("time_expire", expire.format("%Y%m%d%H%M%S").to_string());
        }
        if trade_type == "JSAPI" {
            let openid_key = if self.is_service() { "sub_openid" } else { "openid" };
            payload.insert(openid_key, charge.extra("openid").unwrap_or_default());
        }
        self.request_api("pay/unifiedorder", payload).await
    }
}

fn to_api_response(params: &Params) -> ApiResponse {
    match params.to_json() {
        Value::Object(map) => map,
        _ => ApiResponse::new(),
    }
}

#[async_trait]
impl Gateway for Wechat {
    fn name(&self) -> &'static str {
        "wechat"
    }

    fn methods(&self) -> &'static [PayMethod] {
        &[PayMethod::App, PayMethod::Scan, PayMethod::Wap, PayMethod::Mini]
    }

    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        ensure_method(self, method)?;
        let app_id = self.support.get("app_id").to_string();

        match method {
            PayMethod::App => {
                let appid = self.support.get("appid").to_string();
                let prepay = self.unified_order(&appid, "APP", charge).await?;
                let (appid, partnerid) = if self.is_service() {
                    (self.support.get("sub_appid"), self.support.get("sub_mch_id"))
                } else {
                    (appid.as_str(), self.support.get("mch_id"))
                };
                let mut request = Params::new()
                    .with("appid", appid)
                    .with("partnerid", partnerid)
                    .with("prepayid", prepay.get_or_empty("prepay_id"))
                    .with("timestamp", Utc::now().timestamp().to_string())
                    .with("noncestr", nonce(16))
                    .with("package", "Sign=WXPay");
                request.insert("sign", self.sign(&request)?);
                Ok(PayResponse::Json(request.to_json()))
            }
            PayMethod::Scan => {
                let result = self.unified_order(&app_id, "NATIVE", charge).await?;
                Ok(PayResponse::Json(json!({
                    "code_url": result.get_or_empty("code_url"),
                    "prepay_id": result.get_or_empty("prepay_id"),
                })))
            }
            PayMethod::Wap => {
                let result = self.unified_order(&app_id, "MWEB", charge).await?;
                let mut url = result.get_or_empty("mweb_url").to_string();
                let return_url = self.support.get("return_url");
                if !return_url.is_empty() {
                    let query = serde_urlencoded::to_string([("redirect_url", return_url)])
                        .map_err(|e| PayError::InvalidArgument(e.to_string()))?;
                    url = format!("{}&{}", url, query);
                }
                Ok(PayResponse::Redirect(url))
            }
            _ => {
                let appid = self
                    .support
                    .config()
                    .get("miniapp_id")
                    .unwrap_or(app_id.as_str())
                    .to_string();
                let result = self.unified_order(&appid, "JSAPI", charge).await?;
                let mut request = Params::new()
                    .with("appId", appid.as_str())
                    .with("timeStamp", Utc::now().timestamp().to_string())
                    .with("nonceStr", nonce(16))
                    .with("package", format!("prepay_id={}", result.get_or_empty("prepay_id")))
                    .with("signType", self.sign_type());
                let pay_sign = self.sign(&request)?;
                request.insert("paySign", pay_sign);
                Ok(PayResponse::Json(request.to_json()))
            }
        }
    }

    async fn find(&self, order: &str, kind: QueryKind) -> Result<ApiResponse, PayError> {
        if kind == QueryKind::Transfer {
            return Err(PayError::unsupported(self.name(), "transfer query"));
        }
        let payload = self
            .payload(self.support.get("app_id"))
            .with("out_trade_no", order);
        let result = self.request_api("pay/orderquery", payload).await?;
        Ok(to_api_response(&result))
    }

    async fn close(&self, order: &str) -> Result<ApiResponse, PayError> {
        let payload = self
            .payload(self.support.get("app_id"))
            .with("out_trade_no", order);
        let result = self.request_api("pay/closeorder", payload).await?;
        Ok(to_api_response(&result))
    }

    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError> {
        if !sign_matches(&self.sign(&data)?, data.get_or_empty("sign")) {
            return Err(self.support.sign_failed(&data));
        }

        let fee: i64 = data.get_or_empty("total_fee").parse().unwrap_or_default();
        let amount = Amount::from_fen(fee)?;
        let is_paid = data.get("return_code") == Some(SUCCESS) && data.get("result_code") == Some(SUCCESS);
        let order_id = data.require("out_trade_no")?.to_string();
        let trade_no = data.get_or_empty("transaction_id").to_string();
        let pay_time = parse_provider_time(data.get("time_end"));

        Ok(PurchaseResult::new(
            "wechat", order_id, trade_no, amount, is_paid, pay_time, data,
        ))
    }

    fn success(&self) -> PayResponse {
        PayResponse::Xml(to_xml(
            &Params::new()
                .with("return_code", SUCCESS)
                .with("return_msg", "OK"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use paygate_types::Charge;

    fn config() -> GatewayConfig {
        GatewayConfig {
            app_id: "wx-mp".into(),
            appid: "wx-app".into(),
            mch_id: "1900000109".into(),
            app_key: "wechat-key".into(),
            notify_url: "http://shop.example/notify/wechat".into(),
            ..Default::default()
        }
    }

    fn gateway(config: GatewayConfig) -> (Wechat, Arc<MockTransport>) {
        let http = MockTransport::new();
        (Wechat::new(config, http.clone()), http)
    }

    fn sign_md5(params: &Params) -> String {
        md5_upper(&sorted_query_with_key(&params.filtered(), "wechat-key"))
    }

    /// A provider answer with a valid MD5 sign.
    fn answer(fields: &[(&str, &str)]) -> String {
        let mut params: Params = fields.iter().copied().collect();
        let sign = sign_md5(&params);
        params.insert("sign", sign);
        to_xml(&params)
    }

    fn sent_xml(http: &MockTransport) -> Params {
        let RequestBody::Raw { body, .. } = http.last_request().body else {
            panic!("expected xml body");
        };
        from_xml(&body).unwrap()
    }

    #[tokio::test]
    async fn test_app_pay_returns_signed_client_request() {
        let (wechat, http) = gateway(config());
        http.push_text(answer(&[
            ("return_code", "SUCCESS"),
            ("result_code", "SUCCESS"),
            ("prepay_id", "wx201410272009395522657a690389285100"),
        ]));

        let charge = Charge::new("WX-1", Amount::from_fen(101).unwrap()).with_subject("Coins");
        let PayResponse::Json(request) = wechat.pay(PayMethod::App, &charge).await.unwrap() else {
            panic!("expected json");
        };
        assert_eq!(request["appid"], "wx-app");
        assert_eq!(request["partnerid"], "1900000109");
        assert_eq!(request["package"], "Sign=WXPay");

        let client = Params::from_json_object(&request);
        assert_eq!(client.get("sign"), Some(sign_md5(&client.without(&["sign"])).as_str()));

        let sent = sent_xml(&http);
        assert_eq!(http.last_request().url, "https://api.mch.weixin.qq.com/pay/unifiedorder");
        assert_eq!(sent.get("trade_type"), Some("APP"));
        assert_eq!(sent.get("total_fee"), Some("101"));
        assert_eq!(sent.get("sign"), Some(sign_md5(&sent.without(&["sign"])).as_str()));
    }

    #[tokio::test]
    async fn test_scan_pay_in_service_mode() {
        let mut config = config();
        config.mode = Mode::Service;
        config.sub_mch_id = "1900000110".into();
        config.sub_appid = "wx-sub".into();
        let (wechat, http) = gateway(config);
        http.push_text(answer(&[
            ("return_code", "SUCCESS"),
            ("result_code", "SUCCESS"),
            ("code_url", "weixin://wxpay/bizpayurl?pr=abc"),
        ]));

        let charge = Charge::new("WX-2", Amount::from_fen(500).unwrap()).with_subject("Tea");
        let PayResponse::Json(resp) = wechat.pay(PayMethod::Scan, &charge).await.unwrap() else {
            panic!("expected json");
        };
        assert_eq!(resp["code_url"], "weixin://wxpay/bizpayurl?pr=abc");

        let sent = sent_xml(&http);
        assert_eq!(sent.get("sub_mch_id"), Some("1900000110"));
        assert_eq!(sent.get("trade_type"), Some("NATIVE"));
    }

    #[tokio::test]
    async fn test_hmac_sign_type() {
        let mut config = config();
        config.sign_type = HMAC_SHA256.into();
        let (wechat, http) = gateway(config);
        http.push_text("<xml><return_code>FAIL</return_code><return_msg>签名错误</return_msg></xml>");

        let charge = Charge::new("WX-3", Amount::from_fen(1).unwrap());
        let err = wechat.pay(PayMethod::Wap, &charge).await.unwrap_err();
        assert_eq!(err.to_string(), "GATEWAY_ERROR: Get Wechat API Error:签名错误");

        let sent = sent_xml(&http);
        assert_eq!(sent.get("sign_type"), Some(HMAC_SHA256));
        let plain = sorted_query_with_key(&sent.without(&["sign"]), "wechat-key");
        assert_eq!(sent.get("sign"), Some(hmac_sha256_upper(&plain, "wechat-key").as_str()));
    }

    #[tokio::test]
    async fn test_result_code_fail() {
        let (wechat, http) = gateway(config());
        http.push_text(answer(&[
            ("return_code", "SUCCESS"),
            ("result_code", "FAIL"),
            ("err_code", "ORDERPAID"),
            ("err_code_des", "该订单已支付"),
        ]));

        let charge = Charge::new("WX-4", Amount::from_fen(1).unwrap());
        let err = wechat.pay(PayMethod::Scan, &charge).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "GATEWAY_ERROR: Get Wechat API Error:ORDERPAID-该订单已支付"
        );
    }

    #[tokio::test]
    async fn test_unsigned_success_reply_is_rejected() {
        let (wechat, http) = gateway(config());
        http.push_text(
            "<xml><return_code>SUCCESS</return_code><result_code>SUCCESS</result_code>\
             <trade_state>SUCCESS</trade_state><out_trade_no>WX-1</out_trade_no></xml>",
        );

        let result = wechat.find("WX-1", QueryKind::Pay).await;
        assert!(matches!(result, Err(PayError::InvalidSign { .. })));
    }

    #[tokio::test]
    async fn test_verify_notification() {
        let (wechat, _) = gateway(config());
        let mut data = Params::new()
            .with("return_code", "SUCCESS")
            .with("result_code", "SUCCESS")
            .with("out_trade_no", "WX-1")
            .with("transaction_id", "4200000001")
            .with("total_fee", "101")
            .with("time_end", "20240201120000");
        let sign = sign_md5(&data);
        data.insert("sign", sign);

        let result = wechat.verify(data).await.unwrap();
        assert!(result.is_paid());
        assert_eq!(result.amount().fen(), 101);
        assert_eq!(
            result.pay_time().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-02-01 12:00:00"
        );
    }

    #[tokio::test]
    async fn test_transfer_is_unsupported() {
        let (wechat, _) = gateway(config());
        let payout = paygate_types::Payout::new("P", Amount::from_fen(1).unwrap(), "n", "a");
        assert!(matches!(
            wechat.transfer(&payout).await,
            Err(PayError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_success_ack_xml() {
        let (wechat, _) = gateway(config());
        assert_eq!(
            wechat.success().body(),
            "<xml><return_code><![CDATA[SUCCESS]]></return_code><return_msg><![CDATA[OK]]></return_msg></xml>"
        );
    }
}
