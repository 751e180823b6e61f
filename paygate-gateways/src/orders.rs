//! `PayableStore` adapter for the merchant's order service.
//!
//! Orders are read with `GET {base}/orders/{trade_no}`. Completions are
//! posted to `{base}/orders/{trade_no}/complete` as the JSON `PurchaseResult`,
//! signed with HMAC-SHA256 in the `X-Paygate-Signature` header.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, instrument};

use paygate_types::{Charge, PayableStore, PurchaseResult, StoreError};

use crate::security::sign_payload;

pub const SIGNATURE_HEADER: &str = "X-Paygate-Signature";

pub struct HttpOrderStore {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpOrderStore {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    fn order_url(&self, trade_no: &str) -> String {
        format!("{}/orders/{}", self.base_url, trade_no)
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl PayableStore for HttpOrderStore {
    #[instrument(skip(self))]
    async fn retrieve_by_trade_no(&self, trade_no: &str) -> Result<Option<Charge>, StoreError> {
        let resp = self
            .client
            .get(self.order_url(trade_no))
            .send()
            .await
            .map_err(backend)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(backend(format!("HTTP {}", resp.status())));
        }

        resp.json::<Charge>().await.map(Some).map_err(backend)
    }

    #[instrument(skip(self, charge, result), fields(trade_no = %charge.trade_no))]
    async fn on_complete(
        &self,
        charge: &Charge,
        result: &PurchaseResult,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(result).map_err(backend)?;
        let signature = sign_payload(&payload, &self.secret);

        let resp = self
            .client
            .post(format!("{}/complete", self.order_url(&charge.trade_no)))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(payload)
            .send()
            .await
            .map_err(backend)?;

        match resp.status() {
            s if s.is_success() => {
                info!("Order marked complete");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(charge.trade_no.clone())),
            s => Err(backend(format!("HTTP {}", s))),
        }
    }
}
