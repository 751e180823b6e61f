//! Per-gateway configuration.
//!
//! Field names follow the keys merchants already keep for these providers.
//! Anything provider-specific that has no named field lands in `extra`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PayError;

/// Endpoint selector.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Normal,
    Dev,
    Query,
    Transfer,
    TransferQuery,
    TransferQueryBalance,
    Service,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Dev => "dev",
            Mode::Query => "query",
            Mode::Transfer => "transfer",
            Mode::TransferQuery => "transfer_query",
            Mode::TransferQueryBalance => "transfer_query_balance",
            Mode::Service => "service",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            connect_timeout_secs: 3,
        }
    }
}

/// Credentials and endpoints for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Merchant / member id at the provider.
    pub app_id: String,
    /// Shared MD5 key.
    pub app_key: String,
    pub mch_id: String,
    pub pay_type: String,
    pub notify_url: String,
    pub return_url: String,
    /// Provider public key, bare base64 body.
    pub public_key: String,
    /// Merchant private key, bare base64 body.
    pub private_key: String,
    pub token: String,
    pub iv: String,
    /// Wechat app id.
    pub appid: String,
    pub sub_appid: String,
    pub sub_mch_id: String,
    pub sign_type: String,
    pub mode: Mode,
    /// Replaces the built-in URL for a mode.
    pub endpoints: BTreeMap<Mode, String>,
    pub http: HttpOptions,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GatewayConfig {
    /// Reads a config value by key, named fields first.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "app_id" => self.app_id.as_str(),
            "app_key" => self.app_key.as_str(),
            "mch_id" => self.mch_id.as_str(),
            "pay_type" => self.pay_type.as_str(),
            "notify_url" => self.notify_url.as_str(),
            "return_url" => self.return_url.as_str(),
            "public_key" => self.public_key.as_str(),
            "private_key" => self.private_key.as_str(),
            "token" => self.token.as_str(),
            "iv" => self.iv.as_str(),
            "appid" => self.appid.as_str(),
            "sub_appid" => self.sub_appid.as_str(),
            "sub_mch_id" => self.sub_mch_id.as_str(),
            "sign_type" => self.sign_type.as_str(),
            other => match self.extra.get(other) {
                Some(Value::String(s)) => s.as_str(),
                _ => "",
            },
        };
        (!value.is_empty()).then_some(value)
    }

    /// Like `get`, failing with the provider name and key when absent.
    pub fn require(&self, gateway: &str, key: &str) -> Result<&str, PayError> {
        self.get(key).ok_or_else(|| {
            PayError::InvalidConfig(format!("Missing {} Config -- [{}]", gateway, key))
        })
    }
}

/// All configured providers, keyed by provider name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayConfig {
    #[serde(default)]
    pub gateways: BTreeMap<String, GatewayConfig>,
}

impl PayConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, PayError> {
        serde_json::from_str(raw).map_err(|e| PayError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PayError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PayError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn gateway(&self, name: &str) -> Option<&GatewayConfig> {
        self.gateways.get(name)
    }
}
