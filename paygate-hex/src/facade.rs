//! Gateway facade.
//!
//! Resolves a provider name to its adapter, built from the provider's entry
//! in `PayConfig` on first use and cached afterwards.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use paygate_gateways::{GATEWAY_NAMES, ReqwestTransport, build_gateway};
use paygate_types::{Gateway, HttpTransport, PayConfig, PayError};

pub struct Pay {
    config: PayConfig,
    /// Shared transport; when unset each gateway gets a reqwest client with
    /// its own timeouts.
    transport: Option<Arc<dyn HttpTransport>>,
    gateways: DashMap<String, Arc<dyn Gateway>>,
}

impl Pay {
    pub fn new(config: PayConfig) -> Self {
        Self {
            config,
            transport: None,
            gateways: DashMap::new(),
        }
    }

    /// Routes every gateway through the given transport.
    pub fn with_transport(config: PayConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport: Some(transport),
            gateways: DashMap::new(),
        }
    }

    /// Returns the configured gateway for `name` (case-insensitive).
    pub fn gateway(&self, name: &str) -> Result<Arc<dyn Gateway>, PayError> {
        let key = name.trim().to_ascii_lowercase();
        if let Some(gateway) = self.gateways.get(&key) {
            return Ok(gateway.clone());
        }
        if !GATEWAY_NAMES.contains(&key.as_str()) {
            return Err(PayError::InvalidGateway(format!(
                "Gateway [{}] Not Exists",
                name
            )));
        }

        let config = self
            .config
            .gateway(&key)
            .cloned()
            .ok_or_else(|| PayError::InvalidConfig(format!("Missing {} Config", key)))?;
        let transport: Arc<dyn HttpTransport> = match &self.transport {
            Some(shared) => shared.clone(),
            None => Arc::new(ReqwestTransport::new(&config.http)?),
        };

        debug!(gateway = %key, mode = %config.mode, "Building gateway");
        let gateway = build_gateway(&key, config, transport)?;
        Ok(self.gateways.entry(key).or_insert(gateway).clone())
    }

    pub fn alipay(&self) -> Result<Arc<dyn Gateway>, PayError> {
        self.gateway("alipay")
    }

    pub fn wechat(&self) -> Result<Arc<dyn Gateway>, PayError> {
        self.gateway("wechat")
    }

    /// Configured provider names that have an adapter.
    pub fn names(&self) -> Vec<&str> {
        self.config
            .gateways
            .keys()
            .map(String::as_str)
            .filter(|name| GATEWAY_NAMES.contains(name))
            .collect()
    }
}
