//! Configuration loading from environment.

use std::env;

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    /// JSON file with the per-provider gateway settings.
    pub gateway_config: String,
    pub order_service_url: String,
    pub order_service_secret: String,
    /// Traces are exported only when this is set.
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let gateway_config =
            env::var("PAYGATE_CONFIG").unwrap_or_else(|_| "paygate.json".to_string());

        let order_service_url = env::var("ORDER_SERVICE_URL")
            .map_err(|_| anyhow::anyhow!("ORDER_SERVICE_URL environment variable is required"))?;

        let order_service_secret = env::var("ORDER_SERVICE_SECRET").map_err(|_| {
            anyhow::anyhow!("ORDER_SERVICE_SECRET environment variable is required")
        })?;

        let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            port,
            gateway_config,
            order_service_url,
            order_service_secret,
            otlp_endpoint,
        })
    }
}
