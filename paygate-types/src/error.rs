//! Error types for the payment gateway adapters.

use serde_json::Value;

/// Gateway-level errors (provider protocol failures and misuse).
#[derive(Debug, thiserror::Error)]
pub enum PayError {
    #[error("INVALID_GATEWAY: {0}")]
    InvalidGateway(String),

    #[error("INVALID_SIGN: {gateway} sign verification failed")]
    InvalidSign { gateway: String, raw: Value },

    #[error("GATEWAY_ERROR: {message}")]
    Gateway { message: String, raw: Value },

    #[error("INVALID_CONFIG: {0}")]
    InvalidConfig(String),

    #[error("INVALID_ARGUMENT: {0}")]
    InvalidArgument(String),

    #[error("CRYPTO_ERROR: {0}")]
    Crypto(String),

    #[error("TRANSPORT_ERROR: {0}")]
    Transport(String),

    #[error("UNSUPPORTED: {gateway} does not support {operation}")]
    Unsupported {
        gateway: String,
        operation: &'static str,
    },
}

impl PayError {
    /// Provider error carrying the response that caused it.
    pub fn gateway(message: impl Into<String>, raw: impl Into<Value>) -> Self {
        PayError::Gateway {
            message: message.into(),
            raw: raw.into(),
        }
    }

    pub fn invalid_sign(gateway: impl Into<String>, raw: impl Into<Value>) -> Self {
        PayError::InvalidSign {
            gateway: gateway.into(),
            raw: raw.into(),
        }
    }

    pub fn unsupported(gateway: impl Into<String>, operation: &'static str) -> Self {
        PayError::Unsupported {
            gateway: gateway.into(),
            operation,
        }
    }

    /// Raw provider payload attached to the error, if any.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            PayError::InvalidSign { raw, .. } | PayError::Gateway { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Order store errors (the merchant's persistence behind `Payable`).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid signature: {0}")]
    Unauthorized(String),

    #[error("Upstream gateway error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PayError> for AppError {
    fn from(err: PayError) -> Self {
        match err {
            PayError::InvalidGateway(msg) => AppError::NotFound(msg),
            PayError::InvalidSign { gateway, .. } => {
                AppError::Unauthorized(format!("{} notification rejected", gateway))
            }
            PayError::InvalidArgument(msg) => AppError::BadRequest(msg),
            e @ PayError::Unsupported { .. } => AppError::BadRequest(e.to_string()),
            PayError::Gateway { message, .. } => AppError::Upstream(message),
            PayError::Transport(msg) => AppError::Upstream(msg),
            PayError::InvalidConfig(msg) => AppError::Internal(msg),
            PayError::Crypto(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(trade_no) => AppError::NotFound(format!("Order {}", trade_no)),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}
