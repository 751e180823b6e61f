//! # Paygate Types
//!
//! Domain types and port traits for the payment gateway adapters.
//! This crate has ZERO external IO dependencies - only data structures,
//! contracts, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Amounts, parameters, entities and normalized results
//! - `ports/` - Traits that gateways, transports and order stores implement
//! - `dto/` - Method selectors and response shapes
//! - `config/` - Per-provider configuration
//! - `error/` - Gateway, store and application error types

pub mod config;
pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use config::{GatewayConfig, HttpOptions, Mode, PayConfig};
pub use domain::{
    Amount, Charge, Params, Payout, PurchaseResult, TransferOutcome, TransferResult,
    json_scalar_to_string, now, parse_provider_time,
};
pub use dto::*;
pub use error::{AppError, PayError, StoreError};
pub use ports::{
    Gateway, HttpMethod, HttpRequest, HttpResponse, HttpTransport, Payable, PayableStore,
    RequestBody, Transferable,
};
