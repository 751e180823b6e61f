//! # Paygate Hex
//!
//! Application layer and HTTP adapter for the payment gateways.
//!
//! ## Architecture
//!
//! - `facade` - `Pay`, resolves provider names to configured gateways
//! - `service` - `PayService`, orchestrates gateways and the order store
//! - `inbound` - HTTP adapter (Axum server) receiving provider notifications
//!
//! The service is generic over `S: PayableStore`, so the order store is
//! injected at compile time.

pub mod facade;
pub mod inbound;
pub mod service;


pub use facade::Pay;
pub use service::PayService;
