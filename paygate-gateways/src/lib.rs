//! # Paygate Gateways
//!
//! Adapters for the payment providers plus the plumbing they share:
//!
//! - **providers**: one `Gateway` implementation per provider
//! - **registry**: builds an adapter from a provider name
//! - **security** / **crypto**: digest signing and RSA helpers
//! - **transport**: the reqwest `HttpTransport`
//! - **orders**: HTTP `PayableStore` for the merchant's order service

pub mod bank;
pub mod crypto;
pub mod form;
pub mod orders;
pub mod providers;
pub mod registry;
pub mod security;
pub mod support;
pub mod transport;
pub mod xml;

#[cfg(test)]
mod mock;

pub use orders::{HttpOrderStore, SIGNATURE_HEADER};
pub use registry::{GATEWAY_NAMES, build_gateway};
pub use transport::ReqwestTransport;
