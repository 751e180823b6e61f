//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server receiving provider notifications.

mod handlers;
mod server;

pub use handlers::parse_notification;
pub use server::HttpServer;
