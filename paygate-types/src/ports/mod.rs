//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The service layer depends on these traits, not concrete implementations.

mod contracts;
mod gateway;
mod store;
mod transport;

pub use contracts::{Payable, Transferable};
pub use gateway::Gateway;
pub use store::PayableStore;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody};
