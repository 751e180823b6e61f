//! Domain models for the payment gateway adapters.

pub mod amount;
pub mod entity;
pub mod params;
pub mod result;

pub use amount::Amount;
pub use entity::{Charge, Payout};
pub use params::{Params, json_scalar_to_string};
pub use result::{PurchaseResult, TransferOutcome, TransferResult, now, parse_provider_time};
