//! Order store port.
//!
//! Backs the `Payable` lookups a notification handler needs: find the order a
//! provider is talking about, then mark it complete.

use crate::domain::{Charge, PurchaseResult};
use crate::error::StoreError;

#[async_trait::async_trait]
pub trait PayableStore: Send + Sync + 'static {
    /// Looks up the merchant order by its trade number.
    async fn retrieve_by_trade_no(&self, trade_no: &str) -> Result<Option<Charge>, StoreError>;

    /// Records a verified, paid result against the order.
    async fn on_complete(&self, charge: &Charge, result: &PurchaseResult)
    -> Result<(), StoreError>;
}
