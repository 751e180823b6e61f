//! Contracts the caller's domain objects satisfy to be charged or paid out.

use chrono::NaiveDateTime;

use crate::domain::Amount;

/// Something a customer can pay for.
pub trait Payable: Send + Sync {
    /// Merchant order number sent to the provider.
    fn trade_no(&self) -> &str;

    fn amount(&self) -> Amount;

    fn user(&self) -> &str;

    fn subject(&self) -> &str;

    fn body(&self) -> &str;

    /// Provider-specific hint (`method`, `orderdate`, `client_ip`, ...).
    fn extra(&self, name: &str) -> Option<&str>;

    fn expire(&self) -> Option<NaiveDateTime>;

    fn is_complete(&self) -> bool;

    fn client_ip(&self) -> &str {
        self.extra("client_ip").unwrap_or("127.0.0.1")
    }
}

/// Something the merchant pays out.
pub trait Transferable: Send + Sync {
    fn transfer_no(&self) -> &str;

    fn extra(&self, name: &str) -> Option<&str>;

    fn amount(&self) -> Amount;

    fn real_name(&self) -> &str;

    fn account(&self) -> &str;

    fn channel(&self) -> &str;

    fn remark(&self) -> &str;
}
