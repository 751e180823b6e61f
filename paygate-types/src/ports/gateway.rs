//! Gateway application port.
//!
//! One implementation per provider. Operations a provider does not offer keep
//! the default body and fail with `PayError::Unsupported`.

use crate::domain::{Params, PurchaseResult, TransferOutcome};
use crate::dto::{ApiResponse, PayMethod, PayResponse, QueryKind};
use crate::error::PayError;

use super::{Payable, Transferable};

#[async_trait::async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// Lower-case provider name (`jiupay`, `alipay`, ...).
    fn name(&self) -> &'static str;

    /// Payment methods `pay` accepts.
    fn methods(&self) -> &'static [PayMethod] {
        &[]
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts a payment with the given method sub-gateway.
    async fn pay(&self, method: PayMethod, charge: &dyn Payable) -> Result<PayResponse, PayError> {
        let _ = charge;
        Err(PayError::InvalidGateway(format!(
            "Pay Gateway [{}] not exists",
            method
        )))
    }

    /// Disburses funds to the payee.
    async fn transfer(&self, payout: &dyn Transferable) -> Result<TransferOutcome, PayError> {
        let _ = payout;
        Err(PayError::unsupported(self.name(), "transfer"))
    }

    /// Queries an order at the provider.
    async fn find(&self, order: &str, kind: QueryKind) -> Result<ApiResponse, PayError>;

    /// Remaining disbursement balance.
    async fn balance(&self) -> Result<ApiResponse, PayError> {
        Err(PayError::unsupported(self.name(), "balance"))
    }

    async fn refund(&self, order: &Params) -> Result<ApiResponse, PayError> {
        let _ = order;
        Err(PayError::unsupported(self.name(), "refund"))
    }

    async fn cancel(&self, order: &str) -> Result<ApiResponse, PayError> {
        let _ = order;
        Err(PayError::unsupported(self.name(), "cancel"))
    }

    async fn close(&self, order: &str) -> Result<ApiResponse, PayError> {
        let _ = order;
        Err(PayError::unsupported(self.name(), "close"))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────────

    /// Verifies an asynchronous notification and normalizes it.
    ///
    /// Returns `PayError::InvalidSign` unless the provider's signature checks out.
    async fn verify(&self, data: Params) -> Result<PurchaseResult, PayError>;

    /// Acknowledgement body the provider expects after a notification.
    fn success(&self) -> PayResponse;
}
