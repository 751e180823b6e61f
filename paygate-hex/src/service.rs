//! Pay Application Service
//!
//! Orchestrates gateways and the order store port.
//! Contains NO provider protocol logic - that lives in the adapters.

use paygate_types::{
    ApiResponse, AppError, Params, PayError, PayMethod, PayResponse, Payable, PayableStore,
    QueryKind, TransferOutcome, Transferable,
};
use tracing::{info, instrument, warn};

use crate::Pay;

/// Application service for payment operations.
///
/// Generic over `S: PayableStore` - the order store is injected at compile time.
pub struct PayService<S: PayableStore> {
    pay: Pay,
    store: S,
}

impl<S: PayableStore> PayService<S> {
    pub fn new(pay: Pay, store: S) -> Self {
        Self { pay, store }
    }

    pub fn pay(&self) -> &Pay {
        &self.pay
    }

    /// Returns a reference to the underlying order store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts a payment for the order.
    #[instrument(skip(self, payable), fields(trade_no = %payable.trade_no()))]
    pub async fn purchase(
        &self,
        gateway: &str,
        method: PayMethod,
        payable: &dyn Payable,
    ) -> Result<PayResponse, AppError> {
        if payable.trade_no().trim().is_empty() {
            return Err(AppError::BadRequest("Trade number cannot be empty".into()));
        }
        if payable.amount().is_zero() {
            return Err(AppError::BadRequest("Amount must be positive".into()));
        }
        if payable.is_complete() {
            return Err(AppError::BadRequest(format!(
                "Order {} is already complete",
                payable.trade_no()
            )));
        }

        let gateway = self.pay.gateway(gateway)?;
        gateway.pay(method, payable).await.map_err(Into::into)
    }

    /// Disburses a payout.
    #[instrument(skip(self, payout), fields(transfer_no = %payout.transfer_no()))]
    pub async fn transfer(
        &self,
        gateway: &str,
        payout: &dyn Transferable,
    ) -> Result<TransferOutcome, AppError> {
        if payout.amount().is_zero() {
            return Err(AppError::BadRequest("Amount must be positive".into()));
        }
        if payout.account().trim().is_empty() {
            return Err(AppError::BadRequest("Payee account cannot be empty".into()));
        }

        let gateway = self.pay.gateway(gateway)?;
        gateway.transfer(payout).await.map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn find(
        &self,
        gateway: &str,
        order: &str,
        kind: QueryKind,
    ) -> Result<ApiResponse, AppError> {
        let gateway = self.pay.gateway(gateway)?;
        gateway.find(order, kind).await.map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn balance(&self, gateway: &str) -> Result<ApiResponse, AppError> {
        let gateway = self.pay.gateway(gateway)?;
        gateway.balance().await.map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────────

    /// Verifies a provider notification and completes the order it names.
    ///
    /// Returns the acknowledgement the provider expects. A paid order is
    /// completed at most once; repeated notifications are acknowledged
    /// without touching the store again.
    #[instrument(skip(self, data))]
    pub async fn handle_notification(
        &self,
        gateway: &str,
        data: Params,
    ) -> Result<PayResponse, AppError> {
        let gateway = self.pay.gateway(gateway)?;
        let result = gateway.verify(data).await.map_err(|e| {
            if let PayError::InvalidSign { raw, .. } = &e {
                warn!(gateway = gateway.name(), raw = %raw, "Notification sign rejected");
            }
            e
        })?;

        let charge = self
            .store
            .retrieve_by_trade_no(result.order_id())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {}", result.order_id())))?;

        if !result.amount().is_zero() && result.amount() != charge.amount {
            warn!(
                order_id = result.order_id(),
                expected = charge.amount.fen(),
                notified = result.amount().fen(),
                "Notified amount differs from order"
            );
            return Err(AppError::BadRequest(format!(
                "Amount mismatch for order {}: expected {}, notified {}",
                result.order_id(),
                charge.amount.to_yuan(),
                result.amount().to_yuan()
            )));
        }

        if !result.is_paid() {
            info!(order_id = result.order_id(), "Notification reports unpaid order");
        } else if charge.complete {
            info!(order_id = result.order_id(), "Order already complete");
        } else {
            self.store.on_complete(&charge, &result).await?;
            info!(
                order_id = result.order_id(),
                trade_no = result.trade_no(),
                "Order completed"
            );
        }

        Ok(gateway.success())
    }
}
