//! services/reader/src/flow/shop.rs
//!
//! The coin shop: package listing, payment creation and the gateway
//! callback that credits coins. A confirmed payment triggers a balance
//! reconcile so every balance display refreshes.

use crate::error::AccessError;
use crate::flow::balance::BalanceClient;
use crate::flow::bounded;
use novel_reader_core::domain::{CoinPackage, PaymentCallback, PaymentOutcome, PaymentRequest, Session};
use novel_reader_core::ports::PaymentService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct CoinShop {
    payments: Arc<dyn PaymentService>,
    balance: Arc<BalanceClient>,
    timeout: Duration,
}

impl CoinShop {
    pub fn new(payments: Arc<dyn PaymentService>, balance: Arc<BalanceClient>, timeout: Duration) -> Self {
        Self {
            payments,
            balance,
            timeout,
        }
    }

    /// Active packages, in the order the backend lists them.
    pub async fn list_packages(&self) -> Result<Vec<CoinPackage>, AccessError> {
        let packages = bounded(self.timeout, self.payments.list_packages()).await?;
        Ok(packages.into_iter().filter(|p| p.is_active).collect())
    }

    /// Creates a payment and returns the gateway URL the reader is sent to.
    pub async fn start_purchase(
        &self,
        session: Option<&Session>,
        request: &PaymentRequest,
    ) -> Result<String, AccessError> {
        let session = session
            .filter(|s| s.bearer().is_some())
            .ok_or(AccessError::Auth)?;
        request.validate().map_err(AccessError::Invalid)?;

        let url = bounded(self.timeout, self.payments.create_payment(session, request)).await?;
        info!("Payment created for user {}, redirecting to gateway", session.user_id);
        Ok(url)
    }

    /// Reports the gateway's return parameters to the backend.
    pub async fn complete_purchase(
        &self,
        session: Option<&Session>,
        callback: &PaymentCallback,
    ) -> Result<PaymentOutcome, AccessError> {
        if !callback.is_complete() {
            return Err(AccessError::Invalid(
                "payment callback is missing its response code or transaction reference".to_string(),
            ));
        }
        let session = session
            .filter(|s| s.bearer().is_some())
            .ok_or(AccessError::Auth)?;

        let outcome = bounded(self.timeout, self.payments.confirm_payment(callback)).await?;
        if outcome.success {
            info!("Payment confirmed: {} coins credited", outcome.coins);
            if let Err(e) = self.balance.reconcile(session).await {
                warn!("Balance refresh after payment failed: {}", e);
            }
        } else {
            warn!("Payment not confirmed: {}", outcome.message);
        }
        Ok(outcome)
    }
}
