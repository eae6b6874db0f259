//! services/reader/src/flow/balance.rs
//!
//! Fetches the coin balance from the backend. The only local state is the
//! balance last shown to the reader, which every mutating action reconciles.

use crate::error::AccessError;
use crate::flow::bounded;
use crate::flow::events::{BalanceEvent, BalanceEvents};
use novel_reader_core::domain::Session;
use novel_reader_core::ports::CoinLedger;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct BalanceClient {
    ledger: Arc<dyn CoinLedger>,
    events: BalanceEvents,
    timeout: Duration,
    displayed: Mutex<Option<u64>>,
}

impl BalanceClient {
    pub fn new(ledger: Arc<dyn CoinLedger>, events: BalanceEvents, timeout: Duration) -> Self {
        Self {
            ledger,
            events,
            timeout,
            displayed: Mutex::new(None),
        }
    }

    /// Returns the backend's authoritative balance.
    pub async fn fetch_balance(&self, session: &Session) -> Result<u64, AccessError> {
        if session.bearer().is_none() {
            return Err(AccessError::Auth);
        }
        let balance = bounded(self.timeout, self.ledger.get_balance(session)).await?;
        *self.displayed.lock() = Some(balance.coins);
        Ok(balance.coins)
    }

    /// Fetches the balance and announces it to every subscriber.
    pub async fn reconcile(&self, session: &Session) -> Result<u64, AccessError> {
        let coins = self.fetch_balance(session).await?;
        info!("Balance for user {} reconciled at {}", session.user_id, coins);
        self.events.publish(BalanceEvent::BalanceChanged { coins });
        Ok(coins)
    }

    /// The balance currently shown, if one has been fetched.
    pub fn displayed(&self) -> Option<u64> {
        *self.displayed.lock()
    }

    /// Adjusts the shown balance right after a known mutation. Must be
    /// followed by [`BalanceClient::reconcile`].
    pub fn apply_optimistic(&self, delta: i64) -> Option<u64> {
        let mut displayed = self.displayed.lock();
        *displayed = displayed.map(|coins| coins.saturating_add_signed(delta));
        *displayed
    }
}
