//! services/reader/src/flow/events.rs
//!
//! The balance event channel. Components that display the coin balance
//! subscribe here instead of being poked through a shared global.

use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceEvent {
    /// The backend reported a new balance after a mutating action.
    BalanceChanged { coins: u64 },
    /// The session ended; displayed balances should be dropped.
    SessionCleared,
}

/// A publish/subscribe channel scoped to one client session.
#[derive(Clone, Debug)]
pub struct BalanceEvents {
    sender: broadcast::Sender<BalanceEvent>,
}

impl BalanceEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BalanceEvent> {
        self.sender.subscribe()
    }

    /// Publishes to current subscribers. Having none is not an error.
    pub fn publish(&self, event: BalanceEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "Balance event published"),
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "Balance event dropped, no subscribers")
            }
        }
    }
}
