//! services/reader/src/flow/mod.rs
//!
//! The chapter access control flow: session store, balance client,
//! unlock-status checker, unlock initiator and the access gate that composes
//! them, plus the coin shop that feeds the balance.

pub mod background;
pub mod balance;
pub mod events;
pub mod gate;
pub mod session_store;
pub mod shop;
pub mod state;
pub mod unlock;
pub mod unlock_status;

pub use background::BackgroundTasks;
pub use balance::BalanceClient;
pub use events::{BalanceEvent, BalanceEvents};
pub use gate::{ChapterGate, GateState};
pub use session_store::SessionStore;
pub use shop::CoinShop;
pub use state::ClientState;
pub use unlock::{UnlockInitiator, UnlockReceipt};
pub use unlock_status::UnlockStatusChecker;

use novel_reader_core::ports::{PortError, PortResult};
use std::future::Future;
use std::time::Duration;

/// Bounds a port call by `limit`; an elapsed deadline becomes `PortError::Timeout`.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> PortResult<T>
where
    F: Future<Output = PortResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| PortError::Timeout)?
}
