//! services/reader/src/flow/unlock.rs
//!
//! Submits chapter unlocks and interprets the backend's answer. Price and
//! balance checks are enforced server-side; the client only sends the
//! chapter id.

use crate::error::UnlockError;
use crate::flow::balance::BalanceClient;
use crate::flow::bounded;
use crate::flow::unlock_status::UnlockStatusChecker;
use novel_reader_core::domain::{ChapterId, Session, UnlockAttempt};
use novel_reader_core::ports::UnlockService;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A successful unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockReceipt {
    pub chapter_id: ChapterId,
    /// The balance fetched after the unlock settled, when it could be fetched.
    pub new_balance: Option<u64>,
    /// The reader already owned the chapter; nothing was charged.
    pub already_owned: bool,
}

pub struct UnlockInitiator {
    unlocks: Arc<dyn UnlockService>,
    status: Arc<UnlockStatusChecker>,
    balance: Arc<BalanceClient>,
    in_flight: Arc<Mutex<HashSet<ChapterId>>>,
    timeout: Duration,
}

/// Marks a chapter as having an unlock in flight until dropped.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<ChapterId>>>,
    chapter_id: ChapterId,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<ChapterId>>>, chapter_id: ChapterId) -> Option<Self> {
        set.lock().insert(chapter_id).then(|| Self {
            set: set.clone(),
            chapter_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.chapter_id);
    }
}

impl UnlockInitiator {
    pub fn new(
        unlocks: Arc<dyn UnlockService>,
        status: Arc<UnlockStatusChecker>,
        balance: Arc<BalanceClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            unlocks,
            status,
            balance,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            timeout,
        }
    }

    /// Unlocks a chapter for the session's user.
    ///
    /// `InsufficientFunds` is returned as-is and never retried; the caller
    /// offers the coin shop. A backend report of "already unlocked" is a success.
    pub async fn unlock(
        &self,
        session: Option<&Session>,
        chapter_id: ChapterId,
    ) -> Result<UnlockReceipt, UnlockError> {
        self.unlock_priced(session, chapter_id, None).await
    }

    /// [`UnlockInitiator::unlock`] for a caller that knows the displayed
    /// price. A granted unlock debits it from the shown balance until the
    /// reconcile lands.
    pub async fn unlock_priced(
        &self,
        session: Option<&Session>,
        chapter_id: ChapterId,
        price: Option<u32>,
    ) -> Result<UnlockReceipt, UnlockError> {
        let session = session
            .filter(|s| s.bearer().is_some())
            .ok_or(UnlockError::Auth)?;
        let _guard =
            InFlightGuard::acquire(&self.in_flight, chapter_id).ok_or(UnlockError::InFlight)?;

        // Fresh ownership check so a repeated unlock never reaches the payment path.
        if self.status.is_unlocked(Some(session), chapter_id).await {
            info!("Chapter {} already unlocked for user {}", chapter_id, session.user_id);
            let new_balance = match self.balance.fetch_balance(session).await {
                Ok(coins) => Some(coins),
                Err(e) => {
                    warn!("Balance fetch for owned chapter {} failed: {}", chapter_id, e);
                    None
                }
            };
            return Ok(UnlockReceipt {
                chapter_id,
                new_balance,
                already_owned: true,
            });
        }

        let attempt = bounded(self.timeout, self.unlocks.submit_unlock(session, chapter_id)).await;
        let outcome = match attempt {
            Ok(UnlockAttempt::Granted { .. }) => {
                if let Some(price) = price {
                    self.balance.apply_optimistic(-i64::from(price));
                }
                Ok(false)
            }
            Ok(UnlockAttempt::Declined { message, reason }) => {
                match UnlockError::classify(&message, reason.as_deref()) {
                    Some(UnlockError::AlreadyUnlocked) => Ok(true),
                    Some(err) => Err(err),
                    None => Err(UnlockError::Rejected(message)),
                }
            }
            Err(e) => match UnlockError::from(e) {
                UnlockError::AlreadyUnlocked => Ok(true),
                err => Err(err),
            },
        };

        // The refresh is issued only after the unlock response has arrived.
        let responded = !matches!(outcome, Err(UnlockError::Network(_) | UnlockError::Auth));
        let new_balance = if responded {
            match self.balance.reconcile(session).await {
                Ok(coins) => Some(coins),
                Err(e) => {
                    warn!("Balance refresh after unlock of chapter {} failed: {}", chapter_id, e);
                    None
                }
            }
        } else {
            None
        };

        match outcome {
            Ok(already_owned) => {
                info!("Chapter {} unlocked for user {}", chapter_id, session.user_id);
                Ok(UnlockReceipt {
                    chapter_id,
                    new_balance,
                    already_owned,
                })
            }
            Err(err) => {
                warn!("Unlock of chapter {} failed: {}", chapter_id, err);
                Err(err)
            }
        }
    }
}
