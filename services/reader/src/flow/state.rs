//! services/reader/src/flow/state.rs
//!
//! Defines the client's shared state: the backend ports, the session store
//! and the session-scoped balance channel, wired once and handed to every
//! component that needs them.

use crate::config::Config;
use crate::error::AccessError;
use crate::flow::{
    BackgroundTasks, BalanceClient, BalanceEvents, ChapterGate, CoinShop, SessionStore, UnlockInitiator,
    UnlockStatusChecker,
};
use novel_reader_core::domain::{Credentials, Session};
use novel_reader_core::ports::{
    AuthService, ChapterCatalog, CoinLedger, PaymentService, ReadingHistory, SessionStorage,
    UnlockService,
};
use std::sync::Arc;
use tracing::warn;

/// The shared client state, created once at startup.
#[derive(Clone)]
pub struct ClientState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthService>,
    pub catalog: Arc<dyn ChapterCatalog>,
    pub unlocks: Arc<dyn UnlockService>,
    pub payments: Arc<dyn PaymentService>,
    pub history: Arc<dyn ReadingHistory>,
    pub events: BalanceEvents,
    pub tasks: BackgroundTasks,
    pub sessions: SessionStore,
    pub balance: Arc<BalanceClient>,
    pub status: Arc<UnlockStatusChecker>,
    pub unlocker: Arc<UnlockInitiator>,
}

impl ClientState {
    /// Wires every component against one backend implementation.
    pub fn new<B>(config: Arc<Config>, backend: Arc<B>, storage: Arc<dyn SessionStorage>) -> Self
    where
        B: AuthService
            + ChapterCatalog
            + UnlockService
            + CoinLedger
            + PaymentService
            + ReadingHistory
            + 'static,
    {
        let timeout = config.request_timeout;
        let events = BalanceEvents::new(config.balance_channel_capacity);
        let sessions = SessionStore::new(storage, events.clone(), timeout);

        let ledger: Arc<dyn CoinLedger> = backend.clone();
        let unlocks: Arc<dyn UnlockService> = backend.clone();
        let balance = Arc::new(BalanceClient::new(ledger, events.clone(), timeout));
        let status = Arc::new(UnlockStatusChecker::new(unlocks.clone(), timeout));
        let unlocker = Arc::new(UnlockInitiator::new(
            unlocks.clone(),
            status.clone(),
            balance.clone(),
            timeout,
        ));

        Self {
            config,
            auth: backend.clone(),
            catalog: backend.clone(),
            unlocks,
            payments: backend.clone(),
            history: backend,
            events,
            tasks: BackgroundTasks::new(),
            sessions,
            balance,
            status,
            unlocker,
        }
    }

    /// A fresh access gate for one reading view.
    pub fn gate(&self) -> ChapterGate {
        ChapterGate::new(
            self.catalog.clone(),
            self.history.clone(),
            self.status.clone(),
            self.unlocker.clone(),
            self.sessions.clone(),
            self.tasks.clone(),
            self.config.request_timeout,
        )
    }

    pub fn shop(&self) -> CoinShop {
        CoinShop::new(
            self.payments.clone(),
            self.balance.clone(),
            self.config.request_timeout,
        )
    }

    /// Logs in, stores the session and loads the initial balance.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AccessError> {
        let session = self.sessions.login(self.auth.as_ref(), credentials).await?;
        if let Err(e) = self.balance.reconcile(&session).await {
            warn!("Initial balance fetch failed: {}", e);
        }
        Ok(session)
    }

    pub async fn logout(&self) {
        self.sessions.logout().await;
    }

    /// Lets background calls such as reading history finish before exit,
    /// waiting at most one request timeout.
    pub async fn shutdown(&self) {
        let aborted = self.tasks.drain(self.config.request_timeout).await;
        if aborted > 0 {
            warn!("{} background call(s) did not finish before shutdown", aborted);
        }
    }
}
