//! services/reader/src/flow/session_store.rs
//!
//! The single owner of session reads and writes. Every other component gets
//! the session from here, injected, rather than reading storage itself.

use crate::error::AccessError;
use crate::flow::bounded;
use crate::flow::events::{BalanceEvent, BalanceEvents};
use novel_reader_core::domain::{Credentials, Session};
use novel_reader_core::ports::{AuthService, SessionStorage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    events: BalanceEvents,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, events: BalanceEvents, timeout: Duration) -> Self {
        Self {
            storage,
            events,
            timeout,
        }
    }

    /// Returns the current session, or `None` when absent or unreadable.
    ///
    /// There is no client-side expiry: an expired token is only discovered
    /// when a backend call fails with an authorization error.
    pub async fn get(&self) -> Option<Session> {
        match self.storage.read().await {
            Ok(session) => session.filter(|s| s.bearer().is_some()),
            Err(e) => {
                warn!("Failed to read stored session, treating as logged out: {}", e);
                None
            }
        }
    }

    pub async fn set(&self, session: Session) {
        if let Err(e) = self.storage.write(&session).await {
            warn!("Failed to persist session for user {}: {}", session.user_id, e);
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.storage.erase().await {
            warn!("Failed to clear stored session: {}", e);
        }
        self.events.publish(BalanceEvent::SessionCleared);
    }

    /// Logs in through the backend and stores the resulting session.
    pub async fn login(
        &self,
        auth: &dyn AuthService,
        credentials: &Credentials,
    ) -> Result<Session, AccessError> {
        let session = bounded(self.timeout, auth.login(credentials)).await?;
        info!("User {} logged in as {}", session.user_id, session.role.as_str());
        self.set(session.clone()).await;
        Ok(session)
    }

    pub async fn logout(&self) {
        info!("Logging out");
        self.clear().await;
    }
}
