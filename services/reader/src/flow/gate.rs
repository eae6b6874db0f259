//! services/reader/src/flow/gate.rs
//!
//! The chapter access gate: decides, per navigation, whether a chapter's
//! content is shown, needs a login, or needs an unlock.
//!
//! Every navigation restarts the machine at `Unknown` and takes a new
//! sequence number. Results carrying an older sequence number are discarded,
//! so a slow answer for a chapter the reader already left can never replace
//! the state of the chapter on screen.

use crate::error::{AccessError, UnlockError};
use crate::flow::background::BackgroundTasks;
use crate::flow::bounded;
use crate::flow::session_store::SessionStore;
use crate::flow::unlock::UnlockInitiator;
use crate::flow::unlock_status::UnlockStatusChecker;
use novel_reader_core::domain::{Chapter, ChapterId, Session};
use novel_reader_core::ports::{ChapterCatalog, PortError, ReadingHistory};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Unknown,
    Checking { chapter_id: ChapterId },
    Open(Chapter),
    LockedNeedsLogin { chapter_id: ChapterId },
    LockedNeedsUnlock { chapter_id: ChapterId, coins_required: u32 },
    /// Terminal; the reader retries by navigating again.
    Error { chapter_id: ChapterId, reason: String },
}

struct GateInner {
    sequence: u64,
    token: CancellationToken,
}

impl GateInner {
    fn advance(&mut self) -> (u64, CancellationToken) {
        self.token.cancel();
        self.sequence += 1;
        self.token = CancellationToken::new();
        (self.sequence, self.token.clone())
    }
}

pub struct ChapterGate {
    catalog: Arc<dyn ChapterCatalog>,
    history: Arc<dyn ReadingHistory>,
    status: Arc<UnlockStatusChecker>,
    unlocker: Arc<UnlockInitiator>,
    sessions: SessionStore,
    tasks: BackgroundTasks,
    timeout: Duration,
    inner: Mutex<GateInner>,
    state: watch::Sender<GateState>,
}

impl ChapterGate {
    pub fn new(
        catalog: Arc<dyn ChapterCatalog>,
        history: Arc<dyn ReadingHistory>,
        status: Arc<UnlockStatusChecker>,
        unlocker: Arc<UnlockInitiator>,
        sessions: SessionStore,
        tasks: BackgroundTasks,
        timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(GateState::Unknown);
        Self {
            catalog,
            history,
            status,
            unlocker,
            sessions,
            tasks,
            timeout,
            inner: Mutex::new(GateInner {
                sequence: 0,
                token: CancellationToken::new(),
            }),
            state,
        }
    }

    pub fn state(&self) -> GateState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Runs the gate for a chapter and returns the state on screen afterwards.
    ///
    /// If a newer navigation supersedes this one, the newer state is returned
    /// and this navigation's result is dropped.
    pub async fn navigate(&self, chapter_id: ChapterId) -> GateState {
        let (sequence, token) = self.begin();
        self.run(chapter_id, sequence, token).await
    }

    async fn run(&self, chapter_id: ChapterId, sequence: u64, token: CancellationToken) -> GateState {
        self.commit(sequence, GateState::Checking { chapter_id });

        let next = tokio::select! {
            _ = token.cancelled() => {
                debug!("Check for chapter {} abandoned by a newer navigation", chapter_id);
                return self.state();
            }
            next = self.evaluate(chapter_id) => next,
        };
        self.commit(sequence, next);
        self.state()
    }

    /// Unlocks the chapter the gate is waiting on, then re-enters the gate.
    ///
    /// On `InsufficientFunds` the state stays `LockedNeedsUnlock` and the
    /// error is returned so the caller can offer the coin shop. If the reader
    /// navigated away while the unlock was in flight, the unlock still counts
    /// but the chapter now on screen is left alone.
    pub async fn confirm_unlock(&self) -> Result<GateState, UnlockError> {
        let GateState::LockedNeedsUnlock {
            chapter_id,
            coins_required,
        } = self.state()
        else {
            return Err(UnlockError::NotAwaitingUnlock);
        };
        let sequence = self.inner.lock().sequence;
        let session = self.sessions.get().await;

        match self
            .unlocker
            .unlock_priced(session.as_ref(), chapter_id, Some(coins_required))
            .await
        {
            Ok(receipt) => {
                debug!(?receipt, "Unlock settled");
                match self.begin_if_current(sequence) {
                    Some((next, token)) => Ok(self.run(chapter_id, next, token).await),
                    None => {
                        debug!("Chapter {} unlocked after the reader moved on", chapter_id);
                        Ok(self.state())
                    }
                }
            }
            Err(UnlockError::Auth) => {
                self.commit(sequence, GateState::LockedNeedsLogin { chapter_id });
                Err(UnlockError::Auth)
            }
            Err(UnlockError::Network(reason)) => {
                self.commit(
                    sequence,
                    GateState::Error {
                        chapter_id,
                        reason: reason.clone(),
                    },
                );
                Err(UnlockError::Network(reason))
            }
            Err(other) => Err(other),
        }
    }

    /// Starts a new navigation, abandoning the one in flight.
    fn begin(&self) -> (u64, CancellationToken) {
        self.inner.lock().advance()
    }

    /// Like [`ChapterGate::begin`], but only if no navigation started since `sequence`.
    fn begin_if_current(&self, sequence: u64) -> Option<(u64, CancellationToken)> {
        let mut inner = self.inner.lock();
        (inner.sequence == sequence).then(|| inner.advance())
    }

    /// Publishes `next` only if `sequence` is still the current navigation.
    fn commit(&self, sequence: u64, next: GateState) -> bool {
        let inner = self.inner.lock();
        if inner.sequence != sequence {
            debug!(sequence, current = inner.sequence, "Discarding stale gate result");
            return false;
        }
        info!(?next, "Gate state");
        self.state.send_replace(next);
        true
    }

    async fn evaluate(&self, chapter_id: ChapterId) -> GateState {
        let session = self.sessions.get().await;

        let chapter = match bounded(
            self.timeout,
            self.catalog.get_chapter(chapter_id, session.as_ref()),
        )
        .await
        {
            Ok(chapter) => chapter,
            Err(PortError::Unauthorized) => return GateState::LockedNeedsLogin { chapter_id },
            Err(e) => {
                error!("Failed to load chapter {}: {}", chapter_id, e);
                return GateState::Error {
                    chapter_id,
                    reason: e.to_string(),
                };
            }
        };

        if !chapter.is_locked {
            self.record_history(session.as_ref(), &chapter);
            return GateState::Open(chapter);
        }

        let Some(session) = session else {
            return GateState::LockedNeedsLogin { chapter_id };
        };

        match self.status.check(&session, chapter_id).await {
            Ok(true) => {
                self.record_history(Some(&session), &chapter);
                GateState::Open(chapter)
            }
            Ok(false) => GateState::LockedNeedsUnlock {
                chapter_id,
                coins_required: chapter.coins_required,
            },
            Err(AccessError::Auth) => GateState::LockedNeedsLogin { chapter_id },
            Err(AccessError::Network(reason)) => {
                error!("Unlock status for chapter {} unreachable: {}", chapter_id, reason);
                GateState::Error { chapter_id, reason }
            }
            Err(e) => {
                warn!("Unlock status for chapter {} unconfirmed: {}", chapter_id, e);
                GateState::LockedNeedsUnlock {
                    chapter_id,
                    coins_required: chapter.coins_required,
                }
            }
        }
    }

    /// Reading history for an authenticated reader, off the navigation path.
    fn record_history(&self, session: Option<&Session>, chapter: &Chapter) {
        let Some(session) = session.cloned() else {
            return;
        };
        let history = self.history.clone();
        let timeout = self.timeout;
        let (story_id, chapter_id) = (chapter.story_id, chapter.id);
        self.tasks.spawn(async move {
            if let Err(e) = bounded(timeout, history.record_read(&session, story_id, chapter_id)).await {
                warn!("Failed to record reading history for chapter {}: {}", chapter_id, e);
            }
        });
    }
}
