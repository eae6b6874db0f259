//! services/reader/src/flow/unlock_status.rs
//!
//! Asks the backend whether the reader owns a chapter. There is no durable
//! client cache: every access decision re-queries.

use crate::error::AccessError;
use crate::flow::bounded;
use novel_reader_core::domain::{ChapterId, Session, StoryId};
use novel_reader_core::ports::UnlockService;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct UnlockStatusChecker {
    unlocks: Arc<dyn UnlockService>,
    timeout: Duration,
}

impl UnlockStatusChecker {
    pub fn new(unlocks: Arc<dyn UnlockService>, timeout: Duration) -> Self {
        Self { unlocks, timeout }
    }

    /// Fail-closed status check: errors read as "not unlocked".
    pub async fn is_unlocked(&self, session: Option<&Session>, chapter_id: ChapterId) -> bool {
        let Some(session) = session else {
            return false;
        };
        match self.check(session, chapter_id).await {
            Ok(unlocked) => unlocked,
            Err(e) => {
                warn!("Unlock status for chapter {} unavailable: {}", chapter_id, e);
                false
            }
        }
    }

    /// The raw status call, keeping the failure kind for callers that branch on it.
    pub async fn check(&self, session: &Session, chapter_id: ChapterId) -> Result<bool, AccessError> {
        if session.bearer().is_none() {
            return Err(AccessError::Auth);
        }
        let unlocked =
            bounded(self.timeout, self.unlocks.check_unlocked(session, chapter_id)).await?;
        Ok(unlocked)
    }

    /// Ids of the chapters of a story the reader has unlocked; empty on any error.
    pub async fn unlocked_in_story(
        &self,
        session: Option<&Session>,
        story_id: StoryId,
    ) -> Vec<ChapterId> {
        let Some(session) = session.filter(|s| s.bearer().is_some()) else {
            return Vec::new();
        };
        match bounded(self.timeout, self.unlocks.unlocked_in_story(session, story_id)).await {
            Ok(chapters) => chapters.into_iter().map(|c| c.chapter_id).collect(),
            Err(e) => {
                warn!("Unlocked chapters for story {} unavailable: {}", story_id, e);
                Vec::new()
            }
        }
    }
}
