//! crates/novel_reader_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the reader client.
//! The backend REST API and the local session storage are both reached only
//! through these traits, so the access flow can run against any implementation.

use async_trait::async_trait;
use crate::domain::{
    Chapter, ChapterId, CoinBalance, CoinPackage, Credentials, PaymentCallback, PaymentOutcome,
    PaymentRequest, Session, StoryId, UnlockAttempt, UnlockedChapter,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Local Ports
//=========================================================================================

/// Persistent client-side storage for the single current session.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Returns the stored session. Partial records must come back as `None`.
    async fn read(&self) -> PortResult<Option<Session>>;

    async fn write(&self, session: &Session) -> PortResult<()>;

    async fn erase(&self) -> PortResult<()>;
}

//=========================================================================================
// Backend Ports
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> PortResult<Session>;
}

#[async_trait]
pub trait ChapterCatalog: Send + Sync {
    /// Fetches chapter metadata. The session, when given, is sent as a bearer token.
    async fn get_chapter(&self, chapter_id: ChapterId, session: Option<&Session>)
        -> PortResult<Chapter>;
}

#[async_trait]
pub trait UnlockService: Send + Sync {
    async fn check_unlocked(&self, session: &Session, chapter_id: ChapterId) -> PortResult<bool>;

    async fn unlocked_in_story(
        &self,
        session: &Session,
        story_id: StoryId,
    ) -> PortResult<Vec<UnlockedChapter>>;

    /// Submits an unlock for a chapter. Only the id is sent; the backend
    /// decides the price.
    async fn submit_unlock(&self, session: &Session, chapter_id: ChapterId)
        -> PortResult<UnlockAttempt>;
}

#[async_trait]
pub trait CoinLedger: Send + Sync {
    async fn get_balance(&self, session: &Session) -> PortResult<CoinBalance>;
}

#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn list_packages(&self) -> PortResult<Vec<CoinPackage>>;

    /// Creates a payment and returns the gateway URL to redirect to.
    async fn create_payment(&self, session: &Session, request: &PaymentRequest)
        -> PortResult<String>;

    async fn confirm_payment(&self, callback: &PaymentCallback) -> PortResult<PaymentOutcome>;
}

#[async_trait]
pub trait ReadingHistory: Send + Sync {
    async fn record_read(
        &self,
        session: &Session,
        story_id: StoryId,
        chapter_id: ChapterId,
    ) -> PortResult<()>;
}
