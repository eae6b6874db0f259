//! services/reader/src/error.rs
//!
//! Defines the error types for the reader client: the top-level `ReaderError`
//! and the two taxonomies the access flow reports to its callers.

use crate::config::ConfigError;
use novel_reader_core::ports::PortError;

/// The primary error type for the `reader` service.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Unlock error: {0}")]
    Unlock(#[from] UnlockError),

    /// Represents an error from building the HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Failures of read-side calls (chapter metadata, balance, packages, payments).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Missing, invalid or expired token. Callers redirect to login.
    #[error("authentication required")]
    Auth,
    /// Unreachable backend or timeout. Surfaced with a retry affordance.
    #[error("network error: {0}")]
    Network(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl From<PortError> for AccessError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Unauthorized => AccessError::Auth,
            PortError::Network(msg) => AccessError::Network(msg),
            PortError::Timeout => AccessError::Network("request timed out".to_string()),
            PortError::NotFound(what) => AccessError::NotFound(what),
            PortError::Rejected { status, message } => {
                AccessError::Rejected(format!("{status}: {message}"))
            }
            PortError::Decode(msg) | PortError::Unexpected(msg) => AccessError::Rejected(msg),
        }
    }
}

/// Outcomes of an unlock submission other than success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnlockError {
    /// An expected business outcome; the caller offers the coin shop.
    #[error("not enough coins to unlock this chapter")]
    InsufficientFunds,
    #[error("authentication required")]
    Auth,
    #[error("network error: {0}")]
    Network(String),
    /// Reported by the backend; the initiator folds it into success.
    #[error("chapter already unlocked")]
    AlreadyUnlocked,
    /// Another unlock for the same chapter has not settled yet.
    #[error("an unlock for this chapter is already in flight")]
    InFlight,
    #[error("chapter is not waiting for an unlock")]
    NotAwaitingUnlock,
    #[error("unlock rejected: {0}")]
    Rejected(String),
}

impl From<PortError> for UnlockError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Unauthorized => UnlockError::Auth,
            PortError::Network(msg) => UnlockError::Network(msg),
            PortError::Timeout => UnlockError::Network("request timed out".to_string()),
            PortError::Rejected { status, message } => {
                UnlockError::classify(&message, None)
                    .unwrap_or_else(|| UnlockError::Rejected(format!("{status}: {message}")))
            }
            PortError::NotFound(what) => UnlockError::Rejected(format!("not found: {what}")),
            PortError::Decode(msg) | PortError::Unexpected(msg) => UnlockError::Rejected(msg),
        }
    }
}

impl UnlockError {
    /// Recognises the business outcomes hidden in a declined unlock.
    ///
    /// A machine-readable `reason` wins over the message text. The backend
    /// phrases insufficient funds in Vietnamese ("không đủ tiền xu").
    pub fn classify(message: &str, reason: Option<&str>) -> Option<Self> {
        if let Some(reason) = reason {
            match reason.trim().to_ascii_uppercase().as_str() {
                "INSUFFICIENT_FUNDS" | "INSUFFICIENT_COINS" => {
                    return Some(UnlockError::InsufficientFunds)
                }
                "ALREADY_UNLOCKED" => return Some(UnlockError::AlreadyUnlocked),
                _ => {}
            }
        }
        let lowered = message.to_lowercase();
        if lowered.contains("already unlocked") || lowered.contains("đã mở khóa") {
            Some(UnlockError::AlreadyUnlocked)
        } else if lowered.contains("insufficient")
            || lowered.contains("not enough")
            || lowered.contains("không đủ")
        {
            Some(UnlockError::InsufficientFunds)
        } else {
            None
        }
    }
}
