//! crates/novel_reader_core/src/domain.rs
//!
//! Defines the pure, core data structures for the reader client.
//! These structs are independent of any transport or serialization format;
//! the authoritative copies of all of them live in the backend.

use chrono::NaiveDateTime;

pub type UserId = i64;
pub type StoryId = i64;
pub type ChapterId = i64;

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Parses the backend's role name. Anything that is not `ADMIN` is a plain user.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

/// The authenticated-user context held by the client.
///
/// A session is either fully present or absent. Storage adapters must not
/// hand out a `Session` built from partial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub auth_token: String,
    pub avatar_url: Option<String>,
}

impl Session {
    /// The bearer token, or `None` when the token is not usable.
    pub fn bearer(&self) -> Option<&str> {
        let token = self.auth_token.trim();
        (!token.is_empty()).then_some(token)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Login input. The identifier is either a username or an email address.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    pub fn is_email(&self) -> bool {
        let id = self.identifier.trim();
        match id.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        }
    }
}

//=========================================================================================
// Chapters and unlocks
//=========================================================================================

/// Chapter metadata as served by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub id: ChapterId,
    pub story_id: StoryId,
    pub chapter_number: i32,
    pub title: String,
    pub content: Option<String>,
    pub is_locked: bool,
    pub coins_required: u32,
}

impl Chapter {
    /// The unlock price, or `None` for a free chapter.
    pub fn price(&self) -> Option<u32> {
        self.is_locked.then_some(self.coins_required)
    }

    /// A chapter is effectively locked for a reader iff it is locked and the
    /// reader holds no unlock record for it.
    pub fn is_effectively_locked(&self, unlocked: &[ChapterId]) -> bool {
        self.is_locked && !unlocked.contains(&self.id)
    }
}

/// One entry of the per-story unlock listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedChapter {
    pub chapter_id: ChapterId,
    pub chapter_number: Option<i32>,
    pub title: Option<String>,
    pub coins_spent: u32,
    pub unlocked_at: Option<NaiveDateTime>,
}

/// The backend's answer to an unlock submission that it did not refuse at
/// the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockAttempt {
    Granted { message: Option<String> },
    Declined {
        message: String,
        reason: Option<String>,
    },
}

//=========================================================================================
// Coins and payments
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinBalance {
    pub coins: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoinPackage {
    pub id: i64,
    pub name: String,
    pub coins: u64,
    pub bonus_coins: u64,
    pub price: f64,
    pub currency: String,
    pub is_active: bool,
}

impl CoinPackage {
    pub fn total_coins(&self) -> u64 {
        self.coins + self.bonus_coins
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Vnpay,
    Momo,
    ZaloPay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Vnpay => "VNPAY",
            PaymentMethod::Momo => "MOMO",
            PaymentMethod::ZaloPay => "ZALOPAY",
        }
    }

    /// Only VNPAY is wired up on the backend.
    pub fn is_available(&self) -> bool {
        matches!(self, PaymentMethod::Vnpay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseSelection {
    Package(i64),
    CustomAmount(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentRequest {
    pub selection: PurchaseSelection,
    pub method: PaymentMethod,
}

impl PaymentRequest {
    pub fn new(selection: PurchaseSelection, method: PaymentMethod) -> Self {
        Self { selection, method }
    }

    /// Client-side validation before anything is sent to the payment endpoint.
    pub fn validate(&self) -> Result<(), String> {
        if !self.method.is_available() {
            return Err(format!("payment method {} is not available", self.method.as_str()));
        }
        match self.selection {
            PurchaseSelection::CustomAmount(0) => Err("amount must be greater than zero".to_string()),
            PurchaseSelection::Package(id) if id <= 0 => Err(format!("invalid package id {id}")),
            _ => Ok(()),
        }
    }
}

/// Preview of how many coins a custom top-up amount buys.
///
/// Mirrors the backend's tier table; the backend remains authoritative.
pub fn coins_for_custom_amount(amount: u64) -> u64 {
    match amount {
        a if a >= 2_000_000 => 24_000,
        a if a >= 1_000_000 => 11_500,
        a if a >= 500_000 => 5_500,
        a if a >= 200_000 => 2_150,
        a if a >= 100_000 => 1_050,
        a if a >= 50_000 => 500,
        a => a / 100,
    }
}

/// Query parameters the payment gateway appends to the return URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentCallback {
    pub response_code: Option<String>,
    pub txn_ref: Option<String>,
    pub amount: Option<String>,
    pub secure_hash: Option<String>,
}

impl PaymentCallback {
    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.response_code) && present(&self.txn_ref)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub success: bool,
    pub message: String,
    pub coins: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(is_locked: bool) -> Chapter {
        Chapter {
            id: 7,
            story_id: 1,
            chapter_number: 7,
            title: "Seven".to_string(),
            content: None,
            is_locked,
            coins_required: 10,
        }
    }

    #[test]
    fn free_chapter_has_no_price() {
        assert_eq!(chapter(false).price(), None);
        assert_eq!(chapter(true).price(), Some(10));
    }

    #[test]
    fn effective_lock_respects_unlock_records() {
        assert!(chapter(true).is_effectively_locked(&[1, 2]));
        assert!(!chapter(true).is_effectively_locked(&[7]));
        assert!(!chapter(false).is_effectively_locked(&[]));
    }

    #[test]
    fn blank_token_is_not_a_bearer() {
        let session = Session {
            user_id: 1,
            username: "reader".to_string(),
            email: None,
            role: Role::User,
            auth_token: "  ".to_string(),
            avatar_url: None,
        };
        assert_eq!(session.bearer(), None);
    }

    #[test]
    fn custom_amount_tiers() {
        assert_eq!(coins_for_custom_amount(2_500_000), 24_000);
        assert_eq!(coins_for_custom_amount(100_000), 1_050);
        assert_eq!(coins_for_custom_amount(49_999), 499);
        assert_eq!(coins_for_custom_amount(0), 0);
    }

    #[test]
    fn identifier_detection() {
        assert!(Credentials::new("a@b.vn", "x").is_email());
        assert!(!Credentials::new("reader01", "x").is_email());
        assert!(!Credentials::new("@b.vn", "x").is_email());
    }

    #[test]
    fn payment_request_validation() {
        let ok = PaymentRequest::new(PurchaseSelection::Package(3), PaymentMethod::Vnpay);
        assert!(ok.validate().is_ok());
        let zero = PaymentRequest::new(PurchaseSelection::CustomAmount(0), PaymentMethod::Vnpay);
        assert!(zero.validate().is_err());
        let momo = PaymentRequest::new(PurchaseSelection::Package(3), PaymentMethod::Momo);
        assert!(momo.validate().is_err());
    }

    #[test]
    fn role_parsing_defaults_to_user() {
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse("USER"), Role::User);
        assert_eq!(Role::parse("moderator"), Role::User);
    }
}
