pub mod domain;
pub mod ports;

pub use domain::{
    coins_for_custom_amount, Chapter, ChapterId, CoinBalance, CoinPackage, Credentials,
    PaymentCallback, PaymentMethod, PaymentOutcome, PaymentRequest, PurchaseSelection, Role,
    Session, StoryId, UnlockAttempt, UnlockedChapter, UserId,
};
pub use ports::{
    AuthService, ChapterCatalog, CoinLedger, PaymentService, PortError, PortResult,
    ReadingHistory, SessionStorage, UnlockService,
};
