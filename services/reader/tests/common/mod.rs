//! In-memory backend shared by the integration tests.
//!
//! It enforces the server-side rules the client relies on: balances are only
//! debited by a successful unlock, an already-owned chapter is never charged
//! twice, and every authenticated call needs a known token.

#![allow(dead_code)]

use async_trait::async_trait;
use novel_reader_core::domain::{
    coins_for_custom_amount, Chapter, ChapterId, CoinBalance, CoinPackage, Credentials,
    PaymentCallback, PaymentOutcome, PaymentRequest, PurchaseSelection, Role, Session, StoryId,
    UnlockAttempt, UnlockedChapter, UserId,
};
use novel_reader_core::ports::{
    AuthService, ChapterCatalog, CoinLedger, PaymentService, PortError, PortResult,
    ReadingHistory, SessionStorage, UnlockService,
};
use parking_lot::Mutex;
use reader_lib::adapters::MemorySessionStorage;
use reader_lib::config::Config;
use reader_lib::flow::ClientState;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct CallCounts {
    pub chapter: AtomicUsize,
    pub status: AtomicUsize,
    pub bulk: AtomicUsize,
    pub unlock: AtomicUsize,
    pub balance: AtomicUsize,
    pub history: AtomicUsize,
    pub payment: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockBackend {
    pub calls: CallCounts,
    chapters: Mutex<HashMap<ChapterId, Chapter>>,
    tokens: Mutex<HashMap<String, UserId>>,
    accounts: Mutex<HashMap<String, (String, Session)>>,
    balances: Mutex<HashMap<UserId, u64>>,
    unlocked: Mutex<HashSet<(UserId, ChapterId)>>,
    history: Mutex<Vec<(UserId, StoryId, ChapterId)>>,
    packages: Mutex<Vec<CoinPackage>>,
    pending_payment: Mutex<Option<(UserId, u64)>>,
    chapter_delays: Mutex<HashMap<ChapterId, Duration>>,
    unlock_delay: Mutex<Option<Duration>>,
    status_delay: Mutex<Option<Duration>>,
    login_delay: Mutex<Option<Duration>>,
    status_broken: AtomicBool,
    balance_broken: AtomicBool,
    offline: AtomicBool,
}

pub fn session(user_id: UserId, token: &str) -> Session {
    Session {
        user_id,
        username: format!("reader{user_id}"),
        email: Some(format!("reader{user_id}@example.vn")),
        role: Role::User,
        auth_token: token.to_string(),
        avatar_url: None,
    }
}

pub fn chapter(id: ChapterId, story_id: StoryId, is_locked: bool, coins_required: u32) -> Chapter {
    Chapter {
        id,
        story_id,
        chapter_number: id as i32,
        title: format!("Chapter {id}"),
        content: Some(format!("Content of chapter {id}")),
        is_locked,
        coins_required,
    }
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_chapter(&self, chapter: Chapter) {
        self.chapters.lock().insert(chapter.id, chapter);
    }

    /// Registers a user with a valid token and a starting balance.
    pub fn add_reader(&self, session: &Session, coins: u64) {
        self.tokens.lock().insert(session.auth_token.clone(), session.user_id);
        self.balances.lock().insert(session.user_id, coins);
    }

    pub fn add_account(&self, identifier: &str, password: &str, session: &Session, coins: u64) {
        self.add_reader(session, coins);
        self.accounts
            .lock()
            .insert(identifier.to_string(), (password.to_string(), session.clone()));
    }

    pub fn grant(&self, user_id: UserId, chapter_id: ChapterId) {
        self.unlocked.lock().insert((user_id, chapter_id));
    }

    pub fn add_package(&self, package: CoinPackage) {
        self.packages.lock().push(package);
    }

    pub fn balance_of(&self, user_id: UserId) -> u64 {
        self.balances.lock().get(&user_id).copied().unwrap_or(0)
    }

    pub fn history(&self) -> Vec<(UserId, StoryId, ChapterId)> {
        self.history.lock().clone()
    }

    pub fn delay_chapter(&self, chapter_id: ChapterId, delay: Duration) {
        self.chapter_delays.lock().insert(chapter_id, delay);
    }

    pub fn delay_unlock(&self, delay: Duration) {
        *self.unlock_delay.lock() = Some(delay);
    }

    pub fn delay_status(&self, delay: Duration) {
        *self.status_delay.lock() = Some(delay);
    }

    pub fn delay_login(&self, delay: Duration) {
        *self.login_delay.lock() = Some(delay);
    }

    pub fn break_balance(&self) {
        self.balance_broken.store(true, Ordering::SeqCst);
    }

    pub fn break_status(&self) {
        self.status_broken.store(true, Ordering::SeqCst);
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn reachable(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(PortError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn user_for(&self, session: &Session) -> PortResult<UserId> {
        self.reachable()?;
        self.tokens
            .lock()
            .get(&session.auth_token)
            .copied()
            .ok_or(PortError::Unauthorized)
    }
}

#[async_trait]
impl AuthService for MockBackend {
    async fn login(&self, credentials: &Credentials) -> PortResult<Session> {
        let delay = *self.login_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.reachable()?;
        match self.accounts.lock().get(&credentials.identifier) {
            Some((password, session)) if *password == credentials.password => Ok(session.clone()),
            _ => Err(PortError::Unauthorized),
        }
    }
}

#[async_trait]
impl ChapterCatalog for MockBackend {
    async fn get_chapter(&self, chapter_id: ChapterId, _session: Option<&Session>) -> PortResult<Chapter> {
        self.calls.chapter.fetch_add(1, Ordering::SeqCst);
        let delay = self.chapter_delays.lock().get(&chapter_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.reachable()?;
        self.chapters
            .lock()
            .get(&chapter_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("chapter {chapter_id}")))
    }
}

#[async_trait]
impl UnlockService for MockBackend {
    async fn check_unlocked(&self, session: &Session, chapter_id: ChapterId) -> PortResult<bool> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let user = self.user_for(session)?;
        if self.status_broken.load(Ordering::SeqCst) {
            return Err(PortError::Rejected {
                status: 400,
                message: "status lookup failed".to_string(),
            });
        }
        Ok(self.unlocked.lock().contains(&(user, chapter_id)))
    }

    async fn unlocked_in_story(&self, session: &Session, story_id: StoryId) -> PortResult<Vec<UnlockedChapter>> {
        self.calls.bulk.fetch_add(1, Ordering::SeqCst);
        let user = self.user_for(session)?;
        let chapters = self.chapters.lock();
        let mut owned: Vec<UnlockedChapter> = self
            .unlocked
            .lock()
            .iter()
            .filter(|(u, _)| *u == user)
            .filter_map(|(_, id)| chapters.get(id))
            .filter(|c| c.story_id == story_id)
            .map(|c| UnlockedChapter {
                chapter_id: c.id,
                chapter_number: Some(c.chapter_number),
                title: Some(c.title.clone()),
                coins_spent: c.coins_required,
                unlocked_at: None,
            })
            .collect();
        owned.sort_by_key(|c| c.chapter_id);
        Ok(owned)
    }

    async fn submit_unlock(&self, session: &Session, chapter_id: ChapterId) -> PortResult<UnlockAttempt> {
        self.calls.unlock.fetch_add(1, Ordering::SeqCst);
        let delay = *self.unlock_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let user = self.user_for(session)?;
        let Some(chapter) = self.chapters.lock().get(&chapter_id).cloned() else {
            return Ok(UnlockAttempt::Declined {
                message: "Không đủ tiền xu hoặc chapter không tồn tại".to_string(),
                reason: None,
            });
        };
        if !chapter.is_locked || self.unlocked.lock().contains(&(user, chapter_id)) {
            return Ok(UnlockAttempt::Granted { message: None });
        }
        let mut balances = self.balances.lock();
        let balance = balances.entry(user).or_insert(0);
        if *balance < chapter.coins_required as u64 {
            return Ok(UnlockAttempt::Declined {
                message: "Không đủ tiền xu hoặc chapter không tồn tại".to_string(),
                reason: None,
            });
        }
        *balance -= chapter.coins_required as u64;
        self.unlocked.lock().insert((user, chapter_id));
        Ok(UnlockAttempt::Granted {
            message: Some("Mở khóa chapter thành công".to_string()),
        })
    }
}

#[async_trait]
impl CoinLedger for MockBackend {
    async fn get_balance(&self, session: &Session) -> PortResult<CoinBalance> {
        self.calls.balance.fetch_add(1, Ordering::SeqCst);
        let user = self.user_for(session)?;
        if self.balance_broken.load(Ordering::SeqCst) {
            return Err(PortError::Rejected {
                status: 500,
                message: "ledger unavailable".to_string(),
            });
        }
        Ok(CoinBalance {
            coins: self.balance_of(user),
        })
    }
}

#[async_trait]
impl PaymentService for MockBackend {
    async fn list_packages(&self) -> PortResult<Vec<CoinPackage>> {
        self.reachable()?;
        Ok(self.packages.lock().clone())
    }

    async fn create_payment(&self, session: &Session, request: &PaymentRequest) -> PortResult<String> {
        self.calls.payment.fetch_add(1, Ordering::SeqCst);
        let user = self.user_for(session)?;
        let coins = match request.selection {
            PurchaseSelection::Package(id) => self
                .packages
                .lock()
                .iter()
                .find(|p| p.id == id)
                .map(CoinPackage::total_coins)
                .ok_or_else(|| PortError::NotFound(format!("package {id}")))?,
            PurchaseSelection::CustomAmount(amount) => coins_for_custom_amount(amount),
        };
        *self.pending_payment.lock() = Some((user, coins));
        Ok("https://sandbox.vnpay.example/pay?txn=TXN1".to_string())
    }

    async fn confirm_payment(&self, callback: &PaymentCallback) -> PortResult<PaymentOutcome> {
        self.calls.payment.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        let Some((user, coins)) = self.pending_payment.lock().take() else {
            return Ok(PaymentOutcome {
                success: false,
                message: "Không tìm thấy giao dịch".to_string(),
                coins: 0,
            });
        };
        if callback.response_code.as_deref() != Some("00") {
            return Ok(PaymentOutcome {
                success: false,
                message: "Thanh toán thất bại".to_string(),
                coins: 0,
            });
        }
        *self.balances.lock().entry(user).or_insert(0) += coins;
        Ok(PaymentOutcome {
            success: true,
            message: "Thanh toán thành công".to_string(),
            coins,
        })
    }
}

#[async_trait]
impl ReadingHistory for MockBackend {
    async fn record_read(&self, session: &Session, story_id: StoryId, chapter_id: ChapterId) -> PortResult<()> {
        self.calls.history.fetch_add(1, Ordering::SeqCst);
        let user = self.user_for(session)?;
        self.history.lock().push((user, story_id, chapter_id));
        Ok(())
    }
}

/// A storage whose every operation fails, as a broken local store would.
pub struct BrokenStorage;

#[async_trait]
impl SessionStorage for BrokenStorage {
    async fn read(&self) -> PortResult<Option<Session>> {
        Err(PortError::Unexpected("storage unavailable".to_string()))
    }

    async fn write(&self, _session: &Session) -> PortResult<()> {
        Err(PortError::Unexpected("storage unavailable".to_string()))
    }

    async fn erase(&self) -> PortResult<()> {
        Err(PortError::Unexpected("storage unavailable".to_string()))
    }
}

pub fn test_config(timeout: Duration) -> Arc<Config> {
    Arc::new(Config {
        request_timeout: timeout,
        ..Config::default()
    })
}

/// Client state over the mock backend, optionally already logged in.
pub fn client(backend: &Arc<MockBackend>, session: Option<Session>) -> ClientState {
    client_with_timeout(backend, session, Duration::from_secs(2))
}

pub fn client_with_timeout(
    backend: &Arc<MockBackend>,
    session: Option<Session>,
    timeout: Duration,
) -> ClientState {
    let storage = match session {
        Some(session) => MemorySessionStorage::with_session(session),
        None => MemorySessionStorage::new(),
    };
    ClientState::new(test_config(timeout), backend.clone(), Arc::new(storage))
}
