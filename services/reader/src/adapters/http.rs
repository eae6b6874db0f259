//! services/reader/src/adapters/http.rs
//!
//! This module contains the HTTP adapter, the concrete implementation of every
//! backend port from the `core` crate. It talks to the novel platform's REST API
//! using `reqwest`.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use novel_reader_core::domain::{
    Chapter, ChapterId, CoinBalance, CoinPackage, Credentials, PaymentCallback, PaymentOutcome,
    PaymentRequest, PurchaseSelection, Role, Session, StoryId, UnlockAttempt, UnlockedChapter,
};
use novel_reader_core::ports::{
    AuthService, ChapterCatalog, CoinLedger, PaymentService, PortError, PortResult,
    ReadingHistory, UnlockService,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP adapter that implements all backend ports.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` whose requests are bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("novel-reader/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the bearer token, short-circuiting when the session has none.
    fn authorized(request: RequestBuilder, session: &Session) -> PortResult<RequestBuilder> {
        let token = session.bearer().ok_or(PortError::Unauthorized)?;
        Ok(request.bearer_auth(token))
    }

    async fn send(request: RequestBuilder) -> PortResult<Response> {
        request.send().await.map_err(transport_error)
    }

    async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> PortResult<T> {
        let response = ensure_success(Self::send(request).await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Decode(e.to_string()))
    }
}

//=========================================================================================
// Response Helpers
//=========================================================================================

fn transport_error(err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Timeout
    } else if err.is_decode() {
        PortError::Decode(err.to_string())
    } else {
        PortError::Network(err.to_string())
    }
}

#[derive(Deserialize, Default)]
struct MessageRecord {
    message: Option<String>,
    error: Option<String>,
}

/// Maps non-2xx statuses onto `PortError`, keeping the backend's message.
async fn ensure_success(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(PortError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageRecord>(&body)
        .ok()
        .and_then(|m| m.message.or(m.error))
        .unwrap_or(body);
    if status == StatusCode::NOT_FOUND {
        return Err(PortError::NotFound(message));
    }
    Err(PortError::Rejected {
        status: status.as_u16(),
        message,
    })
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRecord {
    access_token: Option<String>,
    user_id: Option<i64>,
    username: Option<String>,
    email: Option<String>,
    role: Option<String>,
    avatar: Option<String>,
}
impl LoginRecord {
    fn to_domain(self) -> PortResult<Session> {
        let auth_token = self
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PortError::Decode("login response carried no access token".to_string()))?;
        let user_id = self
            .user_id
            .ok_or_else(|| PortError::Decode("login response carried no user id".to_string()))?;
        Ok(Session {
            user_id,
            username: self.username.unwrap_or_default(),
            email: self.email,
            role: self.role.as_deref().map(Role::parse).unwrap_or(Role::User),
            auth_token,
            avatar_url: self.avatar.filter(|a| !a.is_empty() && a != "null"),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterRecord {
    id: i64,
    story_id: Option<i64>,
    chapter_number: Option<i32>,
    title: Option<String>,
    content: Option<String>,
    is_locked: Option<bool>,
    coins_required: Option<u32>,
}
impl ChapterRecord {
    fn to_domain(self) -> Chapter {
        Chapter {
            id: self.id,
            story_id: self.story_id.unwrap_or_default(),
            chapter_number: self.chapter_number.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            content: self.content,
            is_locked: self.is_locked.unwrap_or(false),
            coins_required: self.coins_required.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
struct UnlockStatusRecord {
    unlocked: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlockedChaptersRecord {
    #[serde(default)]
    unlocked_chapters: Vec<UnlockedChapterRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlockedChapterRecord {
    chapter_id: i64,
    chapter_number: Option<i32>,
    title: Option<String>,
    coins_spent: Option<u32>,
    unlocked_at: Option<String>,
}
impl UnlockedChapterRecord {
    fn to_domain(self) -> UnlockedChapter {
        UnlockedChapter {
            chapter_id: self.chapter_id,
            chapter_number: self.chapter_number,
            title: self.title,
            coins_spent: self.coins_spent.unwrap_or(0),
            unlocked_at: self.unlocked_at.as_deref().and_then(parse_backend_timestamp),
        }
    }
}

/// The backend serializes `LocalDateTime` without an offset, with or without fractions.
fn parse_backend_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnlockBody {
    chapter_id: ChapterId,
}

#[derive(Deserialize)]
struct UnlockResultRecord {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct BalanceRecord {
    coins: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPackageRecord {
    id: i64,
    name: Option<String>,
    coins: Option<u64>,
    bonus_coins: Option<u64>,
    price: Option<f64>,
    currency: Option<String>,
    is_active: Option<bool>,
}
impl CoinPackageRecord {
    fn to_domain(self) -> CoinPackage {
        CoinPackage {
            id: self.id,
            name: self.name.unwrap_or_default(),
            coins: self.coins.unwrap_or(0),
            bonus_coins: self.bonus_coins.unwrap_or(0),
            price: self.price.unwrap_or(0.0),
            currency: self.currency.unwrap_or_else(|| "VND".to_string()),
            is_active: self.is_active.unwrap_or(true),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentBody<'a> {
    package_id: Option<i64>,
    custom_amount: Option<u64>,
    payment_method: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentCreatedRecord {
    payment_url: Option<String>,
}

#[derive(Deserialize)]
struct PaymentOutcomeRecord {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    coins: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryBody {
    story_id: StoryId,
    chapter_id: ChapterId,
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AuthService for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> PortResult<Session> {
        let identifier = credentials.identifier.trim();
        let body = if credentials.is_email() {
            LoginBody { email: Some(identifier), username: None, password: &credentials.password }
        } else {
            LoginBody { email: None, username: Some(identifier), password: &credentials.password }
        };
        let request = self.client.post(self.url("/api/auth/login")).json(&body);
        let record: LoginRecord = Self::get_json(request).await?;
        record.to_domain()
    }
}

#[async_trait]
impl ChapterCatalog for HttpBackend {
    async fn get_chapter(
        &self,
        chapter_id: ChapterId,
        session: Option<&Session>,
    ) -> PortResult<Chapter> {
        let mut request = self.client.get(self.url(&format!("/api/chapters/{chapter_id}")));
        if let Some(token) = session.and_then(Session::bearer) {
            request = request.bearer_auth(token);
        }
        let record: ChapterRecord = Self::get_json(request).await?;
        Ok(record.to_domain())
    }
}

#[async_trait]
impl UnlockService for HttpBackend {
    async fn check_unlocked(&self, session: &Session, chapter_id: ChapterId) -> PortResult<bool> {
        let request = Self::authorized(
            self.client.get(self.url(&format!("/api/chapters/unlock/{chapter_id}"))),
            session,
        )?;
        let record: UnlockStatusRecord = Self::get_json(request).await?;
        // Anything but an explicit `true` is "not unlocked".
        Ok(record.unlocked == Some(true))
    }

    async fn unlocked_in_story(
        &self,
        session: &Session,
        story_id: StoryId,
    ) -> PortResult<Vec<UnlockedChapter>> {
        let request = Self::authorized(
            self.client.get(self.url(&format!("/api/chapters/unlock/story/{story_id}"))),
            session,
        )?;
        let record: UnlockedChaptersRecord = Self::get_json(request).await?;
        Ok(record
            .unlocked_chapters
            .into_iter()
            .map(UnlockedChapterRecord::to_domain)
            .collect())
    }

    async fn submit_unlock(
        &self,
        session: &Session,
        chapter_id: ChapterId,
    ) -> PortResult<UnlockAttempt> {
        let request = Self::authorized(
            self.client
                .post(self.url("/api/chapters/unlock"))
                .json(&UnlockBody { chapter_id }),
            session,
        )?;
        let response = Self::send(request).await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PortError::Unauthorized);
        }

        // Declines arrive as 400 with a `{ success: false, message }` body.
        let body = response.text().await.map_err(transport_error)?;
        match serde_json::from_str::<UnlockResultRecord>(&body) {
            Ok(record) if status.is_success() && record.success => {
                Ok(UnlockAttempt::Granted { message: record.message })
            }
            Ok(record) => {
                debug!(chapter_id, status = status.as_u16(), "Unlock declined by backend");
                Ok(UnlockAttempt::Declined {
                    message: record.message.unwrap_or_default(),
                    reason: record.reason,
                })
            }
            Err(e) if status.is_success() => Err(PortError::Decode(e.to_string())),
            Err(_) if status == StatusCode::NOT_FOUND => Err(PortError::NotFound(body)),
            Err(_) => Err(PortError::Rejected {
                status: status.as_u16(),
                message: body,
            }),
        }
    }
}

#[async_trait]
impl CoinLedger for HttpBackend {
    async fn get_balance(&self, session: &Session) -> PortResult<CoinBalance> {
        let request =
            Self::authorized(self.client.get(self.url("/api/coins/balance")), session)?;
        let record: BalanceRecord = Self::get_json(request).await?;
        Ok(CoinBalance {
            coins: record.coins.unwrap_or(0),
        })
    }
}

#[async_trait]
impl PaymentService for HttpBackend {
    async fn list_packages(&self) -> PortResult<Vec<CoinPackage>> {
        let request = self.client.get(self.url("/api/coin-packages"));
        let records: Vec<CoinPackageRecord> = Self::get_json(request).await?;
        Ok(records.into_iter().map(CoinPackageRecord::to_domain).collect())
    }

    async fn create_payment(
        &self,
        session: &Session,
        request: &PaymentRequest,
    ) -> PortResult<String> {
        let (package_id, custom_amount) = match request.selection {
            PurchaseSelection::Package(id) => (Some(id), None),
            PurchaseSelection::CustomAmount(amount) => (None, Some(amount)),
        };
        let body = PaymentBody {
            package_id,
            custom_amount,
            payment_method: request.method.as_str(),
        };
        let http_request = Self::authorized(
            self.client.post(self.url("/api/payments/create")).json(&body),
            session,
        )?;
        let record: PaymentCreatedRecord = Self::get_json(http_request).await?;
        record
            .payment_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PortError::Decode("payment response carried no paymentUrl".to_string()))
    }

    async fn confirm_payment(&self, callback: &PaymentCallback) -> PortResult<PaymentOutcome> {
        let params: Vec<(&str, &str)> = [
            ("vnp_ResponseCode", &callback.response_code),
            ("vnp_TxnRef", &callback.txn_ref),
            ("vnp_Amount", &callback.amount),
            ("vnp_SecureHash", &callback.secure_hash),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
        .collect();
        let request = self
            .client
            .get(self.url("/api/payments/callback"))
            .query(&params);
        let record: PaymentOutcomeRecord = Self::get_json(request).await?;
        Ok(PaymentOutcome {
            success: record.success,
            message: record.message.unwrap_or_default(),
            coins: record.coins.unwrap_or(0),
        })
    }
}

#[async_trait]
impl ReadingHistory for HttpBackend {
    async fn record_read(
        &self,
        session: &Session,
        story_id: StoryId,
        chapter_id: ChapterId,
    ) -> PortResult<()> {
        let request = Self::authorized(
            self.client
                .post(self.url("/api/history/read"))
                .json(&HistoryBody { story_id, chapter_id }),
            session,
        )?;
        ensure_success(Self::send(request).await?).await?;
        Ok(())
    }
}
