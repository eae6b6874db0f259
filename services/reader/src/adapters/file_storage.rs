//! services/reader/src/adapters/file_storage.rs
//!
//! A `SessionStorage` that persists the current session as a small JSON file,
//! the client's counterpart of browser local storage.

use async_trait::async_trait;
use novel_reader_core::domain::{Role, Session};
use novel_reader_core::ports::{PortError, PortResult, SessionStorage};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores the session under fixed field names in a single JSON document.
#[derive(Clone, Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StoredSessionRecord {
    token: Option<String>,
    user_id: Option<i64>,
    username: Option<String>,
    email: Option<String>,
    role: Option<String>,
    avatar: Option<String>,
}

impl StoredSessionRecord {
    fn from_domain(session: &Session) -> Self {
        Self {
            token: Some(session.auth_token.clone()),
            user_id: Some(session.user_id),
            username: Some(session.username.clone()),
            email: session.email.clone(),
            role: Some(session.role.as_str().to_string()),
            avatar: session.avatar_url.clone(),
        }
    }

    /// A record missing its token or user id is not a session.
    fn to_domain(self) -> Option<Session> {
        let auth_token = self.token.filter(|t| !t.trim().is_empty())?;
        let user_id = self.user_id?;
        Some(Session {
            user_id,
            username: self.username.unwrap_or_default(),
            email: self.email,
            role: self.role.as_deref().map(Role::parse).unwrap_or(Role::User),
            auth_token,
            avatar_url: self.avatar,
        })
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn read(&self) -> PortResult<Option<Session>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        let record: StoredSessionRecord =
            serde_json::from_slice(&bytes).map_err(|e| PortError::Decode(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn write(&self, session: &Session) -> PortResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        let json = serde_json::to_vec_pretty(&StoredSessionRecord::from_domain(session))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn erase(&self) -> PortResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}
