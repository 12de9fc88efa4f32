//! Auth session and its persistence.
//!
//! The session is stored under one namespaced key as
//!
//! ```json
//! { "state": { "token": "<access>", "refreshToken": "<refresh>" } }
//! ```
//!
//! It is written on login, overwritten in place on refresh and deleted on
//! logout or when a refresh fails.

use crate::error::{ApiError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Access and refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer access token
    pub token: String,
    /// Token used to obtain a new access token
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl AuthSession {
    /// Create a session.
    pub fn new(token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    state: AuthSession,
}

/// Encode a session in its persisted form.
pub fn encode_session(session: &AuthSession) -> Result<String> {
    Ok(serde_json::to_string(&PersistedSession {
        state: session.clone(),
    })?)
}

/// Decode a persisted session.
pub fn decode_session(raw: &str) -> Result<AuthSession> {
    let persisted: PersistedSession =
        serde_json::from_str(raw).map_err(|e| ApiError::Storage(format!("corrupt session: {e}")))?;
    Ok(persisted.state)
}

/// Where the session lives.
pub trait SessionStore: Send + Sync {
    /// Current session, if any.
    fn load(&self) -> Result<Option<AuthSession>>;

    /// Create or overwrite the session.
    fn save(&self, session: &AuthSession) -> Result<()>;

    /// Delete the session.
    fn clear(&self) -> Result<()>;
}

/// Session kept in process memory, in its persisted encoding.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    raw: RwLock<Option<String>>,
}

impl MemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `session`.
    pub fn with_session(session: &AuthSession) -> Result<Self> {
        Ok(Self {
            raw: RwLock::new(Some(encode_session(session)?)),
        })
    }

    /// The raw persisted value.
    pub fn raw(&self) -> Option<String> {
        self.raw.read().clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<AuthSession>> {
        self.raw.read().as_deref().map(decode_session).transpose()
    }

    fn save(&self, session: &AuthSession) -> Result<()> {
        let encoded = encode_session(session)?;
        *self.raw.write() = Some(encoded);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.raw.write() = None;
        Ok(())
    }
}

/// Session persisted as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store the session for `key` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// File backing the store.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<AuthSession>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => decode_session(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ApiError::Storage(e.to_string())),
        }
    }

    fn save(&self, session: &AuthSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ApiError::Storage(e.to_string()))?;
        }
        let encoded = encode_session(session)?;
        std::fs::write(&self.path, encoded).map_err(|e| ApiError::Storage(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::Storage(e.to_string())),
        }
    }
}
