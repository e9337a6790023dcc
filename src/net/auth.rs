//! Hosted auth client: GoTrue-compatible REST API.
//!
//! ARCHITECTURE
//! ============
//! The client holds the one live session (access token, refresh token,
//! expiry, user) and broadcasts an [`AuthEvent`] whenever it changes. The
//! session manager consumes those events; nothing else reads them.
//!
//! Sign-in is passwordless: `POST /auth/v1/otp` mails a magic link carrying a
//! one-time code, and `POST /auth/v1/verify` exchanges that code for a
//! session. Access tokens are refreshed lazily when a caller asks for one
//! after expiry; one refresh runs at a time, and a refresh the provider
//! rejects ends the session.
//!
//! TRADE-OFFS
//! ==========
//! When a session file is configured, the session (including the refresh
//! token) is written to disk in plain JSON (owner-readable only on unix) so
//! the initial session check survives restarts. Without one, every launch starts signed out.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, warn};

use super::error_body;
use super::types::{AccessToken, AuthError, AuthEvent, AuthProvider, Identity};
use crate::config::AuthSettings;

/// Refresh this many seconds before the provider-reported expiry.
const EXPIRY_MARGIN_SECS: u64 = 30;
const EVENT_CAPACITY: usize = 16;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    #[serde(default)]
    expires_at: Option<u64>,
    user: Identity,
}

/// Session as held in memory and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    expires_at: u64,
    user: Identity,
}

impl StoredSession {
    fn from_response(resp: TokenResponse, now: u64) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_at: resp.expires_at.unwrap_or(now + resp.expires_in),
            user: resp.user,
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now + EXPIRY_MARGIN_SECS
    }
}

/// Write the session file readable by the owner only.
async fn write_private(path: &std::path::Path, raw: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // `mode` only applies when the file is created.
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }
    file.write_all(raw).await?;
    file.flush().await
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session_file: Option<PathBuf>,
    session: RwLock<Option<StoredSession>>,
    /// Serializes refreshes so a rotated refresh token is only spent once.
    refreshing: Mutex<()>,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueClient {
    #[must_use]
    pub fn new(http: reqwest::Client, settings: &AuthSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.clone(),
            session_file: settings.session_file.clone(),
            session: RwLock::new(None),
            refreshing: Mutex::new(()),
            events,
        }
    }

    /// Load a previously persisted session, if a session file is configured.
    /// A missing file is normal; a corrupt one is logged and ignored.
    pub async fn restore_session(&self) {
        let Some(path) = &self.session_file else {
            return;
        };
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to read session file");
                return;
            }
        };
        match serde_json::from_slice::<StoredSession>(&raw) {
            Ok(stored) => {
                debug!(user_id = %stored.user.id, "restored persisted session");
                *self.session.write().await = Some(stored);
            }
            Err(e) => warn!(error = %e, path = %path.display(), "ignoring unreadable session file"),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn emit(&self, event: AuthEvent) {
        // No receivers simply means nobody is mounted yet.
        let _ = self.events.send(event);
    }

    async fn store(&self, stored: Option<StoredSession>) {
        if let Err(e) = self.persist(stored.as_ref()).await {
            warn!(error = %e, "failed to persist session");
        }
        *self.session.write().await = stored;
    }

    async fn persist(&self, stored: Option<&StoredSession>) -> Result<(), AuthError> {
        let Some(path) = &self.session_file else {
            return Ok(());
        };
        match stored {
            Some(stored) => {
                let raw = serde_json::to_vec(stored).map_err(|e| AuthError::Storage(e.to_string()))?;
                write_private(path, &raw)
                    .await
                    .map_err(|e| AuthError::Storage(e.to_string()))
            }
            None => match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(AuthError::Storage(e.to_string())),
                _ => Ok(()),
            },
        }
    }

    async fn post_token_request(&self, url: String, body: serde_json::Value) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Response { status: status.as_u16(), body: error_body(response).await });
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Parse(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredSession, AuthError> {
        let url = self.endpoint("/token?grant_type=refresh_token");
        let resp = self
            .post_token_request(url, serde_json::json!({ "refresh_token": refresh_token }))
            .await?;
        let stored = StoredSession::from_response(resp, unix_now());
        self.store(Some(stored.clone())).await;
        self.emit(AuthEvent::token_refreshed(stored.user.clone()));
        Ok(stored)
    }

    /// Current session, refreshed first if its access token has expired.
    /// A refresh the provider rejects ends the session.
    async fn fresh_session(&self) -> Result<Option<StoredSession>, AuthError> {
        let current = self.session.read().await.clone();
        if !current.as_ref().is_some_and(|stored| stored.is_expired(unix_now())) {
            return Ok(current);
        }

        let _refreshing = self.refreshing.lock().await;
        // Another caller may have refreshed (or signed out) while we waited.
        let current = self.session.read().await.clone();
        let stored = match current {
            Some(stored) if stored.is_expired(unix_now()) => stored,
            other => return Ok(other),
        };

        debug!(user_id = %stored.user.id, "access token expired; refreshing");
        match self.refresh(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(e @ AuthError::Response { status, .. }) if (400..500).contains(&status) => {
                warn!(error = %e, user_id = %stored.user.id, "refresh rejected; ending session");
                self.drop_session().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn drop_session(&self) {
        let had_session = self.session.read().await.is_some();
        self.store(None).await;
        if had_session {
            self.emit(AuthEvent::signed_out());
        }
    }
}

#[async_trait::async_trait]
impl AuthProvider for GoTrueClient {
    async fn current_user(&self) -> Result<Option<Identity>, AuthError> {
        let Some(stored) = self.fresh_session().await? else {
            return Ok(None);
        };

        let response = self
            .http
            .get(self.endpoint("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&stored.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            debug!(%status, "stored session rejected by auth provider");
            self.drop_session().await;
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AuthError::Response { status: status.as_u16(), body: error_body(response).await });
        }

        let user = response
            .json::<Identity>()
            .await
            .map_err(|e| AuthError::Parse(e.to_string()))?;
        Ok(Some(user))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn access_token(&self) -> Result<Option<AccessToken>, AuthError> {
        Ok(self
            .fresh_session()
            .await?
            .map(|stored| AccessToken::new(stored.access_token)))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(stored) = self.session.read().await.clone() else {
            return Ok(());
        };

        let result = self
            .http
            .post(self.endpoint("/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&stored.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()));

        // The local session ends whether or not the provider acknowledged it.
        self.drop_session().await;

        let response = result?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Response { status: status.as_u16(), body: error_body(response).await });
        }
        Ok(())
    }

    async fn send_magic_link(&self, email: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.endpoint("/otp"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "create_user": true }))
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Response { status: status.as_u16(), body: error_body(response).await });
        }
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<Identity, AuthError> {
        let body = serde_json::json!({ "type": "email", "email": email, "token": code });
        let resp = self.post_token_request(self.endpoint("/verify"), body).await?;
        let stored = StoredSession::from_response(resp, unix_now());
        let identity = stored.user.clone();
        self.store(Some(stored)).await;
        self.emit(AuthEvent::signed_in(identity.clone()));
        Ok(identity)
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
