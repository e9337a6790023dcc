//! Collaborator contracts: identity, session, wire types, errors.
//!
//! DESIGN
//! ======
//! The controller never talks HTTP directly. It depends on three async
//! traits (`AuthProvider`, `NameGenerator`, `NameStore`) so each remote
//! collaborator can be swapped for an in-memory mock in tests. The HTTP
//! adapters in the sibling modules are the production implementations.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// =============================================================================
// IDENTITY & SESSION
// =============================================================================

/// The authenticated user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    /// Human-readable label: the email when known, else the user id.
    #[must_use]
    pub fn label(&self) -> String {
        self.email.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Bearer token granting access to the generation and persistence backends.
/// `Debug` never prints the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Request-scoped session context. Built by the session manager and lent to
/// the generation and persistence services for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub access_token: AccessToken,
}

// =============================================================================
// AUTH EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Session-change notification delivered by an [`AuthProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    /// Present for every kind except `SignedOut`.
    pub identity: Option<Identity>,
}

impl AuthEvent {
    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        Self { kind: AuthEventKind::SignedIn, identity: Some(identity) }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { kind: AuthEventKind::SignedOut, identity: None }
    }

    #[must_use]
    pub fn token_refreshed(identity: Identity) -> Self {
        Self { kind: AuthEventKind::TokenRefreshed, identity: Some(identity) }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Output format requested from the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Json,
}

/// Body sent to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub response_type: ResponseType,
}

impl GenerationRequest {
    #[must_use]
    pub fn json(prompt: String) -> Self {
        Self { prompt, response_type: ResponseType::Json }
    }
}

/// A persisted name. Server-assigned fields (ids, timestamps, owner) are kept
/// verbatim in `extra` and never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedNameRecord {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SavedNameRecord {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), extra: serde_json::Map::new() }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors produced by the auth provider.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required sign-in field was blank.
    #[error("missing {0}")]
    MissingInput(&'static str),

    /// The HTTP request to the auth provider failed.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The auth provider returned a non-success status.
    #[error("auth response error: status {status}")]
    Response { status: u16, body: String },

    /// The auth provider response body could not be deserialized.
    #[error("auth response parse failed: {0}")]
    Parse(String),

    /// The persisted session file could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(String),
}

/// Errors produced by the generation backend or while reading its result.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The request never completed (connect, timeout, body read).
    #[error("generation request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("generation backend error: status {status}")]
    Backend { status: u16, body: String },

    /// The backend answered, but not with the expected shape.
    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Errors produced by the persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("persistence request failed: {0}")]
    Transport(String),

    #[error("persistence backend error: status {status}")]
    Status { status: u16, body: String },

    #[error("persistence response parse failed: {0}")]
    Parse(String),
}

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

/// Hosted authentication provider. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Identity of the currently signed-in user, or `None` when signed out.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the provider cannot be reached or answers
    /// with an unexpected status.
    async fn current_user(&self) -> Result<Option<Identity>, AuthError>;

    /// Register for session-change notifications. Dropping the receiver
    /// unregisters.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// A valid access token for the current session, refreshing it first if
    /// it has expired.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if a required refresh fails.
    async fn access_token(&self) -> Result<Option<AccessToken>, AuthError>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the provider rejects the logout. The local
    /// session is discarded regardless.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Send a magic link / one-time code to `email`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the provider rejects the request.
    async fn send_magic_link(&self, email: &str) -> Result<(), AuthError>;

    /// Exchange the one-time code mailed to `email` for a session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the code is rejected or the response is
    /// malformed.
    async fn verify_otp(&self, email: &str, code: &str) -> Result<Identity, AuthError>;
}

/// AI text-generation backend.
#[async_trait::async_trait]
pub trait NameGenerator: Send + Sync {
    /// Submit `request` and return the backend's structured JSON result.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] on transport failure, non-success status,
    /// or a body that is not JSON.
    async fn generate(
        &self,
        session: &Session,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError>;
}

/// Persistence backend for saved names.
#[async_trait::async_trait]
pub trait NameStore: Send + Sync {
    /// List every name saved by the session's user.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on transport failure, non-200 status, or an
    /// unparseable body.
    async fn list_names(&self, session: &Session) -> Result<Vec<SavedNameRecord>, StoreError>;

    /// Persist `name` for the session's user.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on transport failure or non-200 status.
    async fn save_name(&self, session: &Session, name: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
