//! Session manager: signed-in / signed-out state and auth subscriptions.
//!
//! ARCHITECTURE
//! ============
//! The manager is the only writer of session presence. It holds the current
//! identity in a `watch` channel so the controller can react to sign-in
//! transitions, and resolves a request-scoped [`Session`] (identity + fresh
//! access token) whenever a remote call needs one.
//!
//! ORDERING
//! ========
//! Auth events may race the initial session check. Every applied event bumps
//! an epoch; the initial check records the epoch before querying the provider
//! and discards its answer if any event landed in the meantime. Both writes
//! go through the watch sender's lock, so the comparison and the write are
//! one step. The most recently delivered event therefore always wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::net::types::{AuthError, AuthEvent, AuthProvider, Identity, Session};

pub struct SessionManager {
    provider: Arc<dyn AuthProvider>,
    identity: watch::Sender<Option<Identity>>,
    epoch: AtomicU64,
    sign_ins: AtomicU64,
}

impl SessionManager {
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (identity, _) = watch::channel(None);
        Self { provider, identity, epoch: AtomicU64::new(0), sign_ins: AtomicU64::new(0) }
    }

    /// Identity of the signed-in user, `None` when signed out.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.identity.borrow().is_some()
    }

    /// Number of sign-ins so far. Bumped before watchers are notified, so a
    /// watcher that sees an identity also sees the sign-in that set it, even
    /// when intermediate changes were coalesced.
    #[must_use]
    pub fn sign_in_count(&self) -> u64 {
        self.sign_ins.load(Ordering::SeqCst)
    }

    /// Receiver notified on every identity change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Ask the provider once who is signed in. Failures degrade to signed out.
    pub async fn check_initial_session(&self) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let identity = match self.provider.current_user().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "initial session check failed; treating as signed out");
                None
            }
        };

        let mut superseded = false;
        self.identity.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                superseded = true;
                return false;
            }
            self.replace_identity(current, identity)
        });
        if superseded {
            debug!("auth event arrived during initial session check; keeping event state");
        }
    }

    /// Follow the provider's session-change notifications until the returned
    /// handle is dropped.
    #[must_use = "dropping the subscription unregisters it immediately"]
    pub fn subscribe_to_auth_changes(self: &Arc<Self>) -> AuthSubscription {
        // Register before spawning so no event sent after this call is missed.
        let mut events = self.provider.subscribe();
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => manager.apply_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth events lagged; continuing with newer events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        AuthSubscription { task: Some(task) }
    }

    fn apply_event(&self, event: AuthEvent) {
        debug!(kind = ?event.kind, "auth event");
        self.record(event.identity);
    }

    /// Authoritative write: bumps the epoch and replaces the identity.
    fn record(&self, identity: Option<Identity>) {
        self.identity.send_if_modified(|current| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.replace_identity(current, identity)
        });
    }

    /// Resolve the session for one request. `None` when signed out or when
    /// the provider cannot produce a token. A provider that has no token or
    /// rejects the session outright means the session is gone, so the
    /// manager switches to signed out; transport failures leave it alone.
    pub async fn current_session(&self) -> Option<Session> {
        let identity = self.identity()?;
        match self.provider.access_token().await {
            Ok(Some(access_token)) => Some(Session { identity, access_token }),
            Ok(None) => {
                warn!(user_id = %identity.id, "signed in but provider has no access token; signing out");
                self.record(None);
                None
            }
            Err(e @ AuthError::Response { status, .. }) if (400..500).contains(&status) => {
                warn!(error = %e, user_id = %identity.id, "provider rejected the session; signing out");
                self.record(None);
                None
            }
            Err(e) => {
                error!(error = %e, "failed to resolve access token");
                None
            }
        }
    }

    /// End the session. The view switches to signed out even if the provider
    /// call fails.
    pub async fn sign_out(&self) {
        if let Err(e) = self.provider.sign_out().await {
            error!(error = %e, "sign-out request failed; discarding local session anyway");
        }
        self.record(None);
    }

    /// Mail a magic link / one-time code to `email`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingInput`] for a blank email, or the
    /// provider's error.
    pub async fn send_magic_link(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::MissingInput("email"));
        }
        self.provider.send_magic_link(email).await
    }

    /// Exchange a one-time code for a session and switch to signed in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingInput`] for a blank email or code, or the
    /// provider's error.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let (email, code) = (email.trim(), code.trim());
        if email.is_empty() {
            return Err(AuthError::MissingInput("email"));
        }
        if code.is_empty() {
            return Err(AuthError::MissingInput("code"));
        }
        let identity = self.provider.verify_otp(email, code).await?;
        self.record(Some(identity));
        Ok(())
    }

    fn replace_identity(&self, current: &mut Option<Identity>, next: Option<Identity>) -> bool {
        if *current == next {
            return false;
        }
        match &next {
            Some(identity) => {
                if current.as_ref().map(|c| c.id) != Some(identity.id) {
                    self.sign_ins.fetch_add(1, Ordering::SeqCst);
                    info!(user_id = %identity.id, "signed in");
                }
            }
            None => info!("signed out"),
        }
        *current = next;
        true
    }
}

// =============================================================================
// SUBSCRIPTION HANDLE
// =============================================================================

/// Live registration for auth-change notifications. Dropping it (or calling
/// [`AuthSubscription::unsubscribe`]) stops delivery; both are idempotent.
pub struct AuthSubscription {
    task: Option<JoinHandle<()>>,
}

impl AuthSubscription {
    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
