//! Session-gated form controller.
//!
//! SYSTEM CONTEXT
//! ==============
//! `NamerApp` is the single component the binary drives. It owns the form,
//! the three services, and the mount lifecycle:
//!
//! - `mount` registers for auth changes, starts the sign-in follower, and
//!   runs the initial session check, in that order, so no transition is
//!   missed.
//! - The sign-in follower re-fetches saved names once per sign-in. Token
//!   refreshes do not re-fetch.
//! - `unmount` (or dropping the last clone) releases both.
//!
//! Every operation swallows its own failures (logged by the services) and
//! returns `()`; the only visible effect of a failure is the absence of an
//! update.

use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::net::types::{AuthError, AuthProvider, Identity, NameGenerator, NameStore};
use crate::services::generation::GenerationOrchestrator;
use crate::services::saved_names::PersistenceBridge;
use crate::services::session::{AuthSubscription, SessionManager};
use crate::state::PetDescription;
use crate::view::{View, ViewModel, render};

/// Cheap to clone; all clones share one controller.
#[derive(Clone)]
pub struct NamerApp {
    inner: Arc<AppInner>,
}

struct AppInner {
    sessions: Arc<SessionManager>,
    generation: GenerationOrchestrator,
    saved: PersistenceBridge,
    pet: RwLock<PetDescription>,
    mounted: Mutex<Option<Mounted>>,
}

/// Resources held while mounted. Released on drop.
struct Mounted {
    _auth: AuthSubscription,
    sign_in_follower: JoinHandle<()>,
}

impl Drop for Mounted {
    fn drop(&mut self) {
        self.sign_in_follower.abort();
    }
}

impl NamerApp {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthProvider>, generator: Arc<dyn NameGenerator>, store: Arc<dyn NameStore>) -> Self {
        Self {
            inner: Arc::new(AppInner {
                sessions: Arc::new(SessionManager::new(auth)),
                generation: GenerationOrchestrator::new(generator),
                saved: PersistenceBridge::new(store),
                pet: RwLock::new(PetDescription::default()),
                mounted: Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start following the session. Mounting an already-mounted app is a
    /// no-op.
    pub async fn mount(&self) {
        {
            let mut mounted = self.inner.mounted.lock().unwrap_or_else(PoisonError::into_inner);
            if mounted.is_some() {
                debug!("already mounted");
                return;
            }
            let auth = self.inner.sessions.subscribe_to_auth_changes();
            let follower = tokio::spawn(follow_sign_ins(Arc::downgrade(&self.inner), self.inner.sessions.watch()));
            *mounted = Some(Mounted { _auth: auth, sign_in_follower: follower });
        }
        self.inner.sessions.check_initial_session().await;
    }

    /// Stop following the session. Unmounting twice is harmless.
    pub fn unmount(&self) {
        let released = self
            .inner
            .mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(released);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner
            .mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // =========================================================================
    // FORM
    // =========================================================================

    pub fn set_pet_type(&self, value: impl Into<String>) {
        self.inner.pet.write().unwrap_or_else(PoisonError::into_inner).pet_type = value.into();
    }

    pub fn set_characteristics(&self, value: impl Into<String>) {
        self.inner.pet.write().unwrap_or_else(PoisonError::into_inner).characteristics = value.into();
    }

    #[must_use]
    pub fn pet(&self) -> PetDescription {
        self.inner.pet.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    pub async fn generate_names(&self) {
        let Some(session) = self.inner.sessions.current_session().await else {
            debug!("not signed in; ignoring generate");
            return;
        };
        let pet = self.pet();
        self.inner.generation.generate_names(&session, &pet).await;
    }

    pub async fn save_name(&self, name: &str) {
        let Some(session) = self.inner.sessions.current_session().await else {
            debug!("not signed in; ignoring save");
            return;
        };
        self.inner.saved.save_name(&session, name).await;
    }

    /// Name of the candidate shown with save action `index` (1-based).
    #[must_use]
    pub fn candidate(&self, index: usize) -> Option<String> {
        let candidates = self.inner.generation.candidates();
        index
            .checked_sub(1)
            .and_then(|i| candidates.get(i).cloned())
    }

    pub async fn refresh_saved_names(&self) {
        self.inner.refresh_saved_names().await;
    }

    pub async fn sign_out(&self) {
        self.inner.sessions.sign_out().await;
    }

    /// Sign-in surface: mail a one-time code.
    ///
    /// # Errors
    ///
    /// Returns the auth provider's error so the sign-in surface can show it.
    pub async fn send_magic_link(&self, email: &str) -> Result<(), AuthError> {
        self.inner.sessions.send_magic_link(email).await
    }

    /// Sign-in surface: exchange the mailed code for a session.
    ///
    /// # Errors
    ///
    /// Returns the auth provider's error so the sign-in surface can show it.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<(), AuthError> {
        self.inner.sessions.verify_code(email, code).await
    }

    // =========================================================================
    // VIEW
    // =========================================================================

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.inner.sessions.identity()
    }

    #[must_use]
    pub fn view_model(&self) -> ViewModel {
        ViewModel {
            identity: self.inner.sessions.identity(),
            pet: self.pet(),
            candidates: self.inner.generation.candidates().to_vec(),
            loading: self.inner.generation.is_loading(),
            saved: self.inner.saved.saved_names().to_vec(),
        }
    }

    #[must_use]
    pub fn view(&self) -> View {
        render(&self.view_model())
    }
}

impl AppInner {
    async fn refresh_saved_names(&self) {
        let Some(session) = self.sessions.current_session().await else {
            debug!("not signed in; skipping saved-name fetch");
            return;
        };
        self.saved.fetch_saved_names(&session).await;
    }
}

/// Fetch saved names once per sign-in. Keyed on the session manager's
/// sign-in count rather than the user id, so a sign-out and sign-in that land
/// while a fetch is running still produce a second fetch. Holds the
/// controller weakly so an unmounted or dropped app is not kept alive by its
/// own follower.
async fn follow_sign_ins(inner: Weak<AppInner>, mut identity: watch::Receiver<Option<Identity>>) {
    let mut fetched_for = None;
    loop {
        let signed_in = identity.borrow_and_update().is_some();
        if signed_in {
            let Some(app) = inner.upgrade() else { return };
            let sign_in = app.sessions.sign_in_count();
            if fetched_for != Some(sign_in) {
                fetched_for = Some(sign_in);
                app.refresh_saved_names().await;
            }
        }
        if identity.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
