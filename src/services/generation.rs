//! Generation service: pet description → prompt → candidate names.
//!
//! DESIGN
//! ======
//! At most one request is in flight. The loading flag doubles as the lock:
//! `LoadingGuard::acquire` flips it with a compare-exchange and the guard
//! clears it on drop, so every exit path (success, error, cancelled future)
//! resets it. A second call while one is pending returns immediately; it is
//! neither queued nor does it cancel the first.
//!
//! The candidate list is replaced wholesale on success and left untouched on
//! any failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, error, info};

use crate::net::types::{GenerationError, GenerationRequest, NameGenerator, Session};
use crate::state::PetDescription;

/// Number of suggestions requested per generation.
pub const SUGGESTION_COUNT: usize = 5;

/// Key under which the backend returns the suggestions.
pub const NAMES_KEY: &str = "names";

/// Build the generation instruction, embedding both fields verbatim.
#[must_use]
pub fn build_prompt(pet: &PetDescription) -> String {
    format!(
        "Suggest {SUGGESTION_COUNT} unique names for a {} that is {}. \
         Provide the names in a JSON array with the key \"{NAMES_KEY}\".",
        pet.pet_type, pet.characteristics
    )
}

/// Pull the candidate list out of a backend reply.
///
/// # Errors
///
/// Returns [`GenerationError::Malformed`] when the reply is not an object
/// with a `names` array of strings.
pub fn extract_names(reply: &Value) -> Result<Vec<String>, GenerationError> {
    let names = reply
        .get(NAMES_KEY)
        .ok_or_else(|| GenerationError::Malformed(format!("missing `{NAMES_KEY}` key")))?;
    let items = names
        .as_array()
        .ok_or_else(|| GenerationError::Malformed(format!("`{NAMES_KEY}` is not an array")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| GenerationError::Malformed(format!("non-string entry in `{NAMES_KEY}`: {item}")))
        })
        .collect()
}

// =============================================================================
// LOADING GUARD
// =============================================================================

struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LoadingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

pub struct GenerationOrchestrator {
    backend: Arc<dyn NameGenerator>,
    loading: AtomicBool,
    candidates: RwLock<Arc<[String]>>,
}

impl GenerationOrchestrator {
    #[must_use]
    pub fn new(backend: Arc<dyn NameGenerator>) -> Self {
        Self { backend, loading: AtomicBool::new(false), candidates: RwLock::new(Arc::from(Vec::new())) }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Latest successful generation result, in backend order.
    #[must_use]
    pub fn candidates(&self) -> Arc<[String]> {
        Arc::clone(&self.candidates.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Request suggestions for `pet`. Failures are logged and leave the
    /// candidate list as it was.
    pub async fn generate_names(&self, session: &Session, pet: &PetDescription) {
        if pet.pet_type.trim().is_empty() {
            debug!("pet type is blank; skipping generation");
            return;
        }
        let Some(_loading) = LoadingGuard::acquire(&self.loading) else {
            debug!("generation already in flight; ignoring request");
            return;
        };

        let request = GenerationRequest::json(build_prompt(pet));
        let result = self
            .backend
            .generate(session, &request)
            .await
            .and_then(|reply| extract_names(&reply));

        match result {
            Ok(names) => {
                info!(count = names.len(), "generated candidate names");
                *self.candidates.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(names);
            }
            Err(e) => error!(error = %e, "name generation failed"),
        }
    }
}

#[cfg(test)]
#[path = "generation_test.rs"]
mod tests;
