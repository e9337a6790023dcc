//! Saved-names service: fetch and append the user's persisted names.
//!
//! DESIGN
//! ======
//! Stale-but-consistent: the list is replaced only by a complete successful
//! fetch, never merged or partially updated. A save does not insert
//! optimistically; the new name shows up once the follow-up fetch lands.
//! Nothing is retried.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info};

use crate::net::types::{NameStore, SavedNameRecord, Session};

pub struct PersistenceBridge {
    store: Arc<dyn NameStore>,
    saved: RwLock<Arc<[SavedNameRecord]>>,
}

impl PersistenceBridge {
    #[must_use]
    pub fn new(store: Arc<dyn NameStore>) -> Self {
        Self { store, saved: RwLock::new(Arc::from(Vec::new())) }
    }

    /// Last successfully fetched list.
    #[must_use]
    pub fn saved_names(&self) -> Arc<[SavedNameRecord]> {
        Arc::clone(&self.saved.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub async fn fetch_saved_names(&self, session: &Session) {
        match self.store.list_names(session).await {
            Ok(records) => {
                debug!(count = records.len(), "fetched saved names");
                *self.saved.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(records);
            }
            Err(e) => error!(error = %e, "failed to fetch saved names"),
        }
    }

    /// Persist `name`, then re-fetch the list. On failure nothing changes.
    pub async fn save_name(&self, session: &Session, name: &str) {
        if name.trim().is_empty() {
            debug!("name is blank; not saving");
            return;
        }
        match self.store.save_name(session, name).await {
            Ok(()) => {
                info!(name, "saved name");
                self.fetch_saved_names(session).await;
            }
            Err(e) => error!(error = %e, name, "failed to save name"),
        }
    }
}

#[cfg(test)]
#[path = "saved_names_test.rs"]
mod tests;
