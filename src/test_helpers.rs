//! Shared fixtures for unit tests: in-memory collaborators and a throwaway
//! HTTP server for exercising the `reqwest` adapters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use crate::net::types::{
    AccessToken, AuthError, AuthEvent, AuthProvider, GenerationError, GenerationRequest, Identity, NameGenerator,
    NameStore, SavedNameRecord, Session, StoreError,
};

// =============================================================================
// FIXTURES
// =============================================================================

#[must_use]
pub fn identity(email: &str) -> Identity {
    Identity { id: Uuid::new_v4(), email: Some(email.to_string()) }
}

#[must_use]
pub fn session() -> Session {
    Session { identity: identity("owner@example.com"), access_token: AccessToken::new("token-abc") }
}

/// Poll `check` until it holds or half a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// =============================================================================
// MockAuth
// =============================================================================

pub struct MockAuth {
    pub user: Mutex<Option<Identity>>,
    pub fail_current_user: AtomicBool,
    /// When set, `access_token` fails with `token_failure`.
    pub fail_access_token: AtomicBool,
    pub token_failure: Mutex<Option<AuthError>>,
    pub current_user_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    /// When set, `current_user` parks until notified.
    pub gate: Option<Arc<Notify>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MockAuth {
    #[must_use]
    pub fn new(user: Option<Identity>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            user: Mutex::new(user),
            fail_current_user: AtomicBool::new(false),
            fail_access_token: AtomicBool::new(false),
            token_failure: Mutex::new(None),
            current_user_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            gate: None,
            events,
        }
    }

    #[must_use]
    pub fn gated(user: Option<Identity>, gate: Arc<Notify>) -> Self {
        Self { gate: Some(gate), ..Self::new(user) }
    }

    /// Deliver an auth event to every subscriber, updating the mock's user.
    pub fn emit(&self, event: AuthEvent) {
        self.user.lock().unwrap().clone_from(&event.identity);
        let _ = self.events.send(event);
    }

    /// Make every `access_token` call fail, with `failure` on the first one.
    pub fn fail_tokens_with(&self, failure: AuthError) {
        *self.token_failure.lock().unwrap() = Some(failure);
        self.fail_access_token.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait::async_trait]
impl AuthProvider for MockAuth {
    async fn current_user(&self) -> Result<Option<Identity>, AuthError> {
        self.current_user_calls.fetch_add(1, Ordering::SeqCst);
        let user = self.user.lock().unwrap().clone();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_current_user.load(Ordering::SeqCst) {
            return Err(AuthError::Request("connection refused".into()));
        }
        Ok(user)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn access_token(&self) -> Result<Option<AccessToken>, AuthError> {
        if self.fail_access_token.load(Ordering::SeqCst) {
            let failure = self.token_failure.lock().unwrap().take();
            return Err(failure.unwrap_or_else(|| AuthError::Response { status: 400, body: "invalid_grant".into() }));
        }
        Ok(self
            .user
            .lock()
            .unwrap()
            .as_ref()
            .map(|_| AccessToken::new("token-abc")))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(AuthEvent::signed_out());
        Ok(())
    }

    async fn send_magic_link(&self, _email: &str) -> Result<(), AuthError> {
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<Identity, AuthError> {
        if code != "123456" {
            return Err(AuthError::Response { status: 403, body: "invalid code".into() });
        }
        let user = identity(email);
        self.emit(AuthEvent::signed_in(user.clone()));
        Ok(user)
    }
}

// =============================================================================
// MockGenerator
// =============================================================================

pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<Value, GenerationError>>>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    /// When set, each call parks until notified.
    pub gate: Option<Arc<Notify>>,
}

impl MockGenerator {
    #[must_use]
    pub fn new(responses: Vec<Result<Value, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    #[must_use]
    pub fn gated(responses: Vec<Result<Value, GenerationError>>, gate: Arc<Notify>) -> Self {
        Self { gate: Some(gate), ..Self::new(responses) }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NameGenerator for MockGenerator {
    async fn generate(&self, _session: &Session, request: &GenerationRequest) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Transport("no scripted response".into())))
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<SavedNameRecord>>,
    pub fail_list: AtomicBool,
    pub fail_save: AtomicBool,
    pub list_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
    /// When set, each `list_names` call parks until notified.
    pub list_gate: Option<Arc<Notify>>,
}

impl MemoryStore {
    #[must_use]
    pub fn with_names(names: &[&str]) -> Self {
        let store = Self::default();
        store
            .records
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| SavedNameRecord::new(*n)));
        store
    }

    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NameStore for MemoryStore {
    async fn list_names(&self, _session: &Session) -> Result<Vec<SavedNameRecord>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.list_gate {
            gate.notified().await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Status { status: 500, body: "boom".into() });
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn save_name(&self, _session: &Session, name: &str) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StoreError::Status { status: 500, body: "boom".into() });
        }
        self.records.lock().unwrap().push(SavedNameRecord::new(name));
        Ok(())
    }
}
