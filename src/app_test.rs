use super::*;
use crate::net::types::AuthEvent;
use crate::test_helpers::{MemoryStore, MockAuth, MockGenerator, eventually, identity};
use crate::view::Section;
use serde_json::json;
use std::sync::atomic::Ordering;
use tokio::sync::Notify;

struct Harness {
    app: NamerApp,
    auth: Arc<MockAuth>,
    generator: Arc<MockGenerator>,
    store: Arc<MemoryStore>,
}

fn harness(user: Option<Identity>, replies: Vec<serde_json::Value>, saved: &[&str]) -> Harness {
    let auth = Arc::new(MockAuth::new(user));
    let generator = Arc::new(MockGenerator::new(replies.into_iter().map(Ok).collect()));
    let store = Arc::new(MemoryStore::with_names(saved));
    let app = NamerApp::new(
        Arc::clone(&auth) as Arc<dyn AuthProvider>,
        Arc::clone(&generator) as Arc<dyn NameGenerator>,
        Arc::clone(&store) as Arc<dyn NameStore>,
    );
    Harness { app, auth, generator, store }
}

fn saved_names(app: &NamerApp) -> Vec<String> {
    app.view_model().saved.into_iter().map(|r| r.name).collect()
}

// =============================================================================
// mount / session gating
// =============================================================================

#[tokio::test]
async fn signed_out_mount_renders_sign_in_and_skips_fetch() {
    let h = harness(None, vec![], &["Rex"]);
    h.app.mount().await;

    assert_eq!(h.app.view(), View::SignIn);
    tokio::task::yield_now().await;
    assert_eq!(h.store.list_calls(), 0);
}

#[tokio::test]
async fn signed_in_mount_fetches_saved_names_once() {
    let h = harness(Some(identity("ada@example.com")), vec![], &["Rex", "Milo"]);
    h.app.mount().await;

    assert!(matches!(h.app.view(), View::Home(_)));
    assert!(eventually(|| saved_names(&h.app) == ["Rex", "Milo"]).await);
    assert_eq!(h.store.list_calls(), 1);
}

#[tokio::test]
async fn sign_in_event_triggers_fetch() {
    let h = harness(None, vec![], &["Rex"]);
    h.app.mount().await;

    h.auth.emit(AuthEvent::signed_in(identity("ada@example.com")));

    assert!(eventually(|| saved_names(&h.app) == ["Rex"]).await);
    assert!(matches!(h.app.view(), View::Home(_)));
}

#[tokio::test]
async fn token_refresh_does_not_refetch() {
    let user = identity("ada@example.com");
    let h = harness(Some(user.clone()), vec![], &["Rex"]);
    h.app.mount().await;
    assert!(eventually(|| h.store.list_calls() == 1).await);

    h.auth.emit(AuthEvent::token_refreshed(user));
    h.auth.emit(AuthEvent::signed_out());
    assert!(eventually(|| h.app.identity().is_none()).await);

    assert_eq!(h.store.list_calls(), 1);
}

#[tokio::test]
async fn sign_out_switches_to_sign_in_view() {
    let h = harness(Some(identity("ada@example.com")), vec![], &["Rex"]);
    h.app.mount().await;
    assert!(eventually(|| saved_names(&h.app) == ["Rex"]).await);

    h.app.sign_out().await;

    assert_eq!(h.app.view(), View::SignIn);
    assert_eq!(h.auth.sign_out_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_token_falls_back_to_sign_in() {
    let h = harness(Some(identity("ada@example.com")), vec![json!({ "names": ["Rex"] })], &[]);
    h.app.mount().await;
    assert!(matches!(h.app.view(), View::Home(_)));
    h.auth.fail_tokens_with(AuthError::Response { status: 400, body: "invalid_grant".into() });
    h.app.set_pet_type("dog");

    h.app.generate_names().await;

    assert_eq!(h.app.view(), View::SignIn);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn sign_in_again_refetches() {
    let user = identity("ada@example.com");
    let h = harness(Some(user.clone()), vec![], &["Rex"]);
    h.app.mount().await;
    assert!(eventually(|| h.store.list_calls() == 1).await);

    h.auth.emit(AuthEvent::signed_out());
    assert!(eventually(|| h.app.identity().is_none()).await);
    h.auth.emit(AuthEvent::signed_in(user));

    assert!(eventually(|| h.store.list_calls() == 2).await);
}

#[tokio::test]
async fn sign_out_and_back_in_during_slow_fetch_refetches() {
    let user = identity("ada@example.com");
    let gate = Arc::new(Notify::new());
    let auth = Arc::new(MockAuth::new(Some(user.clone())));
    let store = Arc::new(MemoryStore { list_gate: Some(Arc::clone(&gate)), ..MemoryStore::with_names(&["Rex"]) });
    let app = NamerApp::new(
        Arc::clone(&auth) as Arc<dyn AuthProvider>,
        Arc::new(MockGenerator::new(vec![])) as Arc<dyn NameGenerator>,
        Arc::clone(&store) as Arc<dyn NameStore>,
    );
    app.mount().await;
    assert!(eventually(|| store.list_calls() == 1).await);

    // Both transitions land while the first fetch is parked.
    auth.emit(AuthEvent::signed_out());
    assert!(eventually(|| app.identity().is_none()).await);
    auth.emit(AuthEvent::signed_in(user));
    assert!(eventually(|| app.identity().is_some()).await);
    gate.notify_one();

    assert!(eventually(|| store.list_calls() == 2).await);
    gate.notify_one();
    assert!(eventually(|| saved_names(&app) == ["Rex"]).await);
    app.unmount();
}

#[tokio::test]
async fn verify_code_signs_in_through_controller() {
    let h = harness(None, vec![], &["Rex"]);
    h.app.mount().await;

    h.app.send_magic_link("ada@example.com").await.unwrap();
    h.app.verify_code("ada@example.com", "123456").await.unwrap();

    assert!(matches!(h.app.view(), View::Home(_)));
    assert!(eventually(|| saved_names(&h.app) == ["Rex"]).await);
}

// =============================================================================
// mount lifecycle
// =============================================================================

#[tokio::test]
async fn repeated_mount_is_idempotent() {
    let h = harness(None, vec![], &[]);
    h.app.mount().await;
    h.app.mount().await;

    assert!(h.app.is_mounted());
    assert_eq!(h.auth.receiver_count(), 1);
    assert_eq!(h.auth.current_user_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unmount_releases_subscription() {
    let h = harness(None, vec![], &[]);
    for _ in 0..3 {
        h.app.mount().await;
        h.app.unmount();
        h.app.unmount();
    }

    assert!(!h.app.is_mounted());
    assert!(eventually(|| h.auth.receiver_count() == 0).await);

    h.auth.emit(AuthEvent::signed_in(identity("ada@example.com")));
    tokio::task::yield_now().await;
    assert!(h.app.identity().is_none());
}

// =============================================================================
// generate / save
// =============================================================================

#[tokio::test]
async fn generate_fills_candidates_from_form() {
    let h = harness(
        Some(identity("ada@example.com")),
        vec![json!({ "names": ["Rex", "Milo", "Fido", "Buddy", "Jack"] })],
        &[],
    );
    h.app.mount().await;
    h.app.set_pet_type("dog");
    h.app.set_characteristics("small, playful");

    h.app.generate_names().await;

    assert_eq!(h.app.view_model().candidates, ["Rex", "Milo", "Fido", "Buddy", "Jack"]);
    assert!(!h.app.view_model().loading);
    let prompt = h.generator.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("dog") && prompt.contains("small, playful"));
    // The form is not cleared after generating.
    assert_eq!(h.app.pet(), PetDescription::new("dog", "small, playful"));
}

#[tokio::test]
async fn generate_while_signed_out_is_ignored() {
    let h = harness(None, vec![json!({ "names": ["Rex"] })], &[]);
    h.app.mount().await;
    h.app.set_pet_type("dog");

    h.app.generate_names().await;

    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn saving_candidate_keeps_it_in_candidate_list() {
    let h = harness(Some(identity("ada@example.com")), vec![json!({ "names": ["Rex", "Milo"] })], &[]);
    h.app.mount().await;
    assert!(eventually(|| h.store.list_calls() == 1).await);
    h.app.set_pet_type("dog");
    h.app.generate_names().await;

    let name = h.app.candidate(2).unwrap();
    h.app.save_name(&name).await;

    assert_eq!(saved_names(&h.app), ["Milo"]);
    assert_eq!(h.app.view_model().candidates, ["Rex", "Milo"]);
    let View::Home(home) = h.app.view() else { panic!("expected home view") };
    assert!(matches!(home.saved, Section::Rows(ref names) if names == &["Milo".to_string()]));
}

#[tokio::test]
async fn failed_save_leaves_saved_list_unchanged() {
    let h = harness(Some(identity("ada@example.com")), vec![], &["Rex"]);
    h.app.mount().await;
    assert!(eventually(|| saved_names(&h.app) == ["Rex"]).await);
    h.store.fail_save.store(true, Ordering::SeqCst);

    h.app.save_name("Biscuit").await;

    assert_eq!(saved_names(&h.app), ["Rex"]);
    assert_eq!(h.store.list_calls(), 1);
}

#[test]
fn candidate_index_is_one_based() {
    let h = harness(None, vec![], &[]);
    assert_eq!(h.app.candidate(0), None);
    assert_eq!(h.app.candidate(1), None);
}
