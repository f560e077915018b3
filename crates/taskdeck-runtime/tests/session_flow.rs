//! Integration tests for the session store against the memory backend.
//!
//! Tests the complete flow: auth events → SessionStore → RouteGuard

use std::sync::Arc;
use std::time::Duration;
use taskdeck_auth::{GuardConfig, GuardState, Role, RouteGuard, Session};
use taskdeck_runtime::backend::{AuthBackend, MemoryBackend, Table};
use taskdeck_runtime::SessionStore;
use taskdeck_types::UserId;

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Sign-out then sign-in as someone else while the first lookup is slow
#[tokio::test(start_paused = true)]
async fn stale_lookup_never_overwrites_newer_identity() {
    let backend = Arc::new(MemoryBackend::new());
    let ana = backend.add_user("ana@x.io", "pw", "Ana", Some(Role::Admin));
    let ben = backend.add_user("ben@x.io", "pw", "Ben", Some(Role::Member));
    backend.set_lookup_delay(ana, Duration::from_secs(5));

    let store = SessionStore::start(Arc::clone(&backend));
    let initial = store.resolved().await;

    backend
        .sign_in_with_password("ana@x.io", "pw")
        .await
        .expect("ana should sign in");
    settle().await;
    assert!(store.state().loading, "ana's lookup should still be running");

    backend.sign_out().await.expect("sign out should succeed");
    backend
        .sign_in_with_password("ben@x.io", "pw")
        .await
        .expect("ben should sign in");

    // Three events: sign-in, sign-out, sign-in.
    let state = store.settled_after(initial.generation + 2).await;
    assert_eq!(state.user.as_ref().map(|u| u.id), Some(ben));
    assert!(state.permissions().is_member());

    // Past ana's delay: nothing late may land.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let state = store.state();
    assert_eq!(state.user.as_ref().map(|u| u.id), Some(ben));
    assert_eq!(state.session.as_ref().map(|s| s.user_id), Some(ben));
    assert!(!state.loading);
}

/// Sign-out commits immediately, even with a slow lookup in flight
#[tokio::test(start_paused = true)]
async fn sign_out_cancels_pending_lookup() {
    let backend = Arc::new(MemoryBackend::new());
    let ana = backend.add_user("ana@x.io", "pw", "Ana", Some(Role::Admin));
    backend.set_lookup_delay(ana, Duration::from_secs(5));

    let store = SessionStore::start(Arc::clone(&backend));
    let initial = store.resolved().await;

    backend.sign_in_with_password("ana@x.io", "pw").await.unwrap();
    settle().await;
    backend.sign_out().await.unwrap();

    let state = store.settled_after(initial.generation + 1).await;
    assert!(state.session.is_none());
    assert!(state.user.is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(store.state().user.is_none());
}

#[tokio::test]
async fn guard_follows_store() {
    let backend = Arc::new(MemoryBackend::new());
    let mia = backend.add_user("mia@x.io", "pw", "Mia", Some(Role::Member));
    let store = SessionStore::start(Arc::clone(&backend));

    let member_page: RouteGuard = RouteGuard::default();
    let admin_page: RouteGuard = RouteGuard::new(GuardConfig::new().require_admin());

    assert_eq!(member_page.state(&store.state()), GuardState::Loading);
    let state = store.resolved().await;
    assert_eq!(member_page.evaluate(&state).redirect_target(), Some("/login"));

    backend.sign_in_with_password("mia@x.io", "pw").await.unwrap();
    let state = store.settled_after(state.generation).await;
    assert!(member_page.evaluate(&state).renders_children());
    assert_eq!(admin_page.state(&state), GuardState::Unauthorized);
    assert_eq!(admin_page.evaluate(&state).redirect_target(), Some("/home"));

    backend.set_column(Table::Users, mia.uuid(), "role", "Admin".into());
    let state = store.refresh_and_wait().await;
    assert!(admin_page.evaluate(&state).renders_children());
}

/// A session whose user row is missing grants nothing
#[tokio::test]
async fn session_without_user_row_is_not_authorized() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_account("ghost@x.io", "pw", UserId::new());
    backend.sign_in_with_password("ghost@x.io", "pw").await.unwrap();

    let store = SessionStore::start(Arc::clone(&backend));
    let state = store.resolved().await;
    assert!(state.session.is_some());
    assert!(state.user.is_none());

    let guard: RouteGuard = RouteGuard::default();
    assert!(!guard.evaluate(&state).renders_children());
    assert!(!state.permissions().can_view_project());
}

/// Failed user lookup resolves the session with no user
#[tokio::test]
async fn lookup_failure_leaves_user_empty() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user("ana@x.io", "pw", "Ana", Some(Role::Admin));
    backend.sign_in_with_password("ana@x.io", "pw").await.unwrap();
    backend.fail_table(Table::Users, "relation users is unavailable");

    let store = SessionStore::start(Arc::clone(&backend));
    let state = store.resolved().await;
    assert!(state.session.is_some());
    assert!(state.user.is_none());

    backend.clear_failure(Table::Users);
    let state = store.refresh_and_wait().await;
    assert!(state.permissions().is_admin());
}

/// Restoring an expired session refreshes it and the store follows
#[tokio::test]
async fn restored_expired_session_is_refreshed() {
    let backend = Arc::new(MemoryBackend::new());
    let ana = backend.add_user("ana@x.io", "pw", "Ana", Some(Role::Admin));
    let store = SessionStore::start(Arc::clone(&backend));
    let initial = store.resolved().await;

    let stale = Session::new("old", ana)
        .with_refresh_token("old-refresh")
        .with_expiry(chrono::Utc::now() - chrono::Duration::minutes(5));
    let fresh = backend.set_session(stale).await.expect("refresh should succeed");
    assert!(fresh.is_valid());

    let state = store.settled_after(initial.generation).await;
    assert_eq!(state.user.map(|u| u.id), Some(ana));
}

/// A user-updated event re-resolves the role without an explicit refresh
#[tokio::test]
async fn user_updated_event_reloads_role() {
    let backend = Arc::new(MemoryBackend::new());
    let mia = backend.add_user("mia@x.io", "pw", "Mia", Some(Role::Member));
    backend.sign_in_with_password("mia@x.io", "pw").await.unwrap();
    let store = SessionStore::start(Arc::clone(&backend));
    let first = store.resolved().await;
    assert!(first.permissions().is_member());

    backend.set_column(Table::Users, mia.uuid(), "role", "admin".into());
    backend.notify_user_updated();

    let state = store.settled_after(first.generation).await;
    assert!(state.permissions().is_admin());
    assert_eq!(state.user.as_ref().map(|u| u.id), Some(mia));
}
