//! Session store.
//!
//! The store owns the `{session, user, loading}` state and is its only
//! writer. It runs as a background task that reacts to two inputs:
//!
//! ```text
//!   AuthBackend::subscribe() ──► auth events ─┐
//!                                             ├──► resolve ──► watch::Sender<AuthState>
//!   SessionStore::refresh()  ──► commands  ───┘        │
//!                                                      ├── get_session()
//!                                                      └── get_identity() + users lookup
//! ```
//!
//! # Superseding
//!
//! Every event or refresh bumps the generation and replaces the in-flight
//! resolution. The replaced future is dropped, so a slow lookup for a
//! previous identity can never overwrite newer state:
//!
//! ```text
//! gen 1: SignedIn(A)  ── lookup A (slow) ───────────╳ dropped
//! gen 2: SignedOut    ── commit {None, None}
//! gen 3: SignedIn(B)  ── lookup B ── commit {B, user B}
//! ```
//!
//! A sign-out event commits directly without a fetch. Dropping the store
//! aborts the task, which drops the auth subscription and deregisters it.

use crate::backend::{AuthBackend, AuthEvent, DataBackend, Query, Subscription, Table};
use crate::service::Gate;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use taskdeck_auth::{AuthState, Session, User};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Resolution = Pin<Box<dyn Future<Output = (Option<Session>, Option<User>)> + Send>>;

/// Owner of the authentication state.
///
/// Must be created inside a tokio runtime.
pub struct SessionStore {
    state_rx: watch::Receiver<AuthState>,
    refresh_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl SessionStore {
    /// Starts the store and its initial resolution.
    pub fn start<B>(backend: Arc<B>) -> Self
    where
        B: AuthBackend + DataBackend + ?Sized + 'static,
    {
        let (state_tx, state_rx) = watch::channel(AuthState::initial());
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        // Register before the first fetch so no event is missed.
        let events = backend.subscribe();
        let task = tokio::spawn(run(backend, events, refresh_rx, state_tx));
        Self {
            state_rx,
            refresh_tx,
            task,
        }
    }

    /// Returns the latest published state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state_rx.borrow().clone()
    }

    /// Returns a receiver for state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_rx.clone()
    }

    /// Returns a permission gate bound to this store's state.
    #[must_use]
    pub fn gate(&self) -> Gate {
        Gate::new(self.subscribe())
    }

    /// Re-runs the session and user fetch.
    pub fn refresh(&self) {
        if self.refresh_tx.send(()).is_err() {
            warn!("session store task is gone, refresh ignored");
        }
    }

    /// Waits for the first state that is not loading.
    pub async fn resolved(&self) -> AuthState {
        self.settled_after(0).await
    }

    /// Waits for a settled state newer than `generation`.
    pub async fn settled_after(&self, generation: u64) -> AuthState {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|s| !s.loading && s.generation > generation)
            .await
            .map(|state| state.clone());
        match settled {
            Ok(state) => state,
            Err(_) => rx.borrow().clone(),
        }
    }

    /// Triggers a refresh and waits for its result.
    pub async fn refresh_and_wait(&self) -> AuthState {
        let current = self.state_rx.borrow().generation;
        self.refresh();
        self.settled_after(current).await
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.state_rx.borrow())
            .finish()
    }
}

async fn run<B>(
    backend: Arc<B>,
    mut events: Subscription<AuthEvent>,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
    state_tx: watch::Sender<AuthState>,
) where
    B: AuthBackend + DataBackend + ?Sized + 'static,
{
    let mut generation: u64 = 1;
    let mut pending: Option<Resolution> = Some(resolve(Arc::clone(&backend), generation));
    let mut events_open = true;

    loop {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(event) => {
                    generation += 1;
                    debug!(kind = %event.kind, generation, superseded = pending.is_some(), "auth event");
                    if event.session.is_some() {
                        start_loading(&state_tx, generation);
                        pending = Some(resolve(Arc::clone(&backend), generation));
                    } else {
                        pending = None;
                        state_tx.send_replace(AuthState::resolved(None, None, generation));
                    }
                }
                None => {
                    debug!("auth event stream closed");
                    events_open = false;
                }
            },
            cmd = refresh_rx.recv() => match cmd {
                Some(()) => {
                    generation += 1;
                    debug!(generation, superseded = pending.is_some(), "session refresh requested");
                    start_loading(&state_tx, generation);
                    pending = Some(resolve(Arc::clone(&backend), generation));
                }
                None => break,
            },
            (session, user) = next_resolution(&mut pending) => {
                pending = None;
                debug!(
                    generation,
                    signed_in = session.is_some(),
                    user = ?user.as_ref().map(|u| u.id),
                    "auth state resolved"
                );
                state_tx.send_replace(AuthState::resolved(session, user, generation));
            }
        }
    }
}

fn start_loading(state_tx: &watch::Sender<AuthState>, generation: u64) {
    state_tx.send_modify(|state| {
        state.loading = true;
        state.generation = generation;
    });
}

async fn next_resolution(pending: &mut Option<Resolution>) -> (Option<Session>, Option<User>) {
    match pending.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

fn resolve<B>(backend: Arc<B>, generation: u64) -> Resolution
where
    B: AuthBackend + DataBackend + ?Sized + 'static,
{
    Box::pin(async move {
        let session = match backend.get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(generation, error = %e, "failed to fetch session, treating as signed out");
                return (None, None);
            }
        };
        let Some(session) = session else {
            return (None, None);
        };
        let user = fetch_user(backend.as_ref(), generation).await;
        (Some(session), user)
    })
}

/// Looks up the `users` row for the active identity.
async fn fetch_user<B>(backend: &B, generation: u64) -> Option<User>
where
    B: AuthBackend + DataBackend + ?Sized,
{
    let identity = match backend.get_identity().await {
        Ok(id) => id,
        Err(e) => {
            warn!(generation, error = %e, "failed to resolve identity");
            return None;
        }
    };
    let query = Query::new()
        .columns(&["id", "name", "role"])
        .eq("id", identity.to_string());
    let rows = match backend.select(Table::Users, &query).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(generation, user = %identity, error = %e, "user lookup failed");
            return None;
        }
    };
    let Some(row) = rows.into_iter().next() else {
        warn!(generation, user = %identity, "no user record for identity");
        return None;
    };
    match serde_json::from_value::<User>(row) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(generation, user = %identity, error = %e, "malformed user record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use taskdeck_auth::Role;

    #[tokio::test]
    async fn starts_loading_then_signed_out() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SessionStore::start(backend);
        let state = store.resolved().await;
        assert!(!state.loading);
        assert!(state.session.is_none());
        assert!(state.user.is_none());
        assert_eq!(state.generation, 1);
    }

    #[tokio::test]
    async fn sign_in_resolves_user() {
        let backend = Arc::new(MemoryBackend::new());
        let id = backend.add_user("a@x.io", "pw", "Ana", Some(Role::Admin));
        let store = SessionStore::start(Arc::clone(&backend));
        let first = store.resolved().await;

        backend.sign_in_with_password("a@x.io", "pw").await.unwrap();
        let state = store.settled_after(first.generation).await;
        assert_eq!(state.user.as_ref().map(|u| u.id), Some(id));
        assert!(state.permissions().is_admin());
    }

    #[tokio::test]
    async fn refresh_picks_up_role_change() {
        let backend = Arc::new(MemoryBackend::new());
        let id = backend.add_user("m@x.io", "pw", "Mia", Some(Role::Member));
        backend.sign_in_with_password("m@x.io", "pw").await.unwrap();
        let store = SessionStore::start(Arc::clone(&backend));
        assert!(store.resolved().await.permissions().is_member());

        backend.set_column(Table::Users, id.uuid(), "role", "admin".into());
        let state = store.refresh_and_wait().await;
        assert!(state.permissions().is_admin());
    }

    #[tokio::test]
    async fn drop_deregisters_listener() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SessionStore::start(Arc::clone(&backend));
        store.resolved().await;
        assert_eq!(backend.auth_listener_count(), 1);

        drop(store);
        for _ in 0..100 {
            if backend.auth_listener_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(backend.auth_listener_count(), 0);
    }
}
