//! In-process backend.
//!
//! [`MemoryBackend`] keeps accounts, the active session and every table in
//! memory and implements all three collaborator traits. It backs the
//! integration tests and local demos.
//!
//! # Test Hooks
//!
//! | Hook | Effect |
//! |------|--------|
//! | [`set_lookup_delay`](MemoryBackend::set_lookup_delay) | delays `users` lookups for one id |
//! | [`set_table_delay`](MemoryBackend::set_table_delay) | delays every select on a table |
//! | [`fail_table`](MemoryBackend::fail_table) | every operation on a table fails |
//! | [`suppress_write_results`](MemoryBackend::suppress_write_results) | writes succeed but return no rows |
//! | [`expire_session`](MemoryBackend::expire_session) | marks the active session expired |
//!
//! Delays use `tokio::time::sleep`, so tests can run them under a paused
//! clock.

use super::{
    AuthBackend, AuthEvent, AuthEventKind, ChangeFilter, ChangeKind, ChangeNotice, DataBackend,
    Listeners, Query, RealtimeBackend, Subscription, Table,
};
use crate::error::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use taskdeck_auth::{Role, Session};
use taskdeck_types::UserId;
use uuid::Uuid;

/// Default lifetime of sessions issued by the memory backend.
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

struct Account {
    password: String,
    user_id: UserId,
}

struct MemoryState {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    rows: HashMap<Table, Vec<Value>>,
    lookup_delays: HashMap<UserId, Duration>,
    table_delays: HashMap<Table, Duration>,
    failures: HashMap<Table, String>,
    blank_writes: HashSet<Table>,
    token_seq: u64,
    last_stamp: DateTime<Utc>,
    session_ttl: chrono::Duration,
}

impl MemoryState {
    /// Strictly increasing timestamp, so `created_at` ordering is total.
    fn stamp(&mut self) -> String {
        let now = Utc::now();
        let next = if now > self.last_stamp {
            now
        } else {
            self.last_stamp + chrono::Duration::microseconds(1)
        };
        self.last_stamp = next;
        next.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn issue_session(&mut self, user_id: UserId, email: Option<String>) -> Session {
        self.token_seq += 1;
        let seq = self.token_seq;
        let mut session = Session::new(format!("mem-access-{seq}"), user_id)
            .with_refresh_token(format!("mem-refresh-{seq}"))
            .with_expiry(Utc::now() + self.session_ttl);
        session.email = email;
        session
    }

    fn check_failure(&self, table: Table) -> Result<(), BackendError> {
        match self.failures.get(&table) {
            Some(message) => Err(BackendError::Rejected(message.clone())),
            None => Ok(()),
        }
    }

    fn select_delay(&self, table: Table, query: &Query) -> Option<Duration> {
        if table == Table::Users {
            let lookup = query
                .filters()
                .iter()
                .filter(|(c, _)| c == "id")
                .filter_map(|(_, v)| v.as_str()?.parse::<UserId>().ok())
                .find_map(|id| self.lookup_delays.get(&id).copied());
            if lookup.is_some() {
                return lookup;
            }
        }
        self.table_delays.get(&table).copied()
    }

    fn run_select(&self, table: Table, query: &Query) -> Vec<Value> {
        let Some(rows) = self.rows.get(&table) else {
            return Vec::new();
        };
        let mut out: Vec<Value> = rows.iter().filter(|r| query.matches(r)).cloned().collect();
        query.sort(&mut out);
        out.into_iter()
            .map(|row| self.shape(row, query))
            .collect()
    }

    fn shape(&self, row: Value, query: &Query) -> Value {
        let Value::Object(full) = row else {
            return row;
        };
        let mut shaped = project(&full, query.selected_columns());
        for embed in query.embeds() {
            let related = full
                .get(&embed.foreign_key)
                .filter(|v| !v.is_null())
                .and_then(|key| {
                    self.rows
                        .get(&embed.table)?
                        .iter()
                        .find(|r| r.get("id") == Some(key))
                })
                .and_then(Value::as_object)
                .map(|r| Value::Object(project(r, &embed.columns)))
                .unwrap_or(Value::Null);
            shaped.insert(embed.alias.clone(), related);
        }
        Value::Object(shaped)
    }
}

fn project(row: &Map<String, Value>, columns: &[String]) -> Map<String, Value> {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    columns
        .iter()
        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
        .collect()
}

fn id_matches(row: &Value, id: Uuid) -> bool {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Uuid>().ok())
        == Some(id)
}

/// In-memory implementation of every backend trait.
///
/// # Example
///
/// ```
/// use taskdeck_auth::Role;
/// use taskdeck_runtime::backend::{AuthBackend, MemoryBackend};
///
/// # tokio_test_block_on(async {
/// let backend = MemoryBackend::new();
/// let id = backend.add_user("ana@example.com", "pw", "Ana", Some(Role::Admin));
///
/// let session = backend.sign_in_with_password("ana@example.com", "pw").await.unwrap();
/// assert_eq!(session.user_id, id);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    auth_events: Listeners<AuthEvent>,
    changes: Listeners<ChangeNotice>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                accounts: HashMap::new(),
                session: None,
                rows: HashMap::new(),
                lookup_delays: HashMap::new(),
                table_delays: HashMap::new(),
                failures: HashMap::new(),
                blank_writes: HashSet::new(),
                token_seq: 0,
                last_stamp: DateTime::<Utc>::MIN_UTC,
                session_ttl: chrono::Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            }),
            auth_events: Listeners::new(),
            changes: Listeners::new(),
        }
    }

    /// Sets the lifetime of sessions issued from now on.
    #[must_use]
    pub fn with_session_ttl(self, ttl: chrono::Duration) -> Self {
        self.state.lock().session_ttl = ttl;
        self
    }

    /// Registers login credentials for an existing user id.
    pub fn add_account(&self, email: &str, password: &str, user_id: UserId) {
        self.state.lock().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user_id,
            },
        );
    }

    /// Creates a `users` row and matching login credentials.
    pub fn add_user(&self, email: &str, password: &str, name: &str, role: Option<Role>) -> UserId {
        let id = UserId::new();
        self.insert_row(
            Table::Users,
            serde_json::json!({
                "id": id,
                "name": name,
                "role": role.map(|r| r.as_str()),
            }),
        );
        self.add_account(email, password, id);
        id
    }

    /// Stores a row as-is, filling `id` and `created_at` when absent.
    ///
    /// Emits no change notice.
    pub fn insert_row(&self, table: Table, row: Value) -> Value {
        let mut state = self.state.lock();
        let row = Self::complete_row(&mut state, row);
        state.rows.entry(table).or_default().push(row.clone());
        row
    }

    /// Returns every stored row of `table`, unordered.
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.state
            .lock()
            .rows
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Overwrites one column of the row with `id`. Emits no change notice.
    pub fn set_column(&self, table: Table, id: Uuid, column: &str, value: Value) -> bool {
        let mut state = self.state.lock();
        let Some(row) = state
            .rows
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| id_matches(r, id)))
        else {
            return false;
        };
        if let Some(map) = row.as_object_mut() {
            map.insert(column.to_string(), value);
        }
        true
    }

    pub fn set_lookup_delay(&self, user_id: UserId, delay: Duration) {
        self.state.lock().lookup_delays.insert(user_id, delay);
    }

    pub fn set_table_delay(&self, table: Table, delay: Duration) {
        self.state.lock().table_delays.insert(table, delay);
    }

    /// Makes every operation on `table` fail with `message`.
    pub fn fail_table(&self, table: Table, message: impl Into<String>) {
        self.state.lock().failures.insert(table, message.into());
    }

    pub fn clear_failure(&self, table: Table) {
        self.state.lock().failures.remove(&table);
    }

    /// Makes writes on `table` return no rows while still applying them.
    pub fn suppress_write_results(&self, table: Table) {
        self.state.lock().blank_writes.insert(table);
    }

    /// Marks the active session as expired.
    pub fn expire_session(&self) {
        let mut state = self.state.lock();
        if let Some(session) = state.session.as_mut() {
            session.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        }
    }

    /// Emits a [`AuthEventKind::UserUpdated`] event for the active session.
    pub fn notify_user_updated(&self) {
        let session = self.state.lock().session.clone();
        self.emit_auth(AuthEventKind::UserUpdated, session);
    }

    /// Number of registered auth listeners.
    #[must_use]
    pub fn auth_listener_count(&self) -> usize {
        self.auth_events.len()
    }

    /// Number of registered change listeners.
    #[must_use]
    pub fn change_listener_count(&self) -> usize {
        self.changes.len()
    }

    fn complete_row(state: &mut MemoryState, row: Value) -> Value {
        let Value::Object(mut map) = row else {
            return row;
        };
        if !map.contains_key("id") {
            map.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if !map.contains_key("created_at") {
            map.insert("created_at".into(), Value::String(state.stamp()));
        }
        Value::Object(map)
    }

    fn emit_auth(&self, kind: AuthEventKind, session: Option<Session>) {
        let delivered = self.auth_events.emit(&AuthEvent::new(kind, session));
        tracing::debug!(%kind, delivered, "memory backend auth event");
    }

    fn emit_change(&self, table: Table, kind: ChangeKind, record: Value) {
        let delivered = self.changes.emit(&ChangeNotice {
            table,
            kind,
            record,
        });
        tracing::trace!(%table, ?kind, delivered, "memory backend change notice");
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.state.lock().session.clone())
    }

    async fn get_identity(&self) -> Result<UserId, BackendError> {
        let state = self.state.lock();
        match state.session.as_ref() {
            Some(s) if s.is_expired_at(Utc::now()) => Err(BackendError::Unauthorized {
                message: "token expired".into(),
            }),
            Some(s) => Ok(s.user_id),
            None => Err(BackendError::NoSession),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let session = {
            let mut state = self.state.lock();
            let user_id = match state.accounts.get(email) {
                Some(account) if account.password == password => account.user_id,
                _ => return Err(BackendError::InvalidCredentials),
            };
            let session = state.issue_session(user_id, Some(email.to_string()));
            state.session = Some(session.clone());
            session
        };
        self.emit_auth(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.state.lock().session = None;
        self.emit_auth(AuthEventKind::SignedOut, None);
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, BackendError> {
        let session = {
            let mut state = self.state.lock();
            let current = state.session.clone().ok_or(BackendError::NoSession)?;
            if current.refresh_token.is_none() {
                return Err(BackendError::Unauthorized {
                    message: "no refresh token".into(),
                });
            }
            let session = state.issue_session(current.user_id, current.email);
            state.session = Some(session.clone());
            session
        };
        self.emit_auth(AuthEventKind::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    async fn set_session(&self, session: Session) -> Result<Session, BackendError> {
        let (session, kind) = {
            let mut state = self.state.lock();
            if session.is_expired_at(Utc::now()) {
                if session.refresh_token.is_none() {
                    return Err(BackendError::Unauthorized {
                        message: "session expired and no refresh token".into(),
                    });
                }
                let fresh = state.issue_session(session.user_id, session.email);
                state.session = Some(fresh.clone());
                (fresh, AuthEventKind::TokenRefreshed)
            } else {
                state.session = Some(session.clone());
                (session, AuthEventKind::SignedIn)
            }
        };
        self.emit_auth(kind, Some(session.clone()));
        Ok(session)
    }

    fn subscribe(&self) -> Subscription<AuthEvent> {
        self.auth_events.subscribe()
    }
}

#[async_trait]
impl DataBackend for MemoryBackend {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BackendError> {
        let delay = {
            let state = self.state.lock();
            state.check_failure(table)?;
            state.select_delay(table, query)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock();
        state.check_failure(table)?;
        Ok(state.run_select(table, query))
    }

    async fn insert(&self, table: Table, record: Value) -> Result<Vec<Value>, BackendError> {
        if !record.is_object() {
            return Err(BackendError::Rejected("record must be a JSON object".into()));
        }
        let (row, blank) = {
            let mut state = self.state.lock();
            state.check_failure(table)?;
            let row = Self::complete_row(&mut state, record);
            state.rows.entry(table).or_default().push(row.clone());
            (row, state.blank_writes.contains(&table))
        };
        self.emit_change(table, ChangeKind::Insert, row.clone());
        Ok(if blank { Vec::new() } else { vec![row] })
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let Value::Object(patch) = patch else {
            return Err(BackendError::Rejected("patch must be a JSON object".into()));
        };
        let (updated, blank) = {
            let mut state = self.state.lock();
            state.check_failure(table)?;
            let blank = state.blank_writes.contains(&table);
            let updated = state
                .rows
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|r| id_matches(r, id)))
                .map(|row| {
                    if let Some(map) = row.as_object_mut() {
                        for (k, v) in &patch {
                            map.insert(k.clone(), v.clone());
                        }
                    }
                    row.clone()
                });
            (updated, blank)
        };
        let Some(row) = updated else {
            return Ok(Vec::new());
        };
        self.emit_change(table, ChangeKind::Update, row.clone());
        Ok(if blank { Vec::new() } else { vec![row] })
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), BackendError> {
        let removed = {
            let mut state = self.state.lock();
            state.check_failure(table)?;
            state.rows.get_mut(&table).and_then(|rows| {
                let pos = rows.iter().position(|r| id_matches(r, id))?;
                Some(rows.remove(pos))
            })
        };
        if let Some(row) = removed {
            self.emit_change(table, ChangeKind::Delete, row);
        }
        Ok(())
    }
}

impl RealtimeBackend for MemoryBackend {
    fn subscribe_changes(
        &self,
        topic: &str,
        filter: ChangeFilter,
    ) -> Result<Subscription<ChangeNotice>, BackendError> {
        tracing::debug!(topic, table = %filter.table, "memory backend realtime subscribe");
        Ok(self
            .changes
            .subscribe_filtered(move |notice| filter.matches(notice)))
    }
}
