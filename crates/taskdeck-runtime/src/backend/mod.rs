//! Backend collaborators.
//!
//! taskdeck delegates persistence, authentication and change notification to
//! a hosted backend. Three traits describe what the rest of the runtime needs
//! from it:
//!
//! | Trait | Responsibility |
//! |-------|----------------|
//! | [`AuthBackend`] | sessions, sign-in/out, token rotation, auth events |
//! | [`DataBackend`] | row CRUD on the four tables |
//! | [`RealtimeBackend`] | change notices per topic |
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryBackend`]: in-process, supports all three traits, with hooks to
//!   inject latency and failures in tests.
//! - [`RestBackend`]: HTTP client for the hosted auth and REST APIs. No
//!   realtime support.
//!
//! Rows travel as JSON objects. The typed services in
//! [`service`](crate::service) own the mapping to domain structs.

mod listeners;
pub mod memory;
pub mod rest;

pub use listeners::{Listeners, Subscription};
pub use memory::MemoryBackend;
pub use rest::RestBackend;

use crate::error::BackendError;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use taskdeck_auth::Session;
use taskdeck_types::UserId;
use uuid::Uuid;

/// Tables exposed by the data backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Projects,
    Tasks,
    Users,
    Comments,
}

impl Table {
    /// Every table, in a stable order.
    pub const ALL: [Self; 4] = [Self::Projects, Self::Tasks, Self::Users, Self::Comments];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Tasks => "tasks",
            Self::Users => "users",
            Self::Comments => "comments",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for [`Query::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A related row pulled in through a foreign key.
///
/// `tasks.assigned_to → users.id` embedded as `assigned_user: { name }` is
/// `Embed { alias: "assigned_user", table: Users, foreign_key: "assigned_to",
/// columns: ["name"] }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub alias: String,
    pub table: Table,
    pub foreign_key: String,
    pub columns: Vec<String>,
}

/// Select query: column projection, equality filters, ordering and embeds.
///
/// # Example
///
/// ```
/// use taskdeck_runtime::backend::{Query, SortOrder, Table};
///
/// let query = Query::new()
///     .columns(&["id", "name", "role"])
///     .eq("role", "member")
///     .order("name", SortOrder::Ascending);
///
/// assert!(query.matches(&serde_json::json!({ "role": "member" })));
/// assert!(!query.matches(&serde_json::json!({ "role": "admin" })));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    columns: Vec<String>,
    filters: Vec<(String, Value)>,
    order: Option<(String, SortOrder)>,
    embeds: Vec<Embed>,
}

impl Query {
    /// Selects every column with no filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the returned columns.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Adds a `column = value` filter.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn order(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order = Some((column.into(), order));
        self
    }

    /// Embeds the row of `table` referenced by `foreign_key` under `alias`.
    #[must_use]
    pub fn embed(
        mut self,
        alias: impl Into<String>,
        table: Table,
        foreign_key: impl Into<String>,
        columns: &[&str],
    ) -> Self {
        self.embeds.push(Embed {
            alias: alias.into(),
            table,
            foreign_key: foreign_key.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        });
        self
    }

    #[must_use]
    pub fn selected_columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    #[must_use]
    pub fn ordering(&self) -> Option<(&str, SortOrder)> {
        self.order.as_ref().map(|(c, o)| (c.as_str(), *o))
    }

    #[must_use]
    pub fn embeds(&self) -> &[Embed] {
        &self.embeds
    }

    /// Returns `true` if `row` satisfies every equality filter.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }

    /// Orders `rows` by the query's ordering, if any. Stable.
    pub fn sort(&self, rows: &mut [Value]) {
        if let Some((column, order)) = self.ordering() {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(column), b.get(column));
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
    }
}

/// Orders JSON scalars: nulls first, then numbers, then strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Kind of auth state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SignedIn => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed => "token_refreshed",
            Self::UserUpdated => "user_updated",
        };
        f.write_str(s)
    }
}

/// Notification from the auth backend, carrying the session after the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    #[must_use]
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row changed. Receivers treat it as a signal to re-fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    pub table: Table,
    pub kind: ChangeKind,
    /// New row for inserts and updates, old row for deletes.
    pub record: Value,
}

/// Which change notices a realtime subscription wants.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    pub table: Table,
    pub kind: Option<ChangeKind>,
    pub column_eq: Option<(String, Value)>,
}

impl ChangeFilter {
    /// Every change on `table`.
    #[must_use]
    pub fn table(table: Table) -> Self {
        Self {
            table,
            kind: None,
            column_eq: None,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: ChangeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.column_eq = Some((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn matches(&self, notice: &ChangeNotice) -> bool {
        notice.table == self.table
            && self.kind.map_or(true, |k| k == notice.kind)
            && self
                .column_eq
                .as_ref()
                .map_or(true, |(c, v)| notice.record.get(c) == Some(v))
    }
}

/// Authentication collaborator.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Returns the active session, if any.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Returns the identity behind the active session, validated by the backend.
    async fn get_identity(&self) -> Result<UserId, BackendError>;

    /// Signs in and makes the new session active.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    /// Ends the active session. Succeeds when already signed out.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Rotates the access token using the refresh token.
    async fn refresh_session(&self) -> Result<Session, BackendError>;

    /// Adopts a previously issued session, refreshing it when expired.
    async fn set_session(&self, session: Session) -> Result<Session, BackendError>;

    /// Registers an auth event listener. Dropping it deregisters.
    fn subscribe(&self) -> Subscription<AuthEvent>;
}

/// Row storage collaborator.
#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// Inserts `record` and returns the stored rows.
    async fn insert(&self, table: Table, record: Value) -> Result<Vec<Value>, BackendError>;

    /// Merges `patch` into the row with `id` and returns the updated rows.
    async fn update(&self, table: Table, id: Uuid, patch: Value)
        -> Result<Vec<Value>, BackendError>;

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), BackendError>;
}

/// Change notification collaborator.
pub trait RealtimeBackend: Send + Sync {
    /// Subscribes to changes on `topic` matching `filter`.
    ///
    /// Delivery is at-least-once and unordered across topics.
    ///
    /// # Errors
    ///
    /// [`BackendError::Unsupported`] when the backend has no realtime channel.
    fn subscribe_changes(
        &self,
        topic: &str,
        filter: ChangeFilter,
    ) -> Result<Subscription<ChangeNotice>, BackendError>;
}

/// A backend providing all three collaborators.
pub trait Backend: AuthBackend + DataBackend + RealtimeBackend {}

impl<T: AuthBackend + DataBackend + RealtimeBackend> Backend for T {}
