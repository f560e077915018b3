//! HTTP backend for the hosted auth and REST APIs.
//!
//! ```text
//! RestBackend
//!   ├── auth:  POST {url}/auth/v1/token?grant_type=password|refresh_token
//!   │          POST {url}/auth/v1/logout
//!   │          GET  {url}/auth/v1/user
//!   └── data:  GET/POST/PATCH/DELETE {url}/rest/v1/{table}
//!              ?select=...&col=eq.value&order=col.desc
//! ```
//!
//! Every request carries the `apikey` header. Data requests are authorized
//! with the active session's access token, falling back to the anon key.
//! Writes ask for `Prefer: return=representation` so the stored rows come
//! back.
//!
//! Realtime is not implemented over HTTP:
//! [`subscribe_changes`](RealtimeBackend::subscribe_changes) returns
//! [`BackendError::Unsupported`].

use super::{
    AuthBackend, AuthEvent, AuthEventKind, ChangeFilter, ChangeNotice, DataBackend, Listeners,
    Query, RealtimeBackend, SortOrder, Subscription, Table,
};
use crate::error::BackendError;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use taskdeck_auth::Session;
use taskdeck_types::UserId;
use uuid::Uuid;

/// Maximum length of a response body quoted in an error.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let mut session = Session::new(self.access_token, self.user.id);
        session.refresh_token = self.refresh_token;
        session.email = self.user.email;
        session.expires_at = self
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        session
    }
}

/// HTTP client for the hosted backend.
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Mutex<Option<Session>>,
    auth_events: Listeners<AuthEvent>,
}

impl RestBackend {
    /// Creates a client for the project at `base_url`.
    ///
    /// # Errors
    ///
    /// [`BackendError::Network`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session: Mutex::new(None),
            auth_events: Listeners::new(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn rest_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn bearer(&self) -> String {
        self.session
            .lock()
            .as_ref()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token.clone())
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let resp = req.send().await.map_err(classify_transport)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &body))
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let resp = self.send(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn token_grant(&self, grant: &str, body: Value) -> Result<Session, BackendError> {
        let url = format!("{}?grant_type={grant}", self.auth_url("token"));
        let req = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body);
        let token: TokenResponse = match self.send_json(req).await {
            Err(BackendError::Status { status: 400, .. }) | Err(BackendError::Rejected(_))
                if grant == "password" =>
            {
                return Err(BackendError::InvalidCredentials)
            }
            other => other?,
        };
        Ok(token.into_session())
    }

    fn adopt(&self, session: Session, kind: AuthEventKind) -> Session {
        *self.session.lock() = Some(session.clone());
        let delivered = self
            .auth_events
            .emit(&AuthEvent::new(kind, Some(session.clone())));
        tracing::debug!(%kind, user = %session.user_id, delivered, "session adopted");
        session
    }
}

/// Query-string parameters for a select.
fn select_params(query: &Query) -> Vec<(String, String)> {
    let mut select: Vec<String> = if query.selected_columns().is_empty() {
        vec!["*".to_string()]
    } else {
        query.selected_columns().to_vec()
    };
    for embed in query.embeds() {
        select.push(format!(
            "{}:{}!{}({})",
            embed.alias,
            embed.table,
            embed.foreign_key,
            embed.columns.join(",")
        ));
    }

    let mut params = vec![("select".to_string(), select.join(","))];
    for (column, value) in query.filters() {
        params.push((column.clone(), format!("eq.{}", filter_literal(value))));
    }
    if let Some((column, order)) = query.ordering() {
        let dir = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        params.push(("order".to_string(), format!("{column}.{dir}")));
    }
    params
}

fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Classify HTTP status code into an error kind string.
fn classify_http_status(status: u16) -> &'static str {
    match status {
        400 | 409 | 422 => "rejected",
        401 | 403 => "auth_error",
        404 => "not_found",
        429 => "rate_limit",
        500..=599 => "server_error",
        _ => "http_error",
    }
}

fn status_error(status: u16, body: &str) -> BackendError {
    let message = error_message(body);
    match classify_http_status(status) {
        "auth_error" => BackendError::Unauthorized { message },
        "rejected" if status != 400 => BackendError::Rejected(message),
        kind => BackendError::Status {
            status,
            kind,
            message,
        },
    }
}

/// Extracts the backend's message field, or a truncated body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| truncate_for_error(body, MAX_ERROR_BODY).to_string())
}

fn classify_transport(error: reqwest::Error) -> BackendError {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else if error.is_decode() {
        return BackendError::Decode(error.to_string());
    } else {
        "network"
    };
    BackendError::Network(format!("{kind}: {error}"))
}

/// Truncate a string for safe inclusion in error messages.
fn truncate_for_error(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

fn id_filter(id: Uuid) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.session.lock().clone())
    }

    async fn get_identity(&self) -> Result<UserId, BackendError> {
        if self.session.lock().is_none() {
            return Err(BackendError::NoSession);
        }
        let req = self.request(reqwest::Method::GET, &self.auth_url("user"));
        let user: TokenUser = self.send_json(req).await?;
        Ok(user.id)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let session = self
            .token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        Ok(self.adopt(session, AuthEventKind::SignedIn))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let had_session = self.session.lock().is_some();
        let remote = if had_session {
            let req = self.request(reqwest::Method::POST, &self.auth_url("logout"));
            match self.send(req).await {
                Ok(_) | Err(BackendError::Unauthorized { .. }) => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            Ok(())
        };

        *self.session.lock() = None;
        self.auth_events
            .emit(&AuthEvent::new(AuthEventKind::SignedOut, None));
        remote
    }

    async fn refresh_session(&self) -> Result<Session, BackendError> {
        let refresh_token = self
            .session
            .lock()
            .as_ref()
            .ok_or(BackendError::NoSession)?
            .refresh_token
            .clone()
            .ok_or_else(|| BackendError::Unauthorized {
                message: "no refresh token".into(),
            })?;
        let session = self
            .token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;
        Ok(self.adopt(session, AuthEventKind::TokenRefreshed))
    }

    async fn set_session(&self, session: Session) -> Result<Session, BackendError> {
        if !session.is_expired_at(Utc::now()) {
            return Ok(self.adopt(session, AuthEventKind::SignedIn));
        }
        let refresh_token = session
            .refresh_token
            .clone()
            .ok_or_else(|| BackendError::Unauthorized {
                message: "session expired and no refresh token".into(),
            })?;
        let fresh = self
            .token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;
        Ok(self.adopt(fresh, AuthEventKind::TokenRefreshed))
    }

    fn subscribe(&self) -> Subscription<AuthEvent> {
        self.auth_events.subscribe()
    }
}

#[async_trait]
impl DataBackend for RestBackend {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, BackendError> {
        let req = self
            .request(reqwest::Method::GET, &self.rest_url(table))
            .query(&select_params(query));
        self.send_json(req).await
    }

    async fn insert(&self, table: Table, record: Value) -> Result<Vec<Value>, BackendError> {
        let req = self
            .request(reqwest::Method::POST, &self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(&record);
        self.send_json(req).await
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let req = self
            .request(reqwest::Method::PATCH, &self.rest_url(table))
            .query(&id_filter(id))
            .header("Prefer", "return=representation")
            .json(&patch);
        self.send_json(req).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), BackendError> {
        let req = self
            .request(reqwest::Method::DELETE, &self.rest_url(table))
            .query(&id_filter(id));
        self.send(req).await.map(|_| ())
    }
}

impl RealtimeBackend for RestBackend {
    fn subscribe_changes(
        &self,
        topic: &str,
        _filter: ChangeFilter,
    ) -> Result<Subscription<ChangeNotice>, BackendError> {
        tracing::debug!(topic, "realtime requested from REST backend");
        Err(BackendError::Unsupported("realtime subscriptions"))
    }
}
