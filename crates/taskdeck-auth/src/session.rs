//! Session, user and auth-state types.
//!
//! - [`Session`]: what the auth service hands back after sign-in (tokens,
//!   expiry, account identity). Opaque to everything but the backend.
//! - [`User`]: the application record for that account (`users` table).
//! - [`AuthState`]: the `{session, user, loading}` triple published by the
//!   session store and consumed by guards and views.

use crate::{Permissions, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskdeck_types::UserId;

/// An authenticated session issued by the auth service.
///
/// Tokens are never printed: the [`Debug`] impl redacts them.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use taskdeck_auth::Session;
/// use taskdeck_types::UserId;
///
/// let session = Session::new("token", UserId::new())
///     .with_expiry(Utc::now() + Duration::minutes(5));
/// assert!(session.is_valid());
///
/// let expired = session.clone().with_expiry(Utc::now() - Duration::seconds(1));
/// assert!(!expired.is_valid());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for data requests.
    pub access_token: String,
    /// Token used to rotate `access_token`.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Identity of the signed-in account.
    pub user_id: UserId,
    /// Account email, when the auth service reports one.
    #[serde(default)]
    pub email: Option<String>,
    /// Expiry of `access_token`. `None` means the service did not say.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session with an access token and identity only.
    #[must_use]
    pub fn new(access_token: impl Into<String>, user_id: UserId) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            user_id,
            email: None,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns `true` if the access token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns `true` if the access token is still usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Application user record.
///
/// `role` is `None` when the stored role is missing or not one of the
/// canonical roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "crate::role::deserialize_lenient")]
    pub role: Option<Role>,
}

impl User {
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }

    /// Resolves this user's permissions.
    #[must_use]
    pub fn permissions(&self) -> Permissions {
        Permissions::resolve(self.role)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Some(role) => write!(f, "{} ({role})", self.name),
            None => write!(f, "{} (no role)", self.name),
        }
    }
}

/// Snapshot of the authentication state.
///
/// | `loading` | `session` | `user` | Meaning |
/// |-----------|-----------|--------|---------|
/// | true | any | any | indeterminate, make no access decision |
/// | false | None | None | signed out |
/// | false | Some | None | signed in, user lookup failed: no role-gated access |
/// | false | Some | Some | signed in and resolved |
///
/// `generation` identifies which resolution produced the snapshot. It only
/// increases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<Session>,
    pub user: Option<User>,
    pub loading: bool,
    pub generation: u64,
}

impl AuthState {
    /// The state before the first resolution completes.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            session: None,
            user: None,
            loading: true,
            generation: 0,
        }
    }

    /// A settled state (not loading).
    #[must_use]
    pub fn resolved(session: Option<Session>, user: Option<User>, generation: u64) -> Self {
        Self {
            session,
            user,
            loading: false,
            generation,
        }
    }

    /// Returns `true` once a session is present, whatever the user lookup did.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Resolves the permissions of the current user.
    ///
    /// While loading, or without a user record, this is the empty set.
    #[must_use]
    pub fn permissions(&self) -> Permissions {
        if self.loading {
            return Permissions::resolve(None);
        }
        Permissions::for_user(self.user.as_ref())
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}
