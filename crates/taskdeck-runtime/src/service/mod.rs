//! Typed services over the data backend.
//!
//! Every call runs a local permission check through [`Gate`] before any
//! request is built. A denied call returns
//! [`ServiceError::PermissionDenied`] and never reaches the backend.
//!
//! | Service | Table | Gated by |
//! |---------|-------|----------|
//! | [`ProjectService`] | `projects` | project capabilities |
//! | [`TaskService`] | `tasks` | task capabilities |
//! | [`UserService`] | `users` | admin role, assign-task |
//! | [`CommentService`] | `comments` | view capability of the parent |
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use taskdeck_auth::Role;
//! use taskdeck_runtime::backend::{AuthBackend, MemoryBackend};
//! use taskdeck_runtime::models::NewProject;
//! use taskdeck_runtime::{ServiceError, Services, SessionStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = Arc::new(MemoryBackend::new());
//! backend.add_user("mia@example.com", "pw", "Mia", Some(Role::Member));
//! backend.sign_in_with_password("mia@example.com", "pw").await.unwrap();
//!
//! let store = SessionStore::start(backend.clone());
//! store.resolved().await;
//!
//! let services = Services::new(backend, store.gate());
//! let err = services.projects().create(NewProject::new("Launch")).await.unwrap_err();
//! assert!(matches!(err, ServiceError::PermissionDenied(_)));
//! # });
//! ```

mod comments;
mod projects;
mod tasks;
mod users;

pub use comments::CommentService;
pub use projects::ProjectService;
pub use tasks::TaskService;
pub use users::UserService;

use crate::backend::DataBackend;
use crate::error::{BackendError, ServiceError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use taskdeck_auth::{AuthState, Capability, Permissions, User};
use tokio::sync::watch;

/// Permission checks against the current auth state.
///
/// Cheap to clone; every clone observes the same state.
#[derive(Debug, Clone)]
pub struct Gate {
    auth: watch::Receiver<AuthState>,
}

impl Gate {
    #[must_use]
    pub fn new(auth: watch::Receiver<AuthState>) -> Self {
        Self { auth }
    }

    /// A gate over a fixed state.
    #[must_use]
    pub fn fixed(state: AuthState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { auth: rx }
    }

    /// Returns the current auth state.
    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.auth.borrow().clone()
    }

    /// Returns the settled state, or an auth error if none is usable yet.
    fn settled(&self) -> Result<AuthState, ServiceError> {
        let state = self.snapshot();
        if state.loading {
            return Err(ServiceError::Auth("session is still resolving".into()));
        }
        if state.session.is_none() {
            return Err(ServiceError::Auth("not signed in".into()));
        }
        Ok(state)
    }

    /// Checks `required` for `operation` and returns the resolved permissions.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Auth`] while loading or signed out
    /// - [`ServiceError::PermissionDenied`] when the role lacks `required`
    pub fn require(
        &self,
        required: Capability,
        operation: &str,
    ) -> Result<Permissions, ServiceError> {
        let permissions = self.settled()?.permissions();
        check(&permissions, required, operation)?;
        Ok(permissions)
    }

    /// Checks that the current user is an admin.
    ///
    /// # Errors
    ///
    /// As [`require`](Self::require), with [`AccessDenied::AdminRequired`](taskdeck_auth::AccessDenied::AdminRequired).
    pub fn require_admin(&self, operation: &str) -> Result<User, ServiceError> {
        let state = self.settled()?;
        state.permissions().require_admin(operation).map_err(|e| {
            tracing::debug!(operation, "denied: admin required");
            ServiceError::from(e)
        })?;
        state
            .user
            .ok_or_else(|| ServiceError::Auth("no user record".into()))
    }

    /// Checks `required` and returns the current user record.
    ///
    /// # Errors
    ///
    /// As [`require`](Self::require). A session without a user record is
    /// denied because it grants no capability.
    pub fn require_user(&self, required: Capability, operation: &str) -> Result<User, ServiceError> {
        let state = self.settled()?;
        check(&state.permissions(), required, operation)?;
        state
            .user
            .ok_or_else(|| ServiceError::Auth("no user record".into()))
    }
}

fn check(permissions: &Permissions, required: Capability, operation: &str) -> Result<(), ServiceError> {
    permissions.require(required, operation).map_err(|e| {
        tracing::debug!(operation, %required, available = %permissions.capabilities(), "denied");
        ServiceError::from(e)
    })
}

/// All services over one backend and gate.
#[derive(Clone)]
pub struct Services {
    projects: ProjectService,
    tasks: TaskService,
    users: UserService,
    comments: CommentService,
}

impl Services {
    pub fn new<B: DataBackend + 'static>(backend: Arc<B>, gate: Gate) -> Self {
        let backend: Arc<dyn DataBackend> = backend;
        Self {
            projects: ProjectService::new(Arc::clone(&backend), gate.clone()),
            tasks: TaskService::new(Arc::clone(&backend), gate.clone()),
            users: UserService::new(Arc::clone(&backend), gate.clone()),
            comments: CommentService::new(backend, gate),
        }
    }

    #[must_use]
    pub fn projects(&self) -> &ProjectService {
        &self.projects
    }

    #[must_use]
    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    #[must_use]
    pub fn users(&self) -> &UserService {
        &self.users
    }

    #[must_use]
    pub fn comments(&self) -> &CommentService {
        &self.comments
    }
}

/// Decodes backend rows into `T`.
fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, ServiceError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| ServiceError::Data(BackendError::Decode(e.to_string())))
        })
        .collect()
}

/// Takes the row returned by a write.
///
/// No row, or a row without an `id`, is [`ServiceError::NotFoundAfterWrite`].
fn written_row<T: DeserializeOwned>(
    rows: Vec<Value>,
    operation: &'static str,
) -> Result<T, ServiceError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or(ServiceError::NotFoundAfterWrite {
            operation,
            expected: "row",
        })?;
    if row.get("id").map_or(true, Value::is_null) {
        return Err(ServiceError::NotFoundAfterWrite {
            operation,
            expected: "id",
        });
    }
    serde_json::from_value(row).map_err(|e| ServiceError::Data(BackendError::Decode(e.to_string())))
}

/// Serializes a write payload.
fn to_record<T: serde::Serialize>(payload: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(payload)
        .map_err(|e| ServiceError::Validation(format!("cannot encode payload: {e}")))
}
