//! User service.

use super::{decode_rows, written_row, Gate};
use crate::backend::{DataBackend, Query, SortOrder, Table};
use crate::error::ServiceError;
use std::sync::Arc;
use taskdeck_auth::{Capability, Role, User};
use taskdeck_types::UserId;

const USER_COLUMNS: &[&str] = &["id", "name", "role"];

/// Reads and role changes on the `users` table.
#[derive(Clone)]
pub struct UserService {
    backend: Arc<dyn DataBackend>,
    gate: Gate,
}

impl UserService {
    #[must_use]
    pub fn new(backend: Arc<dyn DataBackend>, gate: Gate) -> Self {
        Self { backend, gate }
    }

    /// Lists every user by name. Admin only.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PermissionDenied`] for non-admins.
    pub async fn list(&self) -> Result<Vec<User>, ServiceError> {
        self.gate.require_admin("list users")?;
        let query = Query::new()
            .columns(USER_COLUMNS)
            .order("name", SortOrder::Ascending);
        decode_rows(self.backend.select(Table::Users, &query).await?)
    }

    /// Lists users with the member role, the candidates for assignment.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PermissionDenied`] without the assign capability.
    pub async fn members(&self) -> Result<Vec<User>, ServiceError> {
        self.gate.require(Capability::ASSIGN_TASK, "list members")?;
        let query = Query::new()
            .columns(USER_COLUMNS)
            .eq("role", Role::Member.as_str())
            .order("name", SortOrder::Ascending);
        decode_rows(self.backend.select(Table::Users, &query).await?)
    }

    /// Changes a user's role. Admin only.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFoundAfterWrite`] if no such user exists.
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<User, ServiceError> {
        let admin = self.gate.require_admin("update user role")?;
        let rows = self
            .backend
            .update(
                Table::Users,
                id.uuid(),
                serde_json::json!({ "role": role.as_str() }),
            )
            .await?;
        let user: User = written_row(rows, "update user role")?;
        tracing::info!(by = %admin.id, user = %user.id, %role, "role updated");
        Ok(user)
    }
}
