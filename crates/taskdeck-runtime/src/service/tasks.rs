//! Task service.
//!
//! Task rows are fetched with the assignee and creator names embedded:
//!
//! ```text
//! tasks.*, assigned_user: users(name) via assigned_to,
//!          created_user:  users(name) via created_by
//! ```

use super::{decode_rows, to_record, written_row, Gate};
use crate::backend::{ChangeFilter, DataBackend, Query, RealtimeBackend, SortOrder, Table};
use crate::error::ServiceError;
use crate::live::{watch_changes, LiveList};
use crate::models::{NewTask, Task, TaskPatch, TaskStatus};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use taskdeck_auth::Capability;
use taskdeck_types::{ProjectId, TaskId, UserId};
use tracing::debug;

fn task_query() -> Query {
    Query::new()
        .embed("assigned_user", Table::Users, "assigned_to", &["name"])
        .embed("created_user", Table::Users, "created_by", &["name"])
        .order("created_at", SortOrder::Descending)
}

/// Task CRUD gated by the task capabilities.
#[derive(Clone)]
pub struct TaskService {
    backend: Arc<dyn DataBackend>,
    gate: Gate,
}

impl TaskService {
    #[must_use]
    pub fn new(backend: Arc<dyn DataBackend>, gate: Gate) -> Self {
        Self { backend, gate }
    }

    /// Lists the tasks of one project, newest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the view capability is missing or the fetch fails.
    pub async fn list_by_project(&self, project: ProjectId) -> Result<Vec<Task>, ServiceError> {
        self.gate.require(Capability::VIEW_TASK, "list tasks")?;
        let query = task_query().eq("project_id", project.to_string());
        decode_rows(self.backend.select(Table::Tasks, &query).await?)
    }

    /// Tasks of one project, re-fetched on changes to that project's tasks.
    pub fn live_by_project<R: RealtimeBackend + ?Sized>(
        &self,
        realtime: &R,
        project: ProjectId,
    ) -> LiveList<Task> {
        let filter = ChangeFilter::table(Table::Tasks).eq("project_id", project.to_string());
        let changes = watch_changes(realtime, &format!("tasks-{project}"), filter);
        let service = self.clone();
        LiveList::spawn(
            move || {
                let service = service.clone();
                async move { service.list_by_project(project).await }
            },
            changes,
        )
    }

    /// Lists the tasks the current user may see.
    ///
    /// Admins see every task. Everyone else sees only tasks assigned to them.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the view capability is missing or the fetch fails.
    pub async fn list_visible(&self) -> Result<Vec<Task>, ServiceError> {
        let user = self.gate.require_user(Capability::VIEW_TASK, "list tasks")?;
        let query = if user.permissions().is_admin() {
            task_query()
        } else {
            task_query().eq("assigned_to", user.id.to_string())
        };
        decode_rows(self.backend.select(Table::Tasks, &query).await?)
    }

    /// Lists the tasks assigned to the current user.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the view capability is missing or the fetch fails.
    pub async fn list_assigned_to_me(&self) -> Result<Vec<Task>, ServiceError> {
        let user = self.gate.require_user(Capability::VIEW_TASK, "list my tasks")?;
        let query = task_query().eq("assigned_to", user.id.to_string());
        decode_rows(self.backend.select(Table::Tasks, &query).await?)
    }

    /// Creates a task in `todo`, created by and by default assigned to the
    /// current user.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for a blank title,
    /// [`ServiceError::NotFoundAfterWrite`] if no row with an id comes back.
    pub async fn create(&self, task: NewTask) -> Result<Task, ServiceError> {
        let user = self.gate.require_user(Capability::CREATE_TASK, "create task")?;
        if task.title.trim().is_empty() {
            return Err(ServiceError::Validation("task title is empty".into()));
        }
        let mut record = to_record(&task)?;
        if let Some(map) = record.as_object_mut() {
            map.insert("status".into(), json!(TaskStatus::Todo));
            map.insert("created_by".into(), json!(user.id));
            map.insert(
                "assigned_to".into(),
                json!(task.assigned_to.unwrap_or(user.id)),
            );
        }
        let rows = self.backend.insert(Table::Tasks, record).await?;
        let created: Task = written_row(rows, "create task")?;
        debug!(task = %created.id, project = %created.project_id, "task created");
        Ok(created)
    }

    /// Applies `patch` and stamps `updated_at`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for an empty patch.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task, ServiceError> {
        self.gate.require(Capability::EDIT_TASK, "edit task")?;
        if patch.is_empty() {
            return Err(ServiceError::Validation("nothing to update".into()));
        }
        self.write(id, to_record(&patch)?, "update task").await
    }

    /// Moves a task to `status`.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the status capability is missing or the write fails.
    pub async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, ServiceError> {
        self.gate
            .require(Capability::UPDATE_TASK_STATUS, "update task status")?;
        self.write(id, json!({ "status": status }), "update task status")
            .await
    }

    /// Assigns a task to `user`.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the assign capability is missing or the write fails.
    pub async fn assign(&self, id: TaskId, user: UserId) -> Result<Task, ServiceError> {
        self.gate.require(Capability::ASSIGN_TASK, "assign task")?;
        self.write(id, json!({ "assigned_to": user }), "assign task")
            .await
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the delete capability is missing or the call fails.
    pub async fn delete(&self, id: TaskId) -> Result<(), ServiceError> {
        self.gate.require(Capability::DELETE_TASK, "delete task")?;
        self.backend.delete(Table::Tasks, id.uuid()).await?;
        debug!(task = %id, "task deleted");
        Ok(())
    }

    async fn write(
        &self,
        id: TaskId,
        mut patch: Value,
        operation: &'static str,
    ) -> Result<Task, ServiceError> {
        if let Some(map) = patch.as_object_mut() {
            map.insert("updated_at".into(), json!(Utc::now()));
        }
        let rows = self.backend.update(Table::Tasks, id.uuid(), patch).await?;
        written_row(rows, operation)
    }
}
