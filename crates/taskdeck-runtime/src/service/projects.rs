//! Project service.

use super::{decode_rows, to_record, written_row, Gate};
use crate::backend::{ChangeFilter, DataBackend, Query, RealtimeBackend, SortOrder, Table};
use crate::error::ServiceError;
use crate::live::{watch_changes, LiveList};
use crate::models::{NewProject, Project, ProjectPatch};
use std::sync::Arc;
use taskdeck_auth::Capability;
use taskdeck_types::ProjectId;
use tracing::debug;

/// Project CRUD gated by the project capabilities.
#[derive(Clone)]
pub struct ProjectService {
    backend: Arc<dyn DataBackend>,
    gate: Gate,
}

impl ProjectService {
    #[must_use]
    pub fn new(backend: Arc<dyn DataBackend>, gate: Gate) -> Self {
        Self { backend, gate }
    }

    /// Lists every project, newest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the view capability is missing or the fetch fails.
    pub async fn list(&self) -> Result<Vec<Project>, ServiceError> {
        self.gate.require(Capability::VIEW_PROJECT, "list projects")?;
        let query = Query::new().order("created_at", SortOrder::Descending);
        let rows = self.backend.select(Table::Projects, &query).await?;
        decode_rows(rows)
    }

    /// Project list kept current by change notices on `projects`.
    pub fn live<R: RealtimeBackend + ?Sized>(&self, realtime: &R) -> LiveList<Project> {
        let changes = watch_changes(realtime, "projects", ChangeFilter::table(Table::Projects));
        let service = self.clone();
        LiveList::spawn(
            move || {
                let service = service.clone();
                async move { service.list().await }
            },
            changes,
        )
    }

    /// Creates a project owned by the current user.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for a blank name,
    /// [`ServiceError::NotFoundAfterWrite`] if no row with an id comes back.
    pub async fn create(&self, project: NewProject) -> Result<Project, ServiceError> {
        let user = self
            .gate
            .require_user(Capability::CREATE_PROJECT, "create project")?;
        if project.name.trim().is_empty() {
            return Err(ServiceError::Validation("project name is empty".into()));
        }
        let project = NewProject {
            created_by: Some(user.id),
            ..project
        };
        let rows = self
            .backend
            .insert(Table::Projects, to_record(&project)?)
            .await?;
        let created: Project = written_row(rows, "create project")?;
        debug!(project = %created.id, "project created");
        Ok(created)
    }

    /// Applies `patch` to a project.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for an empty patch.
    pub async fn update(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, ServiceError> {
        self.gate.require(Capability::EDIT_PROJECT, "edit project")?;
        if patch.is_empty() {
            return Err(ServiceError::Validation("nothing to update".into()));
        }
        let rows = self
            .backend
            .update(Table::Projects, id.uuid(), to_record(&patch)?)
            .await?;
        written_row(rows, "update project")
    }

    /// Deletes a project.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the delete capability is missing or the call fails.
    pub async fn delete(&self, id: ProjectId) -> Result<(), ServiceError> {
        self.gate
            .require(Capability::DELETE_PROJECT, "delete project")?;
        self.backend.delete(Table::Projects, id.uuid()).await?;
        debug!(project = %id, "project deleted");
        Ok(())
    }
}
