//! Comment service.
//!
//! Comments hang off a task or a project. Reading a thread needs the view
//! capability of the parent kind. Posting additionally needs a resolved user
//! record with a role.

use super::{decode_rows, written_row, Gate};
use crate::backend::{ChangeFilter, DataBackend, Query, RealtimeBackend, SortOrder, Table};
use crate::error::ServiceError;
use crate::live::{watch_changes, LiveList};
use crate::models::{Comment, CommentParent, ParentKind};
use serde_json::json;
use std::sync::Arc;
use taskdeck_auth::Capability;

const fn view_capability(kind: ParentKind) -> Capability {
    match kind {
        ParentKind::Task => Capability::VIEW_TASK,
        ParentKind::Project => Capability::VIEW_PROJECT,
    }
}

fn thread_query(parent: CommentParent) -> Query {
    Query::new()
        .eq("parent_id", parent.id().to_string())
        .eq("parent_type", parent.kind().as_str())
        .embed("author", Table::Users, "user_id", &["name"])
        .order("created_at", SortOrder::Ascending)
}

#[derive(Clone)]
pub struct CommentService {
    backend: Arc<dyn DataBackend>,
    gate: Gate,
}

impl CommentService {
    #[must_use]
    pub fn new(backend: Arc<dyn DataBackend>, gate: Gate) -> Self {
        Self { backend, gate }
    }

    /// Lists a thread, oldest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if the parent's view capability is missing or the
    /// fetch fails.
    pub async fn list(&self, parent: CommentParent) -> Result<Vec<Comment>, ServiceError> {
        self.gate
            .require(view_capability(parent.kind()), "list comments")?;
        decode_rows(
            self.backend
                .select(Table::Comments, &thread_query(parent))
                .await?,
        )
    }

    /// A thread kept current by comment notices for `parent`.
    pub fn live<R: RealtimeBackend + ?Sized>(
        &self,
        realtime: &R,
        parent: CommentParent,
    ) -> LiveList<Comment> {
        let filter = ChangeFilter::table(Table::Comments).eq("parent_id", parent.id().to_string());
        let changes = watch_changes(realtime, &parent.topic(), filter);
        let service = self.clone();
        LiveList::spawn(
            move || {
                let service = service.clone();
                async move { service.list(parent).await }
            },
            changes,
        )
    }

    /// Posts `text` to a thread as the current user.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for blank text,
    /// [`ServiceError::NotFoundAfterWrite`] if no row with an id comes back.
    pub async fn add(&self, parent: CommentParent, text: &str) -> Result<Comment, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::Validation("comment text is empty".into()));
        }
        let user = self
            .gate
            .require_user(view_capability(parent.kind()), "add comment")?;
        let record = json!({
            "comment_text": text,
            "user_id": user.id,
            "parent_id": parent.id(),
            "parent_type": parent.kind(),
        });
        let rows = self.backend.insert(Table::Comments, record).await?;
        let comment: Comment = written_row(rows, "add comment")?;
        tracing::debug!(comment = %comment.id, %parent, "comment added");
        Ok(comment)
    }
}
