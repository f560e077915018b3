//! Domain rows: projects, tasks and comments.
//!
//! These mirror the backend tables. Write payloads ([`NewProject`],
//! [`TaskPatch`], ...) serialize to exactly the columns they set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use taskdeck_types::{CommentId, ProjectId, TaskId, UserId};

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().replace('_', "-") == wanted)
                    .ok_or_else(|| {
                        let names: Vec<&str> = Self::ALL.iter().map(Self::as_str).collect();
                        format!("unknown {} '{s}' (expected one of: {})", $label, names.join(", "))
                    })
            }
        }
    };
}

string_enum! {
    /// Lifecycle of a project.
    ProjectStatus, "project status" {
        Planned => "planned",
        InProgress => "in-progress",
        Completed => "completed",
    }
}

string_enum! {
    /// Lifecycle of a task.
    TaskStatus, "task status" {
        Todo => "todo",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

string_enum! {
    /// What a comment is attached to.
    ParentKind, "comment parent" {
        Task => "task",
        Project => "project",
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Planned
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

/// Name of a related user, as embedded in task and comment rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
}

impl NewProject {
    /// A `planned` project with no description.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            status: ProjectStatus::default(),
            created_by: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }
}

/// Partial update for a project. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}

impl ProjectPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    pub project_id: ProjectId,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_user: Option<UserRef>,
    #[serde(default)]
    pub created_user: Option<UserRef>,
}

impl Task {
    /// Display name of the assignee, if embedded.
    #[must_use]
    pub fn assignee_name(&self) -> Option<&str> {
        self.assigned_user.as_ref().map(|u| u.name.as_str())
    }
}

/// Insert payload for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub project_id: ProjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
}

impl NewTask {
    #[must_use]
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            project_id,
            assigned_to: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn assigned_to(mut self, user: UserId) -> Self {
        self.assigned_to = Some(user);
        self
    }
}

/// Partial update for a task. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
}

impl TaskPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.assigned_to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub comment_text: String,
    pub user_id: UserId,
    pub parent_id: uuid::Uuid,
    pub parent_type: ParentKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<UserRef>,
}

impl Comment {
    #[must_use]
    pub fn author_name(&self) -> &str {
        self.author.as_ref().map_or("unknown", |u| u.name.as_str())
    }
}

/// What a comment thread hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentParent {
    Task(TaskId),
    Project(ProjectId),
}

impl CommentParent {
    #[must_use]
    pub fn kind(&self) -> ParentKind {
        match self {
            Self::Task(_) => ParentKind::Task,
            Self::Project(_) => ParentKind::Project,
        }
    }

    #[must_use]
    pub fn id(&self) -> uuid::Uuid {
        match self {
            Self::Task(id) => id.uuid(),
            Self::Project(id) => id.uuid(),
        }
    }

    /// Realtime topic for this thread: `comments-{kind}-{id}`.
    #[must_use]
    pub fn topic(&self) -> String {
        format!("comments-{}-{}", self.kind(), self.id())
    }
}

impl fmt::Display for CommentParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}
