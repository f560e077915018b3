//! Capability flags.
//!
//! A [`Capability`] set describes *what* a signed-in user may do. It is never
//! stored: [`Permissions::resolve`](crate::Permissions::resolve) derives it
//! from the user's role every time it is needed.
//!
//! | Role | Capabilities |
//! |------|--------------|
//! | admin | [`Capability::ALL`] |
//! | member | [`Capability::MEMBER`] (view projects, view tasks, update task status) |
//! | none / unknown | empty |
//!
//! # Example
//!
//! ```
//! use taskdeck_auth::Capability;
//!
//! assert!(Capability::ALL.contains(Capability::DELETE_PROJECT));
//! assert!(Capability::MEMBER.contains(Capability::UPDATE_TASK_STATUS));
//! assert!(!Capability::MEMBER.contains(Capability::EDIT_TASK));
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Actions gated by role.
    ///
    /// | Capability | Operations |
    /// |------------|------------|
    /// | [`CREATE_PROJECT`](Self::CREATE_PROJECT) | `projects create` |
    /// | [`EDIT_PROJECT`](Self::EDIT_PROJECT) | `projects edit` |
    /// | [`DELETE_PROJECT`](Self::DELETE_PROJECT) | `projects delete` |
    /// | [`VIEW_PROJECT`](Self::VIEW_PROJECT) | `projects list`, project comments |
    /// | [`CREATE_TASK`](Self::CREATE_TASK) | `tasks create` |
    /// | [`EDIT_TASK`](Self::EDIT_TASK) | `tasks edit` |
    /// | [`DELETE_TASK`](Self::DELETE_TASK) | `tasks delete` |
    /// | [`ASSIGN_TASK`](Self::ASSIGN_TASK) | `tasks assign`, member listing |
    /// | [`VIEW_TASK`](Self::VIEW_TASK) | `tasks list`, task comments |
    /// | [`UPDATE_TASK_STATUS`](Self::UPDATE_TASK_STATUS) | `tasks status` |
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capability: u16 {
        const CREATE_PROJECT     = 0b00_0000_0001;
        const EDIT_PROJECT       = 0b00_0000_0010;
        const DELETE_PROJECT     = 0b00_0000_0100;
        const VIEW_PROJECT       = 0b00_0000_1000;
        const CREATE_TASK        = 0b00_0001_0000;
        const EDIT_TASK          = 0b00_0010_0000;
        const DELETE_TASK        = 0b00_0100_0000;
        const ASSIGN_TASK        = 0b00_1000_0000;
        const VIEW_TASK          = 0b01_0000_0000;
        const UPDATE_TASK_STATUS = 0b10_0000_0000;
    }
}

impl Capability {
    /// Every project capability.
    pub const PROJECT_ALL: Self = Self::CREATE_PROJECT
        .union(Self::EDIT_PROJECT)
        .union(Self::DELETE_PROJECT)
        .union(Self::VIEW_PROJECT);

    /// Every task capability.
    pub const TASK_ALL: Self = Self::CREATE_TASK
        .union(Self::EDIT_TASK)
        .union(Self::DELETE_TASK)
        .union(Self::ASSIGN_TASK)
        .union(Self::VIEW_TASK)
        .union(Self::UPDATE_TASK_STATUS);

    /// All capabilities (the admin set).
    pub const ALL: Self = Self::PROJECT_ALL.union(Self::TASK_ALL);

    /// The member set: read access plus task status updates.
    pub const MEMBER: Self = Self::VIEW_PROJECT
        .union(Self::VIEW_TASK)
        .union(Self::UPDATE_TASK_STATUS);

    /// Returns the names of the set flags in declaration order.
    ///
    /// # Example
    ///
    /// ```
    /// use taskdeck_auth::Capability;
    ///
    /// let names = Capability::MEMBER.names();
    /// assert_eq!(names, vec!["VIEW_PROJECT", "VIEW_TASK", "UPDATE_TASK_STATUS"]);
    /// ```
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }

    /// Parses a capability name (case-insensitive, `-` accepted for `_`).
    ///
    /// Accepts the group names `ALL`, `MEMBER`, `PROJECT_ALL` and `TASK_ALL`.
    ///
    /// # Example
    ///
    /// ```
    /// use taskdeck_auth::Capability;
    ///
    /// assert_eq!(Capability::parse("view_task"), Some(Capability::VIEW_TASK));
    /// assert_eq!(Capability::parse("update-task-status"), Some(Capability::UPDATE_TASK_STATUS));
    /// assert_eq!(Capability::parse("fly"), None);
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().replace('-', "_").to_uppercase();
        match normalized.as_str() {
            "ALL" => Some(Self::ALL),
            "MEMBER" => Some(Self::MEMBER),
            "PROJECT_ALL" => Some(Self::PROJECT_ALL),
            "TASK_ALL" => Some(Self::TASK_ALL),
            other => Self::from_name(other),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.names();
        if names.is_empty() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}
