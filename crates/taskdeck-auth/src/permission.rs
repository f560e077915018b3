//! Permission resolver.
//!
//! [`Permissions::resolve`] is the single place where a role turns into a
//! capability set. Guards, CLI control visibility and the pre-flight checks in
//! the services all go through it; nothing else compares role strings.
//!
//! ```text
//! Option<Role> ──resolve──► Permissions { role, granted: Capability }
//!                               │
//!                               ├── can_*()        boolean flags
//!                               ├── require(cap)   Result<(), AccessDenied>
//!                               └── flags()        serializable snapshot
//! ```
//!
//! The resolver is pure: no I/O, no hidden state. Resolving the same role twice
//! yields equal values.

use crate::{AccessDenied, Capability, Role, User};
use serde::Serialize;

/// Returns the capability set granted to `role`.
///
/// # Example
///
/// ```
/// use taskdeck_auth::{capabilities_for, Capability, Role};
///
/// assert_eq!(capabilities_for(Some(Role::Admin)), Capability::ALL);
/// assert_eq!(capabilities_for(Some(Role::Member)), Capability::MEMBER);
/// assert!(capabilities_for(None).is_empty());
/// ```
#[must_use]
pub const fn capabilities_for(role: Option<Role>) -> Capability {
    match role {
        Some(Role::Admin) => Capability::ALL,
        Some(Role::Member) => Capability::MEMBER,
        None => Capability::empty(),
    }
}

/// Resolved permissions of the current user.
///
/// # Example
///
/// ```
/// use taskdeck_auth::{Capability, Permissions, Role};
///
/// let member = Permissions::resolve(Some(Role::Member));
/// assert!(member.can_view_task());
/// assert!(member.can_update_task_status());
/// assert!(!member.can_delete_task());
/// assert!(member.require(Capability::EDIT_TASK, "edit task").is_err());
///
/// let nobody = Permissions::resolve(None);
/// assert!(nobody.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    role: Option<Role>,
    granted: Capability,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::resolve(None)
    }
}

impl Permissions {
    /// Resolves the permissions for `role`.
    #[must_use]
    pub const fn resolve(role: Option<Role>) -> Self {
        Self {
            role,
            granted: capabilities_for(role),
        }
    }

    /// Resolves the permissions for an optional user record.
    ///
    /// `None` (no user resolved) yields the empty set.
    #[must_use]
    pub fn for_user(user: Option<&User>) -> Self {
        Self::resolve(user.and_then(|u| u.role))
    }

    /// Returns the role the permissions were resolved from.
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        self.role
    }

    /// Returns the granted capability set.
    #[must_use]
    pub const fn capabilities(&self) -> Capability {
        self.granted
    }

    /// Returns `true` if no capability is granted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }

    /// Returns `true` for the admin role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Some(Role::Admin))
    }

    /// Returns `true` for the member role.
    #[must_use]
    pub const fn is_member(&self) -> bool {
        matches!(self.role, Some(Role::Member))
    }

    /// Returns `true` if every flag in `required` is granted.
    ///
    /// An empty `required` set is never considered allowed, so a caller that
    /// forgot to name a capability fails closed.
    #[must_use]
    pub const fn allows(&self, required: Capability) -> bool {
        !required.is_empty() && self.granted.contains(required)
    }

    /// Checks `required` for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied::CapabilityDenied`] when any flag is missing.
    pub fn require(&self, required: Capability, operation: &str) -> Result<(), AccessDenied> {
        if self.allows(required) {
            Ok(())
        } else {
            Err(AccessDenied::CapabilityDenied {
                operation: operation.to_string(),
                required,
                available: self.granted,
            })
        }
    }

    /// Checks that the current role is admin.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied::AdminRequired`] for any other role.
    pub fn require_admin(&self, operation: &str) -> Result<(), AccessDenied> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AccessDenied::AdminRequired {
                operation: operation.to_string(),
            })
        }
    }

    #[must_use]
    pub const fn can_create_project(&self) -> bool {
        self.allows(Capability::CREATE_PROJECT)
    }

    #[must_use]
    pub const fn can_edit_project(&self) -> bool {
        self.allows(Capability::EDIT_PROJECT)
    }

    #[must_use]
    pub const fn can_delete_project(&self) -> bool {
        self.allows(Capability::DELETE_PROJECT)
    }

    #[must_use]
    pub const fn can_view_project(&self) -> bool {
        self.allows(Capability::VIEW_PROJECT)
    }

    #[must_use]
    pub const fn can_create_task(&self) -> bool {
        self.allows(Capability::CREATE_TASK)
    }

    #[must_use]
    pub const fn can_edit_task(&self) -> bool {
        self.allows(Capability::EDIT_TASK)
    }

    #[must_use]
    pub const fn can_delete_task(&self) -> bool {
        self.allows(Capability::DELETE_TASK)
    }

    #[must_use]
    pub const fn can_assign_task(&self) -> bool {
        self.allows(Capability::ASSIGN_TASK)
    }

    #[must_use]
    pub const fn can_view_task(&self) -> bool {
        self.allows(Capability::VIEW_TASK)
    }

    #[must_use]
    pub const fn can_update_task_status(&self) -> bool {
        self.allows(Capability::UPDATE_TASK_STATUS)
    }

    /// Returns the named boolean snapshot of the capability set.
    #[must_use]
    pub const fn flags(&self) -> CapabilityFlags {
        CapabilityFlags {
            is_admin: self.is_admin(),
            is_member: self.is_member(),
            can_create_project: self.can_create_project(),
            can_edit_project: self.can_edit_project(),
            can_delete_project: self.can_delete_project(),
            can_view_project: self.can_view_project(),
            can_create_task: self.can_create_task(),
            can_edit_task: self.can_edit_task(),
            can_delete_task: self.can_delete_task(),
            can_assign_task: self.can_assign_task(),
            can_view_task: self.can_view_task(),
            can_update_task_status: self.can_update_task_status(),
        }
    }
}

/// Serializable boolean view of [`Permissions`].
///
/// Field names follow the camelCase keys front ends expect
/// (`canCreateProject`, `canUpdateTaskStatus`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityFlags {
    pub is_admin: bool,
    pub is_member: bool,
    pub can_create_project: bool,
    pub can_edit_project: bool,
    pub can_delete_project: bool,
    pub can_view_project: bool,
    pub can_create_task: bool,
    pub can_edit_task: bool,
    pub can_delete_task: bool,
    pub can_assign_task: bool,
    pub can_view_task: bool,
    pub can_update_task_status: bool,
}

impl CapabilityFlags {
    /// Returns `(name, value)` pairs for the ten capability flags.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, bool); 10] {
        [
            ("canCreateProject", self.can_create_project),
            ("canEditProject", self.can_edit_project),
            ("canDeleteProject", self.can_delete_project),
            ("canViewProject", self.can_view_project),
            ("canCreateTask", self.can_create_task),
            ("canEditTask", self.can_edit_task),
            ("canDeleteTask", self.can_delete_task),
            ("canAssignTask", self.can_assign_task),
            ("canViewTask", self.can_view_task),
            ("canUpdateTaskStatus", self.can_update_task_status),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_types::UserId;

    #[test]
    fn admin_gets_everything() {
        let flags = Permissions::resolve(Some(Role::Admin)).flags();
        assert!(flags.is_admin);
        assert!(!flags.is_member);
        assert!(flags.entries().iter().all(|(_, v)| *v));
    }

    #[test]
    fn member_gets_view_and_status_only() {
        let flags = Permissions::resolve(Some(Role::Member)).flags();
        let granted: Vec<&str> = flags
            .entries()
            .iter()
            .filter(|(_, v)| *v)
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(
            granted,
            vec!["canViewProject", "canViewTask", "canUpdateTaskStatus"]
        );
        assert!(flags.is_member);
        assert!(!flags.is_admin);
    }

    #[test]
    fn no_role_gets_nothing() {
        let perms = Permissions::resolve(None);
        assert!(perms.is_empty());
        assert!(perms.flags().entries().iter().all(|(_, v)| !*v));
        assert!(!perms.is_admin());
        assert!(!perms.is_member());
    }

    #[test]
    fn unknown_role_strings_resolve_to_nothing() {
        for raw in ["owner", "", "root", "guest", "admins"] {
            let perms = Permissions::resolve(Role::parse(raw));
            assert!(perms.is_empty(), "role {raw:?} must grant nothing");
        }
    }

    #[test]
    fn resolve_is_idempotent() {
        for role in [None, Some(Role::Admin), Some(Role::Member)] {
            assert_eq!(Permissions::resolve(role), Permissions::resolve(role));
            assert_eq!(
                Permissions::resolve(role).flags(),
                Permissions::resolve(role).flags()
            );
        }
    }

    #[test]
    fn for_user_uses_role() {
        let user = User::new(UserId::new(), "Nino", Some(Role::Member));
        assert!(Permissions::for_user(Some(&user)).is_member());

        let roleless = User::new(UserId::new(), "Eka", None);
        assert!(Permissions::for_user(Some(&roleless)).is_empty());

        assert!(Permissions::for_user(None).is_empty());
    }

    #[test]
    fn empty_requirement_fails_closed() {
        let admin = Permissions::resolve(Some(Role::Admin));
        assert!(!admin.allows(Capability::empty()));
        assert!(admin.require(Capability::empty(), "noop").is_err());
    }

    #[test]
    fn require_reports_available_set() {
        let member = Permissions::resolve(Some(Role::Member));
        let err = member
            .require(Capability::DELETE_PROJECT, "delete project")
            .unwrap_err();
        assert_eq!(
            err,
            AccessDenied::CapabilityDenied {
                operation: "delete project".into(),
                required: Capability::DELETE_PROJECT,
                available: Capability::MEMBER,
            }
        );
    }

    #[test]
    fn require_admin() {
        assert!(Permissions::resolve(Some(Role::Admin))
            .require_admin("set role")
            .is_ok());
        assert!(matches!(
            Permissions::resolve(Some(Role::Member)).require_admin("set role"),
            Err(AccessDenied::AdminRequired { .. })
        ));
    }

    #[test]
    fn flags_serialize_camel_case() {
        let json = serde_json::to_value(Permissions::resolve(Some(Role::Member)).flags()).unwrap();
        assert_eq!(json["canUpdateTaskStatus"], true);
        assert_eq!(json["canDeleteTask"], false);
        assert_eq!(json["isMember"], true);
    }
}
