//! Application roles.
//!
//! The role is the only authorization input in taskdeck. Two roles exist;
//! anything else stored in the `users.role` column is treated as "no role"
//! and resolves to the empty capability set.
//!
//! # Canonical Form
//!
//! Roles are written lowercase (`"admin"`, `"member"`). Parsing is
//! case-insensitive so rows written as `"Admin"` or `"MEMBER"` resolve to the
//! same role.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role assigned to an application user.
///
/// # Example
///
/// ```
/// use taskdeck_auth::Role;
///
/// assert_eq!(Role::parse("Admin"), Some(Role::Admin));
/// assert_eq!(Role::parse(" member "), Some(Role::Member));
/// assert_eq!(Role::parse("owner"), None);
/// assert_eq!(Role::Admin.to_string(), "admin");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control over projects, tasks and users.
    Admin,
    /// Read access plus task status updates.
    Member,
}

impl Role {
    /// Parses a role string, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is neither `admin` nor `member`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}' (expected 'admin' or 'member')")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Deserializes an optional role column leniently.
///
/// Missing, `null`, and unrecognized strings all become `None`. Use with
/// `#[serde(deserialize_with = "...")]` on fields read from the backend.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|s| {
        let role = Role::parse(s);
        if role.is_none() {
            tracing::warn!(role = s, "unrecognized role, treating user as having no role");
        }
        role
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "deserialize_lenient")]
        role: Option<Role>,
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("Member"), Some(Role::Member));
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("guest"), None);
        assert_eq!(Role::parse("administrator"), None);
    }

    #[test]
    fn from_str_reports_input() {
        let err = "owner".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"member\"");
    }

    #[test]
    fn lenient_deserialize() {
        let row: Row = serde_json::from_str(r#"{"role":"Admin"}"#).unwrap();
        assert_eq!(row.role, Some(Role::Admin));

        let row: Row = serde_json::from_str(r#"{"role":"superuser"}"#).unwrap();
        assert_eq!(row.role, None);

        let row: Row = serde_json::from_str(r#"{"role":null}"#).unwrap();
        assert_eq!(row.role, None);

        let row: Row = serde_json::from_str("{}").unwrap();
        assert_eq!(row.role, None);
    }
}
