//! Identifier types for taskdeck.
//!
//! Every row the backend owns is keyed by a UUID. Each entity gets its own
//! newtype so a [`TaskId`] can never be passed where a [`ProjectId`] is
//! expected.
//!
//! Identifiers serialize transparently as the bare UUID string, which is the
//! representation the backend uses in rows and in filter expressions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Defines a UUID newtype with the shared constructor/accessor surface.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new identifier with a random UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn uuid(&self) -> Uuid {
                self.0
            }

            /// Human-readable label for log fields and error messages.
            #[must_use]
            pub const fn label() -> &'static str {
                $label
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of an application user.
    ///
    /// The same UUID identifies the account in the auth service and the
    /// matching row in the `users` table.
    ///
    /// # Example
    ///
    /// ```
    /// use taskdeck_types::UserId;
    ///
    /// let id = UserId::new();
    /// let parsed: UserId = id.to_string().parse().unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    UserId,
    "user"
);

uuid_id!(
    /// Identifier of a project row.
    ProjectId,
    "project"
);

uuid_id!(
    /// Identifier of a task row.
    TaskId,
    "task"
);

uuid_id!(
    /// Identifier of a comment row.
    CommentId,
    "comment"
);
