//! Access denied error.
//!
//! [`AccessDenied`] is produced by [`Permissions`](crate::Permissions) before
//! any request leaves the process. A denied operation never reaches the
//! backend.

use crate::Capability;
use taskdeck_types::ErrorCode;
use thiserror::Error;

/// A local permission check failed.
///
/// # Example
///
/// ```
/// use taskdeck_auth::{AccessDenied, Capability};
/// use taskdeck_types::ErrorCode;
///
/// let err = AccessDenied::CapabilityDenied {
///     operation: "delete project".to_string(),
///     required: Capability::DELETE_PROJECT,
///     available: Capability::MEMBER,
/// };
///
/// assert!(err.to_string().contains("delete project"));
/// assert_eq!(err.code(), "AUTH_CAPABILITY_DENIED");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// The operation needs a capability the current role does not grant.
    #[error("permission denied: '{operation}' requires {required}, available: {available}")]
    CapabilityDenied {
        /// The operation that was attempted.
        operation: String,
        /// Capabilities the operation needs.
        required: Capability,
        /// Capabilities the current role grants.
        available: Capability,
    },

    /// The operation is reserved to the admin role.
    #[error("permission denied: '{operation}' requires the admin role")]
    AdminRequired {
        /// The operation that was attempted.
        operation: String,
    },
}

impl AccessDenied {
    /// Returns the attempted operation.
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::CapabilityDenied { operation, .. } | Self::AdminRequired { operation } => {
                operation
            }
        }
    }
}

impl ErrorCode for AccessDenied {
    fn code(&self) -> &'static str {
        match self {
            Self::CapabilityDenied { .. } => "AUTH_CAPABILITY_DENIED",
            Self::AdminRequired { .. } => "AUTH_ADMIN_REQUIRED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
