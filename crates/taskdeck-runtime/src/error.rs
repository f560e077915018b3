//! Runtime error types.
//!
//! # Error Hierarchy
//!
//! ```text
//! ServiceError (returned by every service call)
//! ├── Auth               no session, bad credentials, expired token
//! ├── PermissionDenied   local capability check, never reaches the backend
//! ├── Validation         rejected locally before any request
//! ├── Data               wraps BackendError
//! └── NotFoundAfterWrite write accepted but no row / id came back
//!
//! BackendError (returned by backend implementations)
//! ├── NoSession / InvalidCredentials / Unauthorized
//! ├── Status / Network / Decode
//! ├── Rejected
//! └── Unsupported
//! ```
//!
//! Nothing is retried. Every error surfaces to the action that caused it.

use taskdeck_auth::AccessDenied;
use taskdeck_types::ErrorCode;
use thiserror::Error;

/// Error from an auth, data or realtime backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The operation needs a session and none is active.
    #[error("no active session")]
    NoSession,

    /// Email/password pair was rejected.
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// The backend refused the token (HTTP 401/403).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Non-success HTTP status not covered by a more specific variant.
    #[error("HTTP {status} ({kind}): {message}")]
    Status {
        status: u16,
        kind: &'static str,
        message: String,
    },

    /// Transport failure (DNS, TLS, timeout, connection reset).
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The backend rejected the request (constraint or validation failure).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The backend does not implement this feature.
    #[error("not supported by this backend: {0}")]
    Unsupported(&'static str),
}

impl BackendError {
    /// Returns `true` for errors that mean "sign in again".
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::NoSession | Self::InvalidCredentials | Self::Unauthorized { .. }
        )
    }
}

impl ErrorCode for BackendError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoSession => "BACKEND_NO_SESSION",
            Self::InvalidCredentials => "BACKEND_INVALID_CREDENTIALS",
            Self::Unauthorized { .. } => "BACKEND_UNAUTHORIZED",
            Self::Status { .. } => "BACKEND_STATUS",
            Self::Network(_) => "BACKEND_NETWORK",
            Self::Decode(_) => "BACKEND_DECODE",
            Self::Rejected(_) => "BACKEND_REJECTED",
            Self::Unsupported(_) => "BACKEND_UNSUPPORTED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Error returned by the typed services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No usable session or user, or the backend refused the credentials.
    #[error("authentication required: {0}")]
    Auth(String),

    /// The current role does not grant the operation.
    #[error(transparent)]
    PermissionDenied(#[from] AccessDenied),

    /// Input rejected locally.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The backend rejected or failed the request.
    #[error(transparent)]
    Data(BackendError),

    /// The write succeeded but the expected row or id was not returned.
    #[error("{operation} succeeded but no {expected} was returned")]
    NotFoundAfterWrite {
        operation: &'static str,
        expected: &'static str,
    },
}

impl From<BackendError> for ServiceError {
    fn from(err: BackendError) -> Self {
        if err.is_auth() {
            Self::Auth(err.to_string())
        } else {
            Self::Data(err)
        }
    }
}

impl ErrorCode for ServiceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "SERVICE_AUTH",
            Self::PermissionDenied(_) => "SERVICE_PERMISSION_DENIED",
            Self::Validation(_) => "SERVICE_VALIDATION",
            Self::Data(_) => "SERVICE_DATA",
            Self::NotFoundAfterWrite { .. } => "SERVICE_NOT_FOUND_AFTER_WRITE",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::Data(inner) => inner.is_recoverable(),
            Self::PermissionDenied(_) | Self::Validation(_) | Self::NotFoundAfterWrite { .. } => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_auth::Capability;
    use taskdeck_types::assert_error_codes;

    #[test]
    fn backend_codes() {
        assert_error_codes(
            &[
                BackendError::NoSession,
                BackendError::InvalidCredentials,
                BackendError::Unauthorized {
                    message: "jwt expired".into(),
                },
                BackendError::Status {
                    status: 500,
                    kind: "server_error",
                    message: String::new(),
                },
                BackendError::Network("reset".into()),
                BackendError::Decode("eof".into()),
                BackendError::Rejected("duplicate key".into()),
                BackendError::Unsupported("realtime"),
            ],
            "BACKEND_",
        );
    }

    #[test]
    fn service_codes() {
        assert_error_codes(
            &[
                ServiceError::Auth("x".into()),
                ServiceError::PermissionDenied(AccessDenied::AdminRequired {
                    operation: "y".into(),
                }),
                ServiceError::Validation("empty".into()),
                ServiceError::Data(BackendError::Decode("z".into())),
                ServiceError::NotFoundAfterWrite {
                    operation: "create project",
                    expected: "id",
                },
            ],
            "SERVICE_",
        );
    }

    #[test]
    fn auth_backend_errors_become_auth() {
        let err: ServiceError = BackendError::NoSession.into();
        assert!(matches!(err, ServiceError::Auth(_)));

        let err: ServiceError = BackendError::Unauthorized {
            message: "expired".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::Auth(_)));
    }

    #[test]
    fn other_backend_errors_become_data() {
        let err: ServiceError = BackendError::Rejected("constraint".into()).into();
        assert_eq!(err, ServiceError::Data(BackendError::Rejected("constraint".into())));
    }

    #[test]
    fn recoverability() {
        assert!(BackendError::Network("x".into()).is_recoverable());
        assert!(BackendError::Status {
            status: 503,
            kind: "server_error",
            message: String::new()
        }
        .is_recoverable());
        assert!(!BackendError::InvalidCredentials.is_recoverable());

        let denied = ServiceError::PermissionDenied(AccessDenied::CapabilityDenied {
            operation: "delete".into(),
            required: Capability::DELETE_TASK,
            available: Capability::MEMBER,
        });
        assert!(!denied.is_recoverable());
        assert_eq!(denied.code(), "SERVICE_PERMISSION_DENIED");
    }
}
