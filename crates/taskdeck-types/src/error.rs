//! Unified error interface for taskdeck.
//!
//! Every error type in the workspace implements [`ErrorCode`] so callers can
//! branch on a stable machine-readable code instead of matching display text.
//!
//! # Example
//!
//! ```
//! use taskdeck_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum LookupError {
//!     Missing,
//!     Offline,
//! }
//!
//! impl ErrorCode for LookupError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Missing => "LOOKUP_MISSING",
//!             Self::Offline => "LOOKUP_OFFLINE",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Offline)
//!     }
//! }
//!
//! assert_eq!(LookupError::Offline.code(), "LOOKUP_OFFLINE");
//! assert!(LookupError::Offline.is_recoverable());
//! ```

/// Machine-readable error classification.
///
/// # Code Format
///
/// - UPPER_SNAKE_CASE, prefixed by domain (`AUTH_`, `BACKEND_`, `SERVICE_`, `CONFIG_`)
/// - Stable once published
///
/// # Recoverability
///
/// `true` means the user can act on the failure (sign in again, fix input,
/// wait for the network). Nothing in taskdeck retries automatically; the flag
/// only drives how a failure is presented.
pub trait ErrorCode {
    /// Returns the stable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the user can take corrective action.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code follows the workspace conventions.
///
/// # Panics
///
/// Panics if the code is empty, lacks `expected_prefix`, or is not
/// UPPER_SNAKE_CASE.
///
/// # Example
///
/// ```
/// use taskdeck_types::{assert_error_code, ErrorCode};
///
/// struct Expired;
///
/// impl ErrorCode for Expired {
///     fn code(&self) -> &'static str { "AUTH_EXPIRED" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&Expired, "AUTH_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates every error in `errors` with [`assert_error_code`].
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Offline,
        Rejected,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Offline => "TEST_OFFLINE",
                Self::Rejected => "TEST_REJECTED",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Offline)
        }
    }

    #[test]
    fn codes_and_recoverability() {
        assert_eq!(TestError::Offline.code(), "TEST_OFFLINE");
        assert!(TestError::Offline.is_recoverable());
        assert!(!TestError::Rejected.is_recoverable());
    }

    #[test]
    fn assert_error_codes_all_variants() {
        assert_error_codes(&[TestError::Offline, TestError::Rejected], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn wrong_prefix_panics() {
        assert_error_code(&TestError::Offline, "AUTH_");
    }

    #[test]
    fn upper_snake_case() {
        assert!(is_upper_snake_case("AUTH_EXPIRED"));
        assert!(is_upper_snake_case("E_404"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("auth_expired"));
        assert!(!is_upper_snake_case("_AUTH"));
        assert!(!is_upper_snake_case("AUTH_"));
        assert!(!is_upper_snake_case("AUTH__EXPIRED"));
    }
}
