//! Core types for taskdeck.
//!
//! Foundational identifiers and the shared error-code interface used by every
//! other crate in the workspace.
//!
//! # Crate Architecture
//!
//! ```text
//! taskdeck-types    : IDs, ErrorCode            ◄── HERE
//!     ↑
//! taskdeck-auth     : Role, Capability, Permissions, Session, RouteGuard
//!     ↑
//! taskdeck-runtime  : backends, SessionStore, services, live lists, config
//!     ↑
//! taskdeck-cli      : command-line front end
//! ```

mod error;
mod id;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{CommentId, ProjectId, TaskId, UserId};
