//! Role-based access control for taskdeck.
//!
//! Everything in this crate is pure: no I/O, no async. The runtime crate feeds
//! it auth state and acts on its decisions.
//!
//! # Access Model
//!
//! ```text
//! Role ──► Permissions::resolve ──► Capability set ──► can_*() / require()
//!                                        │
//! AuthState {session, user, loading} ────┴──► RouteGuard ──► GuardDecision
//! ```
//!
//! | Type | Controls |
//! |------|----------|
//! | [`Role`] | The single authorization input (`admin` / `member`) |
//! | [`Capability`] | What operations a role may perform |
//! | [`Permissions`] | Resolved capability set plus role predicates |
//! | [`RouteGuard`] | Whether a protected view renders, redirects or falls back |
//!
//! # Crate Architecture
//!
//! ```text
//! taskdeck-types   (IDs, ErrorCode)
//!     ↑
//! taskdeck-auth    (Role, Capability, Permissions, AuthState, RouteGuard)  ◄── THIS CRATE
//!     ↑
//! taskdeck-runtime (SessionStore, services, backends)
//! ```
//!
//! # Example
//!
//! ```
//! use taskdeck_auth::{AuthState, GuardConfig, Role, RouteGuard, Session, User};
//! use taskdeck_types::UserId;
//!
//! let id = UserId::new();
//! let state = AuthState::resolved(
//!     Some(Session::new("token", id)),
//!     Some(User::new(id, "Lali", Some(Role::Member))),
//!     1,
//! );
//!
//! assert!(state.permissions().can_update_task_status());
//! assert!(!state.permissions().can_create_project());
//!
//! let admin_only: RouteGuard = RouteGuard::new(GuardConfig::new().require_admin());
//! assert_eq!(admin_only.evaluate(&state).redirect_target(), Some("/home"));
//! ```

pub mod capability;
pub mod error;
pub mod guard;
pub mod permission;
pub mod role;
pub mod session;

pub use capability::Capability;
pub use error::AccessDenied;
pub use guard::{
    GuardConfig, GuardDecision, GuardState, RouteGuard, DEFAULT_LOGIN_PATH,
    DEFAULT_UNAUTHORIZED_PATH,
};
pub use permission::{capabilities_for, CapabilityFlags, Permissions};
pub use role::{Role, UnknownRole};
pub use session::{AuthState, Session, User};
