//! taskdeck runtime: session ownership, backends and gated data access.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  taskdeck-types : IDs, ErrorCode                            │
//! │  taskdeck-auth  : Role, Capability, Permissions, RouteGuard │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Runtime Layer (THIS CRATE)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  backend/  : AuthBackend, DataBackend, RealtimeBackend      │
//! │              MemoryBackend, RestBackend                     │
//! │  store     : SessionStore (single writer of AuthState)      │
//! │  service/  : Gate + project/task/user/comment services      │
//! │  live      : LiveList (subscribe and re-fetch)              │
//! │  config/   : layered TOML configuration                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  taskdeck-cli : `taskdeck` binary                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use taskdeck_auth::{GuardConfig, Role, RouteGuard};
//! use taskdeck_runtime::backend::{AuthBackend, MemoryBackend};
//! use taskdeck_runtime::SessionStore;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = Arc::new(MemoryBackend::new());
//! backend.add_user("ana@example.com", "pw", "Ana", Some(Role::Admin));
//!
//! let store = SessionStore::start(backend.clone());
//! let admin_page: RouteGuard = RouteGuard::new(GuardConfig::new().require_admin());
//!
//! let state = store.resolved().await;
//! assert_eq!(admin_page.evaluate(&state).redirect_target(), Some("/login"));
//!
//! backend.sign_in_with_password("ana@example.com", "pw").await.unwrap();
//! let state = store.settled_after(state.generation).await;
//! assert!(admin_page.evaluate(&state).renders_children());
//! # });
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod live;
pub mod models;
pub mod service;
pub mod session_file;
pub mod store;

pub use backend::{AuthBackend, Backend, DataBackend, MemoryBackend, RealtimeBackend, RestBackend};
pub use error::{BackendError, ServiceError};
pub use live::{LiveList, LiveState};
pub use service::{CommentService, Gate, ProjectService, Services, TaskService, UserService};
pub use session_file::{SessionFile, SessionFileError};
pub use store::SessionStore;
