//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────────┐
//! │  1. CLI flags (ConfigResolver)              │  Per invocation
//! ├─────────────────────────────────────────────┤
//! │  2. Environment Variables (TASKDECK_*)      │  Runtime override
//! ├─────────────────────────────────────────────┤
//! │  3. Project Config (.taskdeck/config.toml)  │  Project-specific
//! ├─────────────────────────────────────────────┤
//! │  4. Global Config (~/.taskdeck/config.toml) │  User defaults
//! ├─────────────────────────────────────────────┤
//! │  5. Default Values (compile-time)           │  Fallback
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Directory Structure
//!
//! ```text
//! ~/.taskdeck/
//! ├── config.toml      # Global configuration
//! └── session.json     # Last signed-in session (CLI only)
//!
//! <project>/.taskdeck/
//! └── config.toml      # Project configuration (overrides global)
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `TASKDECK_DEBUG` | `debug` | bool |
//! | `TASKDECK_URL` | `backend.url` | String |
//! | `TASKDECK_ANON_KEY` | `backend.anon_key` | String |
//! | `TASKDECK_TIMEOUT_SECS` | `backend.timeout_secs` | u64 |
//! | `TASKDECK_LOGIN_PATH` | `routes.login` | String |
//! | `TASKDECK_UNAUTHORIZED_PATH` | `routes.unauthorized` | String |
//! | `TASKDECK_SESSION_FILE` | `paths.session_file` | PathBuf |
//!
//! # Example Configuration
//!
//! ```toml
//! debug = false
//!
//! [backend]
//! url = "https://xyzcompany.supabase.co"
//! anon_key = "public-anon-key"
//! timeout_secs = 30
//!
//! [routes]
//! login = "/login"
//! unauthorized = "/home"
//!
//! [paths]
//! session_file = "~/.taskdeck/session.json"
//!
//! [log]
//! level = "warn"
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use resolver::{ConfigResolver, NoOpResolver};
pub use types::{BackendConfig, LogConfig, PathsConfig, RoutesConfig, TaskdeckConfig};

use std::path::PathBuf;

/// Default global config directory.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskdeck")
}

/// Default global config file path.
#[must_use]
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Default session file path.
#[must_use]
pub fn default_session_path() -> PathBuf {
    default_config_dir().join("session.json")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".taskdeck";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
