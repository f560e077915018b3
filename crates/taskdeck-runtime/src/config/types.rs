//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use super::{default_session_path, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use taskdeck_auth::{GuardConfig, DEFAULT_LOGIN_PATH, DEFAULT_UNAUTHORIZED_PATH};

/// Main configuration structure.
///
/// This is the unified configuration after merging all layers.
///
/// # Example
///
/// ```
/// use taskdeck_runtime::config::TaskdeckConfig;
///
/// let config = TaskdeckConfig::default();
/// assert!(!config.debug);
/// assert_eq!(config.routes.login, "/login");
/// assert_eq!(config.routes.unauthorized, "/home");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaskdeckConfig {
    /// Enable debug logging.
    pub debug: bool,

    /// Hosted backend connection.
    pub backend: BackendConfig,

    /// Guard redirect targets.
    pub routes: RoutesConfig,

    /// File locations.
    pub paths: PathsConfig,

    /// Log filter settings.
    pub log: LogConfig,
}

impl TaskdeckConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.debug != default.debug {
            self.debug = other.debug;
        }

        self.backend.merge(&other.backend);
        self.routes.merge(&other.routes);
        self.paths.merge(&other.paths);
        self.log.merge(&other.log);
    }

    /// Builds a route guard configuration using the configured redirects.
    #[must_use]
    pub fn guard_config<F>(&self, require_admin: bool) -> GuardConfig<F> {
        GuardConfig::new()
            .with_require_admin(require_admin)
            .redirect_to(self.routes.login.clone())
            .unauthorized_redirect(self.routes.unauthorized.clone())
    }

    /// Returns the session file path, falling back to `~/.taskdeck/session.json`.
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        self.paths
            .session_file
            .clone()
            .unwrap_or_else(default_session_path)
    }

    /// Returns the log filter directive: `debug` when debug mode is on.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log.level
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: Option<String>,

    /// Public anon key sent as `apikey`.
    pub anon_key: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.url.is_some() {
            self.url = other.url.clone();
        }
        if other.anon_key.is_some() {
            self.anon_key = other.anon_key.clone();
        }
        if other.timeout_secs != default.timeout_secs {
            self.timeout_secs = other.timeout_secs;
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns `(url, anon_key)`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when either is unset or blank.
    pub fn endpoint(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing {
                field: "backend.url",
                hint: "TASKDECK_URL or [backend] url",
            })?;
        let key = self
            .anon_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing {
                field: "backend.anon_key",
                hint: "TASKDECK_ANON_KEY or [backend] anon_key",
            })?;
        Ok((url, key))
    }
}

/// Route guard redirect targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoutesConfig {
    /// Where unauthenticated visitors go.
    pub login: String,

    /// Where signed-in users lacking the required role go.
    pub unauthorized: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_PATH.into(),
            unauthorized: DEFAULT_UNAUTHORIZED_PATH.into(),
        }
    }
}

impl RoutesConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.login != default.login {
            self.login = other.login.clone();
        }
        if other.unauthorized != default.unauthorized {
            self.unauthorized = other.unauthorized.clone();
        }
    }
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Where the CLI persists the signed-in session.
    pub session_file: Option<PathBuf>,
}

impl PathsConfig {
    fn merge(&mut self, other: &Self) {
        if other.session_file.is_some() {
            self.session_file = other.session_file.clone();
        }
    }
}

/// Log configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl LogConfig {
    fn merge(&mut self, other: &Self) {
        if other.level != Self::default().level {
            self.level = other.level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = TaskdeckConfig::from_toml(
            r#"
debug = true

[backend]
url = "https://demo.supabase.co"
anon_key = "anon"
timeout_secs = 5

[routes]
login = "/signin"
unauthorized = "/"

[paths]
session_file = "/tmp/s.json"

[log]
level = "info"
"#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.backend.endpoint().unwrap(), ("https://demo.supabase.co", "anon"));
        assert_eq!(config.backend.timeout(), Duration::from_secs(5));
        assert_eq!(config.routes.login, "/signin");
        assert_eq!(config.session_file(), PathBuf::from("/tmp/s.json"));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = TaskdeckConfig::from_toml("[routes]\nlogin = \"/auth\"\n").unwrap();
        assert_eq!(config.routes.login, "/auth");
        assert_eq!(config.routes.unauthorized, "/home");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.log_filter(), "warn");
    }

    #[test]
    fn merge_only_overrides_non_defaults() {
        let mut base = TaskdeckConfig::default();
        base.backend.url = Some("https://a".into());
        base.routes.login = "/a".into();

        let mut overlay = TaskdeckConfig::default();
        overlay.routes.unauthorized = "/b".into();

        base.merge(&overlay);
        assert_eq!(base.backend.url.as_deref(), Some("https://a"));
        assert_eq!(base.routes.login, "/a");
        assert_eq!(base.routes.unauthorized, "/b");
    }

    #[test]
    fn endpoint_requires_url_and_key() {
        let mut backend = BackendConfig::default();
        assert!(matches!(
            backend.endpoint(),
            Err(ConfigError::Missing { field: "backend.url", .. })
        ));
        backend.url = Some("https://a".into());
        backend.anon_key = Some("  ".into());
        assert!(matches!(
            backend.endpoint(),
            Err(ConfigError::Missing { field: "backend.anon_key", .. })
        ));
    }

    #[test]
    fn guard_config_uses_routes() {
        let mut config = TaskdeckConfig::default();
        config.routes.login = "/signin".into();
        let guard: GuardConfig = config.guard_config(true);
        assert!(guard.requires_admin());
        assert_eq!(guard.login_path(), "/signin");
        assert_eq!(guard.unauthorized_path(), "/home");
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = TaskdeckConfig::default();
        config.backend.url = Some("https://x".into());
        let toml = config.to_toml().unwrap();
        assert_eq!(TaskdeckConfig::from_toml(&toml).unwrap(), config);
    }
}
