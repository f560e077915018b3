//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.taskdeck/config.toml`)
//! 3. Project config (`.taskdeck/config.toml`)
//! 4. Environment variables (`TASKDECK_*`)
//!
//! Each layer overrides the previous. CLI flags are applied afterwards
//! through a [`ConfigResolver`](super::ConfigResolver).

use super::{
    default_config_path, ConfigError, TaskdeckConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Helper macro for parsing boolean environment variables.
macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```
/// use taskdeck_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .skip_global_config()
///     .skip_project_config()
///     .skip_env_vars()
///     .load()
///     .unwrap();
/// assert_eq!(config.routes.login, "/login");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.taskdeck/config.toml).
    global_config_path: Option<PathBuf>,

    /// Project root directory.
    project_root: Option<PathBuf>,

    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root directory.
    ///
    /// Project config will be loaded from `<project_root>/.taskdeck/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any config file exists but cannot be parsed,
    /// or an environment variable holds an invalid value. Missing config
    /// files are silently ignored.
    pub fn load(&self) -> Result<TaskdeckConfig, ConfigError> {
        let mut config = TaskdeckConfig::default();

        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global_config) = load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global_config);
            }
        }

        if !self.skip_project {
            if let Some(ref project_root) = self.project_root {
                let project_config_path = project_root
                    .join(PROJECT_CONFIG_DIR)
                    .join(PROJECT_CONFIG_FILE);

                if let Some(project_config) = load_file(&project_config_path)? {
                    debug!(
                        path = %project_config_path.display(),
                        project = %project_root.display(),
                        "Loaded project config"
                    );
                    config.merge(&project_config);
                }
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }
}

/// Loads a config file, returning None if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<TaskdeckConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config =
        TaskdeckConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

    Ok(Some(config))
}

/// Applies environment variable overrides.
fn apply_env_vars(config: &mut TaskdeckConfig) -> Result<(), ConfigError> {
    parse_env_bool!(config.debug, "TASKDECK_DEBUG");

    if let Ok(val) = std::env::var("TASKDECK_URL") {
        config.backend.url = Some(val);
    }
    if let Ok(val) = std::env::var("TASKDECK_ANON_KEY") {
        config.backend.anon_key = Some(val);
    }
    if let Ok(val) = std::env::var("TASKDECK_TIMEOUT_SECS") {
        config.backend.timeout_secs = val
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid_env_var("TASKDECK_TIMEOUT_SECS", "expected seconds"))?;
    }
    if let Ok(val) = std::env::var("TASKDECK_LOGIN_PATH") {
        config.routes.login = val;
    }
    if let Ok(val) = std::env::var("TASKDECK_UNAUTHORIZED_PATH") {
        config.routes.unauthorized = val;
    }
    if let Ok(val) = std::env::var("TASKDECK_SESSION_FILE") {
        config.paths.session_file = Some(PathBuf::from(val));
    }

    Ok(())
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, TaskdeckConfig::default());
    }

    #[test]
    fn load_global_config() {
        let temp = TempDir::new().unwrap();
        let config_path = create_config_file(
            temp.path(),
            r#"
debug = true

[backend]
url = "https://global.example.co"
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&config_path)
            .skip_project_config()
            .skip_env_vars()
            .load()
            .unwrap();

        assert!(config.debug);
        assert_eq!(config.backend.url.as_deref(), Some("https://global.example.co"));
    }

    #[test]
    fn load_project_overrides_global() {
        let global_temp = TempDir::new().unwrap();
        let project_temp = TempDir::new().unwrap();

        let project_dir = project_temp.path().join(".taskdeck");
        std::fs::create_dir_all(&project_dir).unwrap();

        let global_path = create_config_file(
            global_temp.path(),
            r#"
debug = true

[backend]
url = "https://global.example.co"
anon_key = "global-key"
"#,
        );

        create_config_file(
            &project_dir,
            r#"
[backend]
url = "https://project.example.co"

[routes]
unauthorized = "/dashboard"
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global_path)
            .with_project_root(project_temp.path())
            .skip_env_vars()
            .load()
            .unwrap();

        assert!(config.debug);
        assert_eq!(config.backend.url.as_deref(), Some("https://project.example.co"));
        assert_eq!(config.backend.anon_key.as_deref(), Some("global-key"));
        assert_eq!(config.routes.unauthorized, "/dashboard");
        assert_eq!(config.routes.login, "/login");
    }

    #[test]
    fn missing_config_files_ok() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/path/config.toml")
            .with_project_root("/nonexistent/project")
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, TaskdeckConfig::default());
    }

    #[test]
    fn malformed_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = create_config_file(temp.path(), "debug = \"maybe\"");

        let err = ConfigLoader::new()
            .with_global_config(&path)
            .skip_env_vars()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for s in ["true", "On", "1", "YES"] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["false", "off", "0", "No"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn env_var_override() {
        // Only test that touches TASKDECK_* variables.
        std::env::set_var("TASKDECK_LOGIN_PATH", "/env-login");
        std::env::set_var("TASKDECK_SESSION_FILE", "/tmp/env-session.json");
        std::env::set_var("TASKDECK_TIMEOUT_SECS", "7");

        let result = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::set_var("TASKDECK_TIMEOUT_SECS", "soon");
        let invalid = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::remove_var("TASKDECK_LOGIN_PATH");
        std::env::remove_var("TASKDECK_SESSION_FILE");
        std::env::remove_var("TASKDECK_TIMEOUT_SECS");

        let config = result.unwrap();
        assert_eq!(config.routes.login, "/env-login");
        assert_eq!(
            config.paths.session_file,
            Some(PathBuf::from("/tmp/env-session.json"))
        );
        assert_eq!(config.backend.timeout_secs, 7);
        assert!(matches!(
            invalid,
            Err(ConfigError::InvalidEnvVar { ref name, .. }) if name == "TASKDECK_TIMEOUT_SECS"
        ));
    }
}
