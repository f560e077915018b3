//! Persisted CLI session.
//!
//! The signed-in [`Session`] is stored as pretty-printed JSON so the next
//! invocation can restore it with [`AuthBackend::set_session`](crate::backend::AuthBackend::set_session).
//! Writes go to a temp file first and are renamed into place.

use std::path::{Path, PathBuf};
use taskdeck_auth::Session;
use taskdeck_types::ErrorCode;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SessionFileError {
    #[error("session file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed session file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SessionFileError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ErrorCode for SessionFileError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "SESSION_FILE_IO",
            Self::Malformed { .. } => "SESSION_FILE_MALFORMED",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A malformed file is discarded by signing in again.
        matches!(self, Self::Malformed { .. })
    }
}

/// Location of the persisted session.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "session.json".into(), |n| n.to_string_lossy().into_owned());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    /// Reads the stored session. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`SessionFileError`] for unreadable or malformed files.
    pub async fn load(&self) -> Result<Option<Session>, SessionFileError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionFileError::io(&self.path, e)),
        };
        let session = serde_json::from_str(&json).map_err(|source| SessionFileError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "session restored from file");
        Ok(Some(session))
    }

    /// Writes `session`, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// [`SessionFileError::Io`] if the file cannot be written.
    pub async fn save(&self, session: &Session) -> Result<(), SessionFileError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionFileError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(session).map_err(|source| {
            SessionFileError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        let temp = self.temp_path();
        fs::write(&temp, json)
            .await
            .map_err(|e| SessionFileError::io(&temp, e))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| SessionFileError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Removes the stored session. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// [`SessionFileError::Io`] if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), SessionFileError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionFileError::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use taskdeck_types::UserId;

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(file.load().await.unwrap().is_none());
        file.clear().await.unwrap();
    }

    #[tokio::test]
    async fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested").join("session.json"));
        let session = Session::new("access", UserId::new())
            .with_refresh_token("refresh")
            .with_expiry(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());

        file.save(&session).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(session));
        assert!(!dir.path().join("nested").join(".session.json.tmp").exists());

        file.clear().await.unwrap();
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_file_reports_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = SessionFile::new(&path).load().await.unwrap_err();
        assert_eq!(err.code(), "SESSION_FILE_MALFORMED");
        assert!(err.is_recoverable());
    }
}
