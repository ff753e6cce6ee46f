//! JSON file session store
//!
//! Persists each session as `<sid>.json` in a directory so sessions
//! survive process restarts. Atomic writes via temp file + rename
//! prevent torn records.

use super::SessionStore;
use crate::error::{Result, SessionError};
use crate::types::SessionRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Directory-backed session store
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a new file store rooted at `dir`
    ///
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, sid: &str) -> Result<PathBuf> {
        validate_sid(sid)?;
        Ok(self.dir.join(sid).with_extension(EXTENSION))
    }

    async fn session_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::store(
                "file",
                format!("Failed to remove {}: {}", path.display(), e),
            )),
        }
    }
}

/// Session ids become file names, so only `[A-Za-z0-9_-]` is allowed.
fn validate_sid(sid: &str) -> Result<()> {
    let valid = !sid.is_empty()
        && sid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidSessionId(sid.to_string()))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, sid: &str) -> Result<Option<SessionRecord>> {
        let path = self.session_path(sid)?;

        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::store(
                    "file",
                    format!("Failed to read session file {}: {}", path.display(), e),
                ))
            }
        };

        let record: SessionRecord = serde_json::from_str(&json).map_err(|e| {
            SessionError::store(
                "file",
                format!("Failed to parse session file {}: {}", path.display(), e),
            )
        })?;

        if record.is_expired() {
            self.remove(&path).await?;
            tracing::debug!(sid = %sid, "Expired session file removed");
            return Ok(None);
        }

        tracing::debug!(path = %path.display(), "Session loaded");
        Ok(Some(record))
    }

    async fn set(&self, sid: &str, record: &SessionRecord) -> Result<()> {
        let path = self.session_path(sid)?;
        let json = serde_json::to_string_pretty(record)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            SessionError::store(
                "file",
                format!(
                    "Failed to create session directory {}: {}",
                    self.dir.display(),
                    e
                ),
            )
        })?;

        // Atomic write: write to a per-writer temp file, then rename
        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            SessionError::store(
                "file",
                format!("Failed to write session file {}: {}", tmp_path.display(), e),
            )
        })?;

        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            SessionError::store(
                "file",
                format!(
                    "Failed to rename session file {} → {}: {}",
                    tmp_path.display(),
                    path.display(),
                    e
                ),
            )
        })?;

        tracing::debug!(path = %path.display(), "Session saved");
        Ok(())
    }

    async fn destroy(&self, sid: &str) -> Result<()> {
        let path = self.session_path(sid)?;
        self.remove(&path).await
    }

    async fn length(&self) -> Result<usize> {
        Ok(self.session_files().await?.len())
    }

    async fn clear(&self) -> Result<()> {
        for path in self.session_files().await? {
            self.remove(&path).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
