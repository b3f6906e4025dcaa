//! Durable storage for the session record.
//!
//! The record is one JSON file overwritten wholesale on every mutation. Writes
//! go to a sibling temp file that is then renamed over the target, so the old
//! record stays readable until the new one is complete.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::state::{PartialSession, SessionState, StoredSession};
use super::SessionError;

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored record, if a readable one exists.
    ///
    /// An unreadable or corrupt file is logged and ignored.
    pub fn load(&self) -> Option<PartialSession> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session state unreadable, starting fresh");
                return None;
            }
        };

        match serde_json::from_str::<PartialSession>(&text) {
            Ok(partial) => Some(partial),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session state corrupt, starting fresh");
                None
            }
        }
    }

    /// Atomically replace the stored record.
    pub fn save(&self, state: &SessionState, timestamp: String) -> Result<(), SessionError> {
        let stored = StoredSession { state, timestamp };
        let json = serde_json::to_string_pretty(&stored)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.persistence_error(e))?;
            }
        }

        let tmp = self.tmp_path();
        let write = || -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.persistence_error(e)
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persistence_error(&self, source: io::Error) -> SessionError {
        SessionError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}
