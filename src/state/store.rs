//! Snapshot persistence
//!
//! The whole RunState is written as one JSON document and read back
//! wholesale. A missing file on load is not an error: it means a fresh run.
//! Writes overwrite the file in place, no atomic rename.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::RunState;

/// Errors that can occur reading or writing the snapshot file
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where run state snapshots live
pub trait StateStore: Send + Sync {
    /// Load the persisted state, or None if nothing was persisted yet
    fn load(&self) -> Result<Option<RunState>, StateError>;

    /// Save the state, replacing whatever was there
    fn save(&self, state: &RunState) -> Result<(), StateError>;

    /// Human-readable location, for status messages
    fn location(&self) -> String;
}

/// File-backed snapshot store
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<Option<RunState>, StateError> {
        if !self.path.exists() {
            debug!(path = ?self.path, "load: no snapshot file");
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| StateError::Read {
            path: self.path.clone(),
            source,
        })?;

        let state = serde_json::from_str(&content).map_err(|source| StateError::Decode {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = ?self.path, "load: snapshot loaded");
        Ok(Some(state))
    }

    fn save(&self, state: &RunState) -> Result<(), StateError> {
        let content = serde_json::to_string(state).map_err(|source| StateError::Decode {
            path: self.path.clone(),
            source,
        })?;

        std::fs::write(&self.path, content).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = ?self.path, "save: snapshot written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
