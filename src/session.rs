//! Persisted tab list, restored at startup and saved at shutdown.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The ordered list of files that were open.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub tabs: Vec<PathBuf>,
}

impl Session {
    pub fn new<I, P>(tabs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut session = Session::default();
        for tab in tabs {
            session.push(tab);
        }
        session
    }

    /// Adds a tab unless the same path is already listed.
    pub fn push<P: Into<PathBuf>>(&mut self, tab: P) {
        let tab = tab.into();
        if !self.tabs.contains(&tab) {
            self.tabs.push(tab);
        }
    }

    /// Loads the session at `path`.
    ///
    /// A missing file is an empty session. An unreadable or corrupt one is
    /// logged and replaced by an empty session.
    pub fn load<P: AsRef<Path>>(path: P) -> Session {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("No session at {}", path.display());
                Session::default()
            }
            Err(e) => {
                warn!("{}; starting with no tabs", e);
                Session::default()
            }
        }
    }

    /// Like [`load`](Self::load) but reports failures.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Option<Session>> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(session_error(path, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| session_error(path, e))
    }

    /// Writes the session, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| session_error(path, e))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| session_error(path, e))?;
        std::fs::write(path, json).map_err(|e| session_error(path, e))?;
        debug!("Saved {} tabs to {}", self.tabs.len(), path.display());
        Ok(())
    }
}

fn session_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Session {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
