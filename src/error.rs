//! Error types for the log watcher library.

use crate::registry::WatchId;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for log watcher operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors while reading an already open file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors reported by the notify crate after a watch was set up.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// The file could not be opened (missing, permissions, locked).
    #[error("Cannot open {}: {}", path.display(), source)]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The change source could not bind to the file's directory.
    #[error("Cannot watch {}: {}", path.display(), source)]
    WatchSetup {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// File path errors.
    #[error("Invalid file path: {message}")]
    InvalidPath { message: String },

    /// No open tab carries this id.
    #[error("No watched file with id {0}")]
    UnknownWatch(WatchId),

    /// The session file could not be read or written.
    #[error("Session file {}: {}", path.display(), message)]
    Session { path: PathBuf, message: String },

    /// The coordination task has stopped.
    #[error("Stream closed")]
    StreamClosed,
}

impl Error {
    /// Wraps an I/O error raised while opening `path`.
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Open {
            path: path.into(),
            source,
        }
    }
}

/// A convenient Result type for log watcher operations.
pub type Result<T> = std::result::Result<T, Error>;
