//! Live-updating views of log files.
//!
//! Each open file is a tab with its own read cursor. A one second size poll
//! picks up growth and reads only the appended bytes; truncation is detected
//! and triggers a full reload. Deletes, recreates and renames come from the
//! notify crate, so a tab follows its file when it is renamed and reloads it
//! when it is recreated.
//!
//! # Example
//!
//! ```rust,no_run
//! use log_watcher::{DisplayChange, LogWatcher, WatchConfig};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut watcher = LogWatcher::new(WatchConfig::default());
//!     watcher.open("app.log").await?;
//!
//!     while let Some(update) = watcher.next().await {
//!         match update.change {
//!             DisplayChange::SetText(text) => print!("{}", text),
//!             DisplayChange::AppendText(delta) => print!("{}", delta),
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod config;
mod cursor;
mod display;
mod error;
mod registry;
mod scheduler;
mod session;
mod source;
mod stream;
mod watched;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use config::{DEFAULT_POLL_INTERVAL, DELETED_TEXT, MIN_POLL_INTERVAL, WatchConfig};
pub use cursor::{Chunk, FileCursor};
pub use display::{ChannelSink, DisplayChange, DisplaySink, DisplayUpdate, TextBuffer};
pub use error::{Error, Result};
pub use registry::{WatchId, WatchRegistry};
pub use scheduler::PollScheduler;
pub use session::Session;
pub use source::{ChangeEvent, ChangeKind, ChangeSource, is_change_relevant_to_file};
pub use stream::LogWatcher;
pub use watched::{WatchState, WatchedFile};

use std::path::PathBuf;

/// Starts a watcher with default settings and opens every path, in order.
///
/// Fails on the first path that cannot be opened.
///
/// # Example
///
/// ```rust,no_run
/// use log_watcher::watch_logs;
/// use tokio_stream::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut watcher = watch_logs(["app.log", "worker.log"]).await?;
///
///     while let Some(update) = watcher.next().await {
///         println!("{}: {:?}", update.id, update.change);
///     }
///
///     Ok(())
/// }
/// ```
pub async fn watch_logs<I, P>(paths: I) -> Result<LogWatcher>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let watcher = LogWatcher::new(WatchConfig::default());
    for path in paths {
        watcher.open(path.into()).await?;
    }
    Ok(watcher)
}
