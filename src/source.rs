//! Delete, create and rename notifications for one file, via the notify crate.

use crate::error::{Error, Result};
use crate::registry::WatchId;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A notification routed to the coordination task.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub id: WatchId,
    pub kind: ChangeKind,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Removed(PathBuf),
    Created(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    /// One half of a rename the backend reported without its pair: the path
    /// the file was renamed away from.
    RenamedFrom(PathBuf),
    /// The other half: the path a file was renamed onto.
    RenamedTo(PathBuf),
    /// The watch itself failed after setup.
    Error(String),
}

/// Watches the parent directory of one file and forwards the events that
/// matter for it. Content changes are left to polling.
pub struct ChangeSource {
    watcher: Option<RecommendedWatcher>,
    file_path: PathBuf,
    watched_dir: PathBuf,
}

impl ChangeSource {
    /// Starts watching `path`'s directory. Events are tagged with `id` and
    /// sent on `events` from notify's own thread.
    pub fn bind<P: AsRef<Path>>(
        id: WatchId,
        path: P,
        events: mpsc::UnboundedSender<ChangeEvent>,
    ) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        let watched_dir = watch_dir(&file_path);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let kind = match res {
                    Ok(event) => classify_event(event),
                    Err(e) => Some(watch_error(e)),
                };
                if let Some(kind) = kind {
                    let _ = events.send(ChangeEvent {
                        id,
                        kind,
                        timestamp: Instant::now(),
                    });
                }
            },
            Config::default(),
        )
        .map_err(|source| Error::WatchSetup {
            path: watched_dir.clone(),
            source,
        })?;

        watcher
            .watch(&watched_dir, RecursiveMode::NonRecursive)
            .map_err(|source| Error::WatchSetup {
                path: watched_dir.clone(),
                source,
            })?;

        debug!("{} watching {}", id, watched_dir.display());
        Ok(Self {
            watcher: Some(watcher),
            file_path,
            watched_dir,
        })
    }

    /// Points the source at the file's new path. The new directory is watched
    /// before the old one is dropped.
    pub fn rebind<P: AsRef<Path>>(&mut self, new_path: P) -> Result<()> {
        let new_path = new_path.as_ref().to_path_buf();
        let new_dir = watch_dir(&new_path);
        self.file_path = new_path;

        if new_dir == self.watched_dir {
            return Ok(());
        }

        if let Some(watcher) = self.watcher.as_mut() {
            watcher
                .watch(&new_dir, RecursiveMode::NonRecursive)
                .map_err(|source| Error::WatchSetup {
                    path: new_dir.clone(),
                    source,
                })?;
            if let Err(e) = watcher.unwatch(&self.watched_dir) {
                trace!("Unwatch {} failed: {}", self.watched_dir.display(), e);
            }
        }

        self.watched_dir = new_dir;
        Ok(())
    }

    /// Stops watching. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.watcher.take().is_some() {
            trace!("Stopped watching {}", self.watched_dir.display());
        }
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn watched_dir(&self) -> &Path {
        &self.watched_dir
    }
}

/// Directory to register with notify; bare file names live in the current
/// directory.
fn watch_dir(file_path: &Path) -> PathBuf {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// A failure reported by notify after setup, rendered the way
/// [`Error::Watcher`] displays it.
pub(crate) fn watch_error(error: notify::Error) -> ChangeKind {
    ChangeKind::Error(Error::from(error).to_string())
}

/// Maps a raw notify event onto the kinds the state machine acts on.
///
/// A paired rename becomes `Renamed`. Backends that only report halves
/// (Windows, kqueue) yield `RenamedFrom` and `RenamedTo`, which the watched
/// file pairs up itself.
pub(crate) fn classify_event(event: Event) -> Option<ChangeKind> {
    let mut paths = event.paths.into_iter();
    match event.kind {
        EventKind::Remove(_) => paths.next().map(ChangeKind::Removed),
        EventKind::Create(_) => paths.next().map(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(mode)) => {
            let first = paths.next()?;
            match mode {
                RenameMode::Both => match paths.next() {
                    Some(to) => Some(ChangeKind::Renamed { from: first, to }),
                    None => Some(ChangeKind::RenamedFrom(first)),
                },
                RenameMode::From => Some(ChangeKind::RenamedFrom(first)),
                RenameMode::To => Some(ChangeKind::RenamedTo(first)),
                // Backends that cannot tell the halves apart report each path
                // on its own.
                _ => {
                    if first.exists() {
                        Some(ChangeKind::RenamedTo(first))
                    } else {
                        Some(ChangeKind::RenamedFrom(first))
                    }
                }
            }
        }
        _ => None,
    }
}

/// Check if a change concerns a specific file, by file name.
///
/// A lone `RenamedTo` for another name only matters while its `RenamedFrom`
/// half is pending; the watched file decides that.
pub fn is_change_relevant_to_file(kind: &ChangeKind, target: &Path) -> bool {
    let Some(target_name) = target.file_name() else {
        return false;
    };
    let matches = |path: &Path| path.file_name() == Some(target_name);

    match kind {
        ChangeKind::Removed(path)
        | ChangeKind::Created(path)
        | ChangeKind::RenamedFrom(path)
        | ChangeKind::RenamedTo(path) => matches(path),
        ChangeKind::Renamed { from, to } => matches(from) || matches(to),
        ChangeKind::Error(_) => true,
    }
}
