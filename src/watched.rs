//! One open tab: cursor, change source and display, driven as a state machine.

use crate::config::{DELETED_TEXT, WatchConfig};
use crate::cursor::{Chunk, FileCursor};
use crate::display::DisplaySink;
use crate::error::{Error, Result};
use crate::registry::WatchId;
use crate::source::{ChangeEvent, ChangeKind, ChangeSource, is_change_relevant_to_file};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Handle open and display in sync with the last read.
    Live,
    /// The file was removed; the display shows the deleted marker.
    Deleted,
    /// A rename or recreate is being handled.
    Reopening,
}

pub struct WatchedFile<S> {
    id: WatchId,
    path: PathBuf,
    label: String,
    cursor: FileCursor,
    source: Option<ChangeSource>,
    sink: S,
    state: WatchState,
    auto_scroll: bool,
    /// Old path of a rename whose second half has not arrived yet.
    pending_rename: Option<PathBuf>,
    /// Old path of a rename already followed from its halves.
    followed_rename: Option<PathBuf>,
    /// Error text currently on display, so a persisting failure renders once.
    shown_error: Option<String>,
}

impl<S: DisplaySink> WatchedFile<S> {
    /// Opens `path`, renders its content and starts watching it.
    ///
    /// Nothing is rendered if the open fails. If the change source cannot
    /// bind, the file is still followed by polling alone.
    pub async fn open<P: AsRef<Path>>(
        id: WatchId,
        path: P,
        mut sink: S,
        events: &mpsc::UnboundedSender<ChangeEvent>,
        config: &WatchConfig,
    ) -> Result<Self> {
        let path = std::path::absolute(path.as_ref()).map_err(|e| Error::InvalidPath {
            message: e.to_string(),
        })?;
        let label = label_for(&path)?;
        let (text, cursor) = FileCursor::open(&path).await?;

        let source = match ChangeSource::bind(id, &path, events.clone()) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!("{}: {}; following by polling only", id, e);
                None
            }
        };

        sink.set_label(&label);
        sink.set_text(&text);

        let mut file = Self {
            id,
            path,
            label,
            cursor,
            source,
            sink,
            state: WatchState::Live,
            auto_scroll: config.auto_scroll,
            pending_rename: None,
            followed_rename: None,
            shown_error: None,
        };
        file.scroll();
        info!("{} opened {}", id, file.path.display());
        Ok(file)
    }

    /// Reads new content if the file's size moved since the last read.
    ///
    /// Returns whether a read was made. Errors are rendered inline.
    pub async fn poll(&mut self) -> bool {
        if self.state != WatchState::Live {
            return false;
        }

        match self.cursor.current_len().await {
            Ok(len) if len == self.cursor.last_len() => return false,
            Ok(_) => {}
            Err(e) => {
                self.show_error(&e);
                return false;
            }
        }

        match self.cursor.read_incremental().await {
            Ok(chunk) => self.render(chunk),
            Err(e) => self.show_error(&e),
        }
        true
    }

    /// Applies a change notification. Events for other files in the same
    /// directory are ignored.
    ///
    /// A `RenamedFrom` half pairs with the event directly after it when that
    /// is a `RenamedTo`, whatever its name.
    pub async fn handle_change(&mut self, kind: ChangeKind) {
        let pending = self.pending_rename.take();
        let followed = self.followed_rename.take();
        let pairs_pending = pending.is_some() && matches!(kind, ChangeKind::RenamedTo(_));
        if !pairs_pending && !is_change_relevant_to_file(&kind, &self.path) {
            return;
        }
        debug!("{} change: {:?}", self.id, kind);

        match kind {
            ChangeKind::Error(message) => self.show_error(&message),
            ChangeKind::Removed(_) => self.mark_deleted(),
            ChangeKind::Created(_) => self.reopen().await,
            ChangeKind::RenamedFrom(from) => {
                // Stays deleted if the file left the directory.
                self.mark_deleted();
                self.pending_rename = Some(from);
            }
            ChangeKind::RenamedTo(to) => {
                if to.file_name() == self.path.file_name() {
                    self.reopen().await;
                } else if let Some(from) = pending {
                    self.rename_to(to).await;
                    self.followed_rename = Some(from);
                }
            }
            ChangeKind::Renamed { from, to } => {
                if followed.as_ref() == Some(&from) && to.file_name() == self.path.file_name() {
                    // inotify repeats the pair after its halves.
                    debug!("{} already followed {}", self.id, to.display());
                } else if from.file_name() == self.path.file_name() {
                    self.rename_to(to).await;
                } else {
                    // Another file was renamed onto ours.
                    self.reopen().await;
                }
            }
        }
    }

    /// Re-reads the whole file. A deleted entry tries to reopen its path.
    ///
    /// On failure the display is left as it was.
    pub async fn refresh(&mut self) -> Result<()> {
        let text = match self.state {
            WatchState::Live => self.cursor.read_full().await?,
            WatchState::Deleted | WatchState::Reopening => {
                self.cursor.close();
                let (text, cursor) = FileCursor::open(&self.path).await?;
                self.cursor = cursor;
                self.state = WatchState::Live;
                text
            }
        };

        self.set_text(&text);
        self.scroll();
        Ok(())
    }

    /// Releases the handle and the change source.
    pub fn close(&mut self) {
        self.cursor.close();
        if let Some(source) = self.source.as_mut() {
            source.close();
        }
        debug!("{} closed {}", self.id, self.path.display());
    }

    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn cursor(&self) -> &FileCursor {
        &self.cursor
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Whether delete/rename notifications are being received.
    pub fn is_notified(&self) -> bool {
        self.source.as_ref().is_some_and(ChangeSource::is_active)
    }

    fn mark_deleted(&mut self) {
        if self.state == WatchState::Deleted {
            return;
        }
        info!("{} deleted: {}", self.id, self.path.display());
        self.state = WatchState::Deleted;
        self.set_text(DELETED_TEXT);
    }

    /// The path holds a new file: drop the stale handle and load it fresh.
    async fn reopen(&mut self) {
        self.state = WatchState::Reopening;
        self.cursor.close();

        match FileCursor::open(&self.path).await {
            Ok((text, cursor)) => {
                info!("{} reloaded {}", self.id, self.path.display());
                self.cursor = cursor;
                self.state = WatchState::Live;
                self.set_text(&text);
                self.scroll();
            }
            Err(e) => {
                self.state = WatchState::Deleted;
                self.show_error(&e);
            }
        }
    }

    /// Follows the file to its new name. Content is reloaded in full.
    async fn rename_to(&mut self, new_path: PathBuf) {
        info!(
            "{} renamed {} -> {}",
            self.id,
            self.path.display(),
            new_path.display()
        );
        self.state = WatchState::Reopening;
        self.cursor.close();
        self.path = new_path;

        if let Some(source) = self.source.as_mut() {
            if let Err(e) = source.rebind(&self.path) {
                warn!("{}: {}", self.id, e);
            }
        }

        match FileCursor::open(&self.path).await {
            Ok((text, cursor)) => {
                self.cursor = cursor;
                self.state = WatchState::Live;
                self.set_text(&text);
                if let Ok(label) = label_for(&self.path) {
                    self.label = label;
                    self.sink.set_label(&self.label);
                }
                self.scroll();
            }
            Err(e) => {
                self.state = WatchState::Deleted;
                self.show_error(&e);
            }
        }
    }

    fn render(&mut self, chunk: Chunk) {
        if chunk.did_reset {
            self.set_text(&chunk.text);
        } else if !chunk.text.is_empty() {
            self.shown_error = None;
            self.sink.append_text(&chunk.text);
        } else {
            return;
        }
        self.scroll();
    }

    fn set_text(&mut self, text: &str) {
        self.shown_error = None;
        self.sink.set_text(text);
    }

    /// Replaces the text with the error, unless that error is already shown.
    fn show_error(&mut self, error: &dyn fmt::Display) {
        let text = format!("ERROR: {}", error);
        if self.shown_error.as_deref() == Some(text.as_str()) {
            return;
        }
        warn!("{} ({}): {}", self.id, self.path.display(), error);
        self.sink.set_text(&text);
        self.shown_error = Some(text);
    }

    fn scroll(&mut self) {
        if self.auto_scroll {
            self.sink.scroll_to_end();
        }
    }
}

impl<S> fmt::Debug for WatchedFile<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedFile")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("state", &self.state)
            .field("offset", &self.cursor.offset())
            .finish()
    }
}

/// Tab label: the file name.
fn label_for(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath {
            message: format!("{} has no file name", path.display()),
        })
}
