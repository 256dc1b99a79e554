//! The coordination task and the stream of display updates it produces.

use crate::config::WatchConfig;
use crate::display::{ChannelSink, DisplayChange, DisplayUpdate};
use crate::error::{Error, Result};
use crate::registry::{WatchId, WatchRegistry};
use crate::scheduler::PollScheduler;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

enum Command {
    Open {
        path: PathBuf,
        reply: oneshot::Sender<Result<WatchId>>,
    },
    Refresh {
        id: WatchId,
        reply: oneshot::Sender<Result<()>>,
    },
    Close {
        id: WatchId,
        reply: oneshot::Sender<Result<()>>,
    },
    CloseAll {
        reply: oneshot::Sender<usize>,
    },
    OpenPaths {
        reply: oneshot::Sender<Vec<PathBuf>>,
    },
}

/// Handle to a set of watched log files.
///
/// All file state lives on one background task; ticks, notifications and
/// the commands sent through this handle are applied there one at a time.
/// Display changes come out as a [`Stream`] of [`DisplayUpdate`]s.
pub struct LogWatcher {
    commands: mpsc::UnboundedSender<Command>,
    updates: mpsc::UnboundedReceiver<DisplayUpdate>,
    shutdown_tx: broadcast::Sender<()>,
    task_handle: JoinHandle<()>,
}

impl LogWatcher {
    /// Spawns the coordination task. Must be called inside a tokio runtime.
    pub fn new(config: WatchConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task_handle = tokio::spawn(coordination_task(
            config,
            command_rx,
            update_tx,
            shutdown_rx,
        ));

        LogWatcher {
            commands: command_tx,
            updates: update_rx,
            shutdown_tx,
            task_handle,
        }
    }

    /// Opens a new tab. Its label and initial text arrive on the stream.
    pub async fn open<P: AsRef<Path>>(&self, path: P) -> Result<WatchId> {
        let path = path.as_ref().to_path_buf();
        self.request(|reply| Command::Open { path, reply }).await?
    }

    /// Opens each path in order, e.g. a tab list saved by a previous run.
    /// A failing path does not stop the others.
    pub async fn restore<I, P>(&self, paths: I) -> Vec<(PathBuf, Result<WatchId>)>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut results = Vec::new();
        for path in paths {
            let path = path.into();
            let result = self.open(&path).await;
            results.push((path, result));
        }
        results
    }

    /// Re-reads a tab's file in full.
    pub async fn refresh(&self, id: WatchId) -> Result<()> {
        self.request(|reply| Command::Refresh { id, reply }).await?
    }

    /// Closes one tab. A [`DisplayChange::Closed`] follows on the stream.
    pub async fn close(&self, id: WatchId) -> Result<()> {
        self.request(|reply| Command::Close { id, reply }).await?
    }

    /// Closes every tab and returns how many were open.
    pub async fn close_all(&self) -> Result<usize> {
        self.request(|reply| Command::CloseAll { reply }).await
    }

    /// Paths of the open tabs in tab order, without duplicates.
    pub async fn open_paths(&self) -> Result<Vec<PathBuf>> {
        self.request(|reply| Command::OpenPaths { reply }).await
    }

    /// Stops the task after closing every tab.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = (&mut self.task_handle).await {
            error!("Coordination task ended abnormally: {}", e);
        }
    }

    /// Check if the coordination task has gone away
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| Error::StreamClosed)?;
        reply_rx.await.map_err(|_| Error::StreamClosed)
    }
}

impl Drop for LogWatcher {
    fn drop(&mut self) {
        // Ignore errors if the task already stopped.
        let _ = self.shutdown_tx.send(());
    }
}

impl Stream for LogWatcher {
    type Item = DisplayUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.updates).poll_recv(cx)
    }
}

/// Owns the registry. Every tick, notification and command is applied here.
async fn coordination_task(
    config: WatchConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    updates: mpsc::UnboundedSender<DisplayUpdate>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut scheduler = PollScheduler::new(config.poll_interval);
    let mut registry: WatchRegistry<ChannelSink> = WatchRegistry::new(config, events_tx);

    info!(
        "Log watcher started, polling every {:?}",
        scheduler.period()
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                break;
            }

            _ = scheduler.next_tick() => {
                registry.tick().await;
            }

            Some(event) = events_rx.recv() => {
                registry.dispatch(event).await;
            }

            command = commands.recv() => {
                match command {
                    Some(command) => handle_command(&mut registry, &updates, command).await,
                    // Every handle is gone.
                    None => break,
                }
            }
        }
    }

    let closed = registry.remove_all();
    for file in &closed {
        send_closed(&updates, file.id());
    }
    info!("Log watcher stopped, closed {} files", closed.len());
}

async fn handle_command(
    registry: &mut WatchRegistry<ChannelSink>,
    updates: &mpsc::UnboundedSender<DisplayUpdate>,
    command: Command,
) {
    match command {
        Command::Open { path, reply } => {
            let result = registry
                .add_with(&path, |id| ChannelSink::new(id, updates.clone()))
                .await;
            if let Err(e) = &result {
                error!("{}", e);
            }
            let _ = reply.send(result);
        }
        Command::Refresh { id, reply } => {
            let _ = reply.send(registry.refresh(id).await);
        }
        Command::Close { id, reply } => {
            let result = registry.remove(id).map(|file| send_closed(updates, file.id()));
            let _ = reply.send(result);
        }
        Command::CloseAll { reply } => {
            let closed = registry.remove_all();
            for file in &closed {
                send_closed(updates, file.id());
            }
            debug!("Closed all {} files", closed.len());
            let _ = reply.send(closed.len());
        }
        Command::OpenPaths { reply } => {
            let _ = reply.send(registry.open_paths());
        }
    }
}

fn send_closed(updates: &mpsc::UnboundedSender<DisplayUpdate>, id: WatchId) {
    let _ = updates.send(DisplayUpdate {
        id,
        change: DisplayChange::Closed,
    });
}
