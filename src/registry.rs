//! The set of open tabs, keyed by stable ids.

use crate::config::WatchConfig;
use crate::display::DisplaySink;
use crate::error::{Error, Result};
use crate::source::ChangeEvent;
use crate::watched::WatchedFile;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Stable handle for one open tab. Ids are never reused, so their order is
/// the order tabs were opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(u64);

impl WatchId {
    pub fn from_raw(raw: u64) -> Self {
        WatchId(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Open tabs in tab order.
///
/// Every method takes `&mut self` for mutation, so membership cannot change
/// while a tick is iterating.
pub struct WatchRegistry<S> {
    entries: BTreeMap<WatchId, WatchedFile<S>>,
    next_id: u64,
    events: mpsc::UnboundedSender<ChangeEvent>,
    config: WatchConfig,
}

impl<S: DisplaySink> WatchRegistry<S> {
    /// Change sources of every added file report on `events`.
    pub fn new(config: WatchConfig, events: mpsc::UnboundedSender<ChangeEvent>) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
            events,
            config,
        }
    }

    /// Opens `path` into a new tab rendered on `sink`.
    pub async fn add<P: AsRef<Path>>(&mut self, path: P, sink: S) -> Result<WatchId> {
        self.add_with(path, |_| sink).await
    }

    /// Like [`add`](Self::add), for sinks that need to know their id.
    pub async fn add_with<P, F>(&mut self, path: P, make_sink: F) -> Result<WatchId>
    where
        P: AsRef<Path>,
        F: FnOnce(WatchId) -> S,
    {
        let id = WatchId(self.next_id);
        self.next_id += 1;

        let file = WatchedFile::open(id, path, make_sink(id), &self.events, &self.config).await?;
        self.entries.insert(id, file);
        Ok(id)
    }

    /// Closes and removes one tab.
    pub fn remove(&mut self, id: WatchId) -> Result<WatchedFile<S>> {
        let mut file = self.entries.remove(&id).ok_or(Error::UnknownWatch(id))?;
        file.close();
        Ok(file)
    }

    /// Closes every tab, returning them in tab order.
    pub fn remove_all(&mut self) -> Vec<WatchedFile<S>> {
        let entries = std::mem::take(&mut self.entries);
        entries
            .into_values()
            .map(|mut file| {
                file.close();
                file
            })
            .collect()
    }

    pub fn get(&self, id: WatchId) -> Option<&WatchedFile<S>> {
        self.entries.get(&id)
    }

    pub fn ids(&self) -> Vec<WatchId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current paths in tab order, each listed once.
    pub fn open_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::with_capacity(self.entries.len());
        for file in self.entries.values() {
            if !paths.iter().any(|p| p == file.path()) {
                paths.push(file.path().to_path_buf());
            }
        }
        paths
    }

    /// Polls every live file once. Returns how many were read.
    pub async fn tick(&mut self) -> usize {
        let mut reads = 0;
        for file in self.entries.values_mut() {
            if file.poll().await {
                reads += 1;
            }
        }
        if reads > 0 {
            trace!("Tick read {} of {} files", reads, self.entries.len());
        }
        reads
    }

    /// Hands a notification to the tab it was raised for.
    pub async fn dispatch(&mut self, event: ChangeEvent) {
        match self.entries.get_mut(&event.id) {
            Some(file) => file.handle_change(event.kind).await,
            // Raised before the tab was closed.
            None => debug!("Dropping event for closed {}: {:?}", event.id, event.kind),
        }
    }

    pub async fn refresh(&mut self, id: WatchId) -> Result<()> {
        self.entries
            .get_mut(&id)
            .ok_or(Error::UnknownWatch(id))?
            .refresh()
            .await
    }
}
