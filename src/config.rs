//! Runtime settings for the watcher.

use std::time::Duration;

/// Interval between size polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest poll interval accepted; smaller values are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Text shown in place of a file's content after it was deleted.
pub const DELETED_TEXT: &str = "<< DELETED >>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// How often every live file's size is compared with the last read.
    pub poll_interval: Duration,
    /// Scroll the display to the end after every content change.
    pub auto_scroll: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            auto_scroll: true,
        }
    }
}

impl WatchConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_auto_scroll(mut self, auto_scroll: bool) -> Self {
        self.auto_scroll = auto_scroll;
        self
    }
}
