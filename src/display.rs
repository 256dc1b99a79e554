//! Display collaborators that render a watched file's text.

use crate::registry::WatchId;
use tokio::sync::mpsc;

/// Where a watched file renders its content.
///
/// `append_text` is only called for incremental reads that did not reset.
pub trait DisplaySink {
    fn set_label(&mut self, label: &str);
    fn set_text(&mut self, text: &str);
    fn append_text(&mut self, delta: &str);
    fn scroll_to_end(&mut self);
}

/// A display change for one tab, as delivered by [`crate::LogWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayUpdate {
    pub id: WatchId,
    pub change: DisplayChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayChange {
    Label(String),
    SetText(String),
    AppendText(String),
    ScrollToEnd,
    /// The tab was closed and its id is retired.
    Closed,
}

/// Sink that forwards every change to the coordination task's output channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    id: WatchId,
    tx: mpsc::UnboundedSender<DisplayUpdate>,
}

impl ChannelSink {
    pub fn new(id: WatchId, tx: mpsc::UnboundedSender<DisplayUpdate>) -> Self {
        Self { id, tx }
    }

    fn send(&self, change: DisplayChange) {
        // Nobody listening is fine; the watcher keeps running until shutdown.
        let _ = self.tx.send(DisplayUpdate { id: self.id, change });
    }
}

impl DisplaySink for ChannelSink {
    fn set_label(&mut self, label: &str) {
        self.send(DisplayChange::Label(label.to_string()));
    }

    fn set_text(&mut self, text: &str) {
        self.send(DisplayChange::SetText(text.to_string()));
    }

    fn append_text(&mut self, delta: &str) {
        self.send(DisplayChange::AppendText(delta.to_string()));
    }

    fn scroll_to_end(&mut self) {
        self.send(DisplayChange::ScrollToEnd);
    }
}

/// In-memory text area. Also applies [`DisplayUpdate`]s, so a front end can
/// keep one per tab.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    label: String,
    text: String,
    scrolls: usize,
    appends: usize,
    sets: usize,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// How many times the view was scrolled to the end.
    pub fn scrolls(&self) -> usize {
        self.scrolls
    }

    /// How many incremental appends were applied.
    pub fn appends(&self) -> usize {
        self.appends
    }

    /// How many times the whole text was replaced.
    pub fn sets(&self) -> usize {
        self.sets
    }

    pub fn apply(&mut self, change: &DisplayChange) {
        match change {
            DisplayChange::Label(label) => self.set_label(label),
            DisplayChange::SetText(text) => self.set_text(text),
            DisplayChange::AppendText(delta) => self.append_text(delta),
            DisplayChange::ScrollToEnd => self.scroll_to_end(),
            DisplayChange::Closed => {}
        }
    }
}

impl DisplaySink for TextBuffer {
    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.sets += 1;
    }

    fn append_text(&mut self, delta: &str) {
        self.text.push_str(delta);
        self.appends += 1;
    }

    fn scroll_to_end(&mut self) {
        self.scrolls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_buffer_set_and_append() {
        let mut buffer = TextBuffer::new();
        buffer.set_text("line1\n");
        buffer.append_text("line2\n");

        assert_eq!(buffer.text(), "line1\nline2\n");
        assert_eq!(buffer.appends(), 1);

        buffer.set_text("fresh\n");
        assert_eq!(buffer.text(), "fresh\n");
        assert_eq!(buffer.sets(), 2);
    }

    #[test]
    fn test_text_buffer_apply_updates() {
        let mut buffer = TextBuffer::new();
        let changes = [
            DisplayChange::Label("app.log".to_string()),
            DisplayChange::SetText("a".to_string()),
            DisplayChange::AppendText("b".to_string()),
            DisplayChange::ScrollToEnd,
            DisplayChange::Closed,
        ];

        for change in &changes {
            buffer.apply(change);
        }

        assert_eq!(buffer.label(), "app.log");
        assert_eq!(buffer.text(), "ab");
        assert_eq!(buffer.scrolls(), 1);
    }

    #[test]
    fn test_channel_sink_forwards_changes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = WatchId::from_raw(3);
        let mut sink = ChannelSink::new(id, tx);

        sink.set_label("x.log");
        sink.set_text("full");
        sink.append_text("more");
        sink.scroll_to_end();

        let received: Vec<DisplayChange> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|update| {
                assert_eq!(update.id, id);
                update.change
            })
            .collect();

        assert_eq!(
            received,
            vec![
                DisplayChange::Label("x.log".to_string()),
                DisplayChange::SetText("full".to_string()),
                DisplayChange::AppendText("more".to_string()),
                DisplayChange::ScrollToEnd,
            ]
        );
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let mut sink = ChannelSink::new(WatchId::from_raw(1), tx);
        sink.set_text("nobody listening");
    }
}
