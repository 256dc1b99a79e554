use log_watcher::{DELETED_TEXT, DisplayChange, LogWatcher, TextBuffer, WatchConfig, WatchId};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio_stream::StreamExt;

fn fast_watcher() -> LogWatcher {
    LogWatcher::new(WatchConfig::default().with_poll_interval(Duration::from_millis(25)))
}

fn append(path: &Path, content: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// Applies updates to per-tab buffers until `done` holds or the timeout hits.
async fn drive_until(
    watcher: &mut LogWatcher,
    tabs: &mut HashMap<WatchId, TextBuffer>,
    timeout: Duration,
    done: impl Fn(&HashMap<WatchId, TextBuffer>) -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !done(tabs) {
        match tokio::time::timeout_at(deadline, watcher.next()).await {
            Ok(Some(update)) => tabs.entry(update.id).or_default().apply(&update.change),
            _ => return false,
        }
    }
    true
}

#[tokio::test]
async fn test_appends_arrive_incrementally() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "line1\n").unwrap();

    let mut watcher = fast_watcher();
    let mut tabs = HashMap::new();
    let id = watcher.open(&path).await.unwrap();
    assert!(
        drive_until(&mut watcher, &mut tabs, Duration::from_secs(2), |t| {
            t.get(&id).is_some_and(|tab| tab.text() == "line1\n")
        })
        .await
    );

    append(&path, "line2\n");

    let mut appended = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while appended.concat() != "line2\n" {
        match tokio::time::timeout_at(deadline, watcher.next()).await {
            Ok(Some(update)) => match update.change {
                DisplayChange::AppendText(delta) => appended.push(delta),
                DisplayChange::SetText(text) => panic!("unexpected reload: {:?}", text),
                _ => {}
            },
            _ => panic!("append not delivered"),
        }
    }
    assert_eq!(appended, vec!["line2\n".to_string()]);
}

#[tokio::test]
async fn test_truncate_and_rewrite_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "first generation of content\n").unwrap();

    let mut watcher = fast_watcher();
    let mut tabs = HashMap::new();
    let id = watcher.open(&path).await.unwrap();

    fs::write(&path, "new\n").unwrap();

    assert!(
        drive_until(&mut watcher, &mut tabs, Duration::from_secs(2), |t| {
            t.get(&id).is_some_and(|tab| tab.text() == "new\n")
        })
        .await
    );
}

#[tokio::test]
async fn test_delete_then_recreate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "before\n").unwrap();

    let mut watcher = fast_watcher();
    let mut tabs = HashMap::new();
    let id = watcher.open(&path).await.unwrap();

    fs::remove_file(&path).unwrap();
    assert!(
        drive_until(&mut watcher, &mut tabs, Duration::from_secs(3), |t| {
            t.get(&id).is_some_and(|tab| tab.text() == DELETED_TEXT)
        })
        .await,
        "delete was not shown"
    );

    fs::write(&path, "hello\n").unwrap();
    assert!(
        drive_until(&mut watcher, &mut tabs, Duration::from_secs(3), |t| {
            t.get(&id).is_some_and(|tab| tab.text() == "hello\n")
        })
        .await,
        "recreated content was not loaded"
    );
}

#[tokio::test]
async fn test_rename_follows_file() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("a.log");
    let to = dir.path().join("b.log");
    fs::write(&from, "original\n").unwrap();

    let mut watcher = fast_watcher();
    let mut tabs = HashMap::new();
    let id = watcher.open(&from).await.unwrap();

    fs::rename(&from, &to).unwrap();
    append(&to, "after\n");

    assert!(
        drive_until(&mut watcher, &mut tabs, Duration::from_secs(3), |t| {
            t.get(&id)
                .is_some_and(|tab| tab.label() == "b.log" && tab.text() == "original\nafter\n")
        })
        .await,
        "rename was not followed"
    );
    assert_eq!(watcher.open_paths().await.unwrap(), vec![to]);
}

#[tokio::test]
async fn test_one_tab_failing_does_not_stop_others() {
    let dir = tempfile::tempdir().unwrap();
    let kept = dir.path().join("kept.log");
    let doomed = dir.path().join("doomed.log");
    fs::write(&kept, "k\n").unwrap();
    fs::write(&doomed, "d\n").unwrap();

    let mut watcher = fast_watcher();
    let mut tabs = HashMap::new();
    let kept_id = watcher.open(&kept).await.unwrap();
    let doomed_id = watcher.open(&doomed).await.unwrap();

    fs::remove_file(&doomed).unwrap();
    append(&kept, "still going\n");

    assert!(
        drive_until(&mut watcher, &mut tabs, Duration::from_secs(3), |t| {
            t.get(&doomed_id).is_some_and(|tab| tab.text() == DELETED_TEXT)
                && t.get(&kept_id).is_some_and(|tab| tab.text() == "k\nstill going\n")
        })
        .await
    );
}

#[tokio::test]
async fn test_open_nonexistent_file_error_case() {
    let watcher = fast_watcher();

    let result = watcher.open("definitely_nonexistent_file_12345.log").await;

    assert!(result.is_err());
    assert!(watcher.open_paths().await.unwrap().is_empty());
}
