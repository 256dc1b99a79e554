use clap::Parser;
use log_watcher::{DisplayChange, LogWatcher, Session, WatchConfig, WatchId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "log-watcher")]
#[command(version, about = "Follow log files as they grow, rotate, or get renamed")]
struct Cli {
    /// Files to open, after any restored from the session
    paths: Vec<PathBuf>,

    /// Session file holding the open tab list between runs
    #[arg(long, env = "LOG_WATCHER_SESSION")]
    session: Option<PathBuf>,

    /// Size poll interval in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "log_watcher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut session = cli
        .session
        .as_ref()
        .map(Session::load)
        .unwrap_or_default();
    for path in &cli.paths {
        session.push(path.clone());
    }

    if session.tabs.is_empty() {
        eprintln!("Usage: log-watcher <file_path>... [--session <file>]");
        process::exit(1);
    }

    let config =
        WatchConfig::default().with_poll_interval(Duration::from_millis(cli.poll_interval_ms));
    let mut watcher = LogWatcher::new(config);

    let mut opened = 0;
    for (path, result) in watcher.restore(session.tabs.clone()).await {
        match result {
            Ok(_) => opened += 1,
            Err(e) => error!("Skipping {}: {}", path.display(), e),
        }
    }
    if opened == 0 {
        eprintln!("None of the files could be opened");
        process::exit(1);
    }

    let mut printer = Printer::default();
    loop {
        tokio::select! {
            update = watcher.next() => {
                match update {
                    Some(update) => printer.print(update.id, update.change),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    if let Some(session_path) = &cli.session {
        match watcher.open_paths().await {
            Ok(paths) => {
                if let Err(e) = Session::new(paths).save(session_path) {
                    warn!("{}", e);
                }
            }
            Err(e) => warn!("Could not collect open tabs: {}", e),
        }
    }
    watcher.shutdown().await;
}

/// Writes updates to stdout, with a `tail`-style header whenever output
/// switches to another tab.
#[derive(Default)]
struct Printer {
    labels: HashMap<WatchId, String>,
    last: Option<WatchId>,
}

impl Printer {
    fn print(&mut self, id: WatchId, change: DisplayChange) {
        match change {
            DisplayChange::Label(label) => {
                self.labels.insert(id, label);
                self.last = None;
            }
            DisplayChange::SetText(text) => {
                self.header(id, true);
                print!("{}", text);
            }
            DisplayChange::AppendText(delta) => {
                self.header(id, false);
                print!("{}", delta);
            }
            DisplayChange::ScrollToEnd => {}
            DisplayChange::Closed => {
                self.labels.remove(&id);
            }
        }
    }

    fn header(&mut self, id: WatchId, reload: bool) {
        if !reload && self.last == Some(id) {
            return;
        }
        let label = self.labels.get(&id).map(String::as_str).unwrap_or("?");
        if reload {
            println!("\n==> {} ({}) <==", label, id);
        } else {
            println!("\n==> {} <==", label);
        }
        self.last = Some(id);
    }
}
