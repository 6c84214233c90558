//! Directory watch event source.
//!
//! Bridges the callback-based filesystem watcher into an async channel the
//! pipeline loop can consume. Only file-creation events survive the bridge;
//! dotfiles are filtered out at the source.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Event emitted by the directory watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// A new file appeared under the watch directory.
    Added(PathBuf),
    /// The watcher itself reported an error; the watch keeps running.
    Error(notify::Error),
}

pub struct DirWatcher {
    // Dropping the watcher stops the underlying OS watch, so it is kept
    // alive alongside the receiving half.
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl DirWatcher {
    /// Start watching `dir` (non-recursive) for new files.
    pub fn start(dir: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_)) {
                        return;
                    }
                    for path in event.paths {
                        if is_hidden(&path) {
                            continue;
                        }
                        // The receiver only disappears on shutdown.
                        let _ = tx.send(WatchEvent::Added(path));
                    }
                }
                Err(err) => {
                    let _ = tx.send(WatchEvent::Error(err));
                }
            }
        })
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Next watch event; `None` once the watcher has shut down.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
