//! Debounced filesystem watching over the tool directories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::TOOL_FILE_EXTENSION;

const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to watch directory {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Watches one or more tool directories and emits a debounced tick
/// whenever a tool-source file changes. The tick carries no payload;
/// subscribers are expected to re-run `ToolIndex::reconcile` and diff the
/// result themselves, since multiple rapid edits should coalesce into a
/// single reconcile.
pub struct FileWatcher {
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    pub ticks: mpsc::Receiver<()>,
}

impl FileWatcher {
    pub fn new(dirs: &[&Path]) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::channel(16);

        let mut debouncer = new_debouncer(DEBOUNCE, move |res: DebounceEventResult| {
            let Ok(events) = res else { return };
            let relevant = events.iter().any(|e| {
                e.path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext == TOOL_FILE_EXTENSION)
                    .unwrap_or(false)
            });
            if relevant {
                let _ = tx.try_send(());
            }
        })
        .map_err(|source| WatcherError::Watch {
            path: PathBuf::new(),
            source,
        })?;

        for dir in dirs {
            if !dir.is_dir() {
                continue;
            }
            debouncer
                .watcher()
                .watch(dir, notify::RecursiveMode::NonRecursive)
                .map_err(|source| WatcherError::Watch {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        Ok(Self {
            _debouncer: debouncer,
            ticks: rx,
        })
    }
}
