//! Configuration file watching and reloading.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that replace the file atomically (write temp, rename) are still seen.

use crate::error::ConfigError;
use crate::manager::{ConfigManager, ReloadOutcome};
use notify::{event::EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Keeps the watcher alive; watching stops when this is dropped
pub struct WatcherGuard {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start watching the manager's backing file. Must be called inside a
/// tokio runtime.
///
/// Bursts of events within `debounce` trigger a single reload.
pub fn spawn_watcher(manager: Arc<ConfigManager>, debounce: Duration) -> Result<WatcherGuard, ConfigError> {
    let path = manager.path().to_path_buf();
    let watch_err = |source| ConfigError::Watch {
        path: path.clone(),
        source,
    };

    let file_name = path.file_name().map(OsString::from).unwrap_or_default();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            // Receiver gone means the guard was dropped
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )
    .map_err(watch_err)?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(watch_err)?;

    info!(path = %path.display(), "watching configuration file");

    let task = tokio::spawn(async move {
        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) if concerns(&event, &file_name) => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "configuration watcher error");
                    continue;
                }
            }

            tokio::time::sleep(debounce).await;
            while rx.try_recv().is_ok() {}

            let manager = manager.clone();
            match tokio::task::spawn_blocking(move || manager.reload()).await {
                Ok(Ok(ReloadOutcome::Applied { revision })) => {
                    debug!(revision, "configuration change applied")
                }
                Ok(Ok(ReloadOutcome::Unchanged)) => {}
                // Already reported by the manager
                Ok(Err(_)) => {}
                Err(e) => error!(error = %e, "configuration reload task failed"),
            }
        }
    });

    Ok(WatcherGuard {
        _watcher: watcher,
        task,
    })
}

fn concerns(event: &notify::Event, file_name: &OsString) -> bool {
    !matches!(event.kind, EventKind::Access(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
