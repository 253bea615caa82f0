//! Rebuild the index when the uploads tree changes.
//!
//! Filesystem events are debounced, a fresh [`FileIndex`] is built on a
//! blocking task and swapped into [`AppState`]. A failed rebuild keeps the
//! current snapshot.

use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::error::IndexError;
use crate::index::FileIndex;
use crate::AppState;

/// Rebuild the index from `state.root_dir` and swap it in.
///
/// Returns the number of entries in the new snapshot.
pub async fn reindex(state: &AppState) -> Result<usize, IndexError> {
    let root_dir = state.root_dir.clone();
    let index = tokio::task::spawn_blocking(move || FileIndex::build(&root_dir))
        .await
        .map_err(|err| IndexError::Io {
            path: state.root_dir.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
        })??;

    let count = index.len();
    state.replace_index(index);
    Ok(count)
}

/// Watch `state.root_dir` and reindex after each burst of changes.
///
/// The watcher lives as long as the returned task.
pub fn spawn_reindexer(
    state: AppState,
    debounce: Duration,
) -> Result<JoinHandle<()>, notify::Error> {
    let (tx, mut rx) = mpsc::channel(128);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if tx.blocking_send(res).is_err() {
            debug!("Reindex channel closed");
        }
    })?;
    watcher.watch(&state.root_dir, RecursiveMode::Recursive)?;

    info!("Watching {} for changes", state.root_dir.display());

    let handle = tokio::spawn(async move {
        let _watcher = watcher;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                incoming = rx.recv() => {
                    match incoming {
                        Some(Ok(event)) => {
                            // Opening a file to stream it must not trigger a rebuild.
                            if matches!(event.kind, EventKind::Access(_)) {
                                continue;
                            }
                            debug!("Change detected: {:?} {:?}", event.kind, event.paths);
                            deadline = Some(Instant::now() + debounce);
                        }
                        Some(Err(err)) => {
                            warn!("Watcher error: {:?}", err);
                        }
                        None => break,
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    match reindex(&state).await {
                        Ok(count) => info!("Reindexed {} files", count),
                        Err(err) => error!("Reindex failed, keeping previous index: {}", err),
                    }
                }
            }
        }
    });

    Ok(handle)
}
