// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process session sync.
//!
//! Other atrium processes on this machine share the same on-disk store. When
//! any of them writes or clears it, this watcher notices (filesystem events
//! via `notify`, with a polling fallback), re-reads the store, and broadcasts
//! the derived change kind. Only the re-read store is trusted: the process
//! that authored the change may hold in-memory state this one never saw.
//!
//! Writes made in this process reach the disk too, so a local refresh or
//! logout can be announced twice (once by its author, once here). Events are
//! kind-only and every receiver re-derives state from the store, which makes
//! duplicates harmless.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::events::{SessionEvent, SessionEvents};
use crate::store::CredentialStore;

/// Spawn the store watcher task.
///
/// Emits `Login`/`Logout`/`Refreshed` onto the event hub whenever the
/// on-disk state diverges from the last derived snapshot.
pub fn spawn_sync_watcher(
    store: Arc<CredentialStore>,
    events: SessionEvents,
    poll_interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        let _watcher = setup_notify_watcher(store.dir(), wake_tx);

        let mut last = store.get().map(|s| s.access_token);

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = wake_rx.recv() => {}
                _ = ticker.tick() => {}
            }

            let current = store.get().map(|s| s.access_token);
            let derived = match (&last, &current) {
                (None, Some(_)) => Some(SessionEvent::Login),
                (Some(_), None) => Some(SessionEvent::Logout),
                (Some(prev), Some(next)) if prev != next => Some(SessionEvent::Refreshed),
                _ => None,
            };
            last = current;

            if let Some(event) = derived {
                tracing::debug!(?event, "session store changed on disk");
                events.emit(event);
            }
        }
    })
}

/// Set up a `notify` watcher on the state directory.
/// Returns the watcher handle (must be kept alive).
fn setup_notify_watcher(
    dir: &Path,
    wake_tx: mpsc::Sender<()>,
) -> Option<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    // The directory may not exist before the first login anywhere.
    let _ = std::fs::create_dir_all(dir);

    let mut watcher = notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
        let _ = wake_tx.try_send(());
    })
    .ok()?;
    watcher.watch(dir, RecursiveMode::NonRecursive).ok()?;
    Some(watcher)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
