// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime connection binder.
//!
//! Keeps the platform's push feed connected exactly while a session exists:
//! open on login, closed on logout, reconnected on refresh (the transport
//! has no in-place credential swap). Inbound text frames are fanned out on a
//! broadcast channel for whoever cares.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::events::{SessionEvent, SessionEvents};
use crate::store::CredentialStore;

/// Spawn the binder task.
///
/// `feed_url` is the `ws(s)://` feed endpoint; the access token is appended
/// as a query parameter per dial, read fresh from the store so a reconnect
/// never reuses a stale credential. The first connect after a session
/// appears is deferred by `settle_delay` to avoid racing server-side session
/// propagation.
pub fn spawn_realtime_binder(
    store: Arc<CredentialStore>,
    events: SessionEvents,
    feed_url: String,
    settle_delay: Duration,
    feed_tx: broadcast::Sender<String>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = events.subscribe();
        // The cancel handle and the token the live connection was opened for.
        let mut conn: Option<(CancellationToken, String)> = None;

        // A session that predates this process still gets a connection.
        if let Some(session) = store.get() {
            conn = Some((
                open_connection(&store, &feed_url, settle_delay, &feed_tx, &shutdown),
                session.access_token,
            ));
        }

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(e) => e,
                    // Missed events: fall back to store truth.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "realtime binder lagged");
                        if store.get().is_some() {
                            SessionEvent::Refreshed
                        } else {
                            SessionEvent::Logout
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            match event {
                SessionEvent::Login => {
                    if conn.is_none() {
                        if let Some(session) = store.get() {
                            conn = Some((
                                open_connection(
                                    &store,
                                    &feed_url,
                                    settle_delay,
                                    &feed_tx,
                                    &shutdown,
                                ),
                                session.access_token,
                            ));
                        }
                    }
                }
                SessionEvent::Refreshed => {
                    let Some(session) = store.get() else {
                        // Refresh notification but no session on re-read:
                        // treat as logged out.
                        if let Some((cancel, _)) = conn.take() {
                            cancel.cancel();
                        }
                        continue;
                    };
                    // The same change can be announced twice (author + store
                    // watcher); only an actually-new token forces a redial.
                    if conn.as_ref().is_some_and(|(_, tok)| *tok == session.access_token) {
                        continue;
                    }
                    if let Some((cancel, _)) = conn.take() {
                        cancel.cancel();
                    }
                    conn = Some((
                        open_connection(&store, &feed_url, settle_delay, &feed_tx, &shutdown),
                        session.access_token,
                    ));
                }
                SessionEvent::Logout => {
                    if let Some((cancel, _)) = conn.take() {
                        tracing::debug!("session gone, closing realtime feed");
                        cancel.cancel();
                    }
                }
            }
        }

        if let Some((cancel, _)) = conn.take() {
            cancel.cancel();
        }
    })
}

/// Start a connection task and return its cancel handle.
///
/// The task dials after `settle_delay`, reads frames into `feed_tx`, and
/// redials with exponential backoff until cancelled or the session is gone.
fn open_connection(
    store: &Arc<CredentialStore>,
    feed_url: &str,
    settle_delay: Duration,
    feed_tx: &broadcast::Sender<String>,
    shutdown: &CancellationToken,
) -> CancellationToken {
    let cancel = shutdown.child_token();
    let task_cancel = cancel.clone();
    let store = Arc::clone(store);
    let feed_url = feed_url.to_owned();
    let feed_tx = feed_tx.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = task_cancel.cancelled() => return,
            _ = tokio::time::sleep(settle_delay) => {}
        }

        let mut backoff_ms = 100u64;
        let max_backoff_ms = 5000u64;

        loop {
            if task_cancel.is_cancelled() {
                break;
            }
            let Some(session) = store.get() else {
                break;
            };
            let url = format!("{feed_url}?token={}", session.access_token);

            match tokio_tungstenite::connect_async(&url).await {
                Ok((ws_stream, _)) => {
                    backoff_ms = 100; // reset on successful connect
                    tracing::debug!("realtime feed connected");

                    let (_write, mut read) = ws_stream.split();

                    loop {
                        tokio::select! {
                            _ = task_cancel.cancelled() => return,
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        // Ignore send errors (no subscribers).
                                        let _ = feed_tx.send(text.to_string());
                                    }
                                    Some(Ok(Message::Close(_))) | None => {
                                        tracing::debug!("realtime feed closed");
                                        break;
                                    }
                                    Some(Err(e)) => {
                                        tracing::debug!(err = %e, "realtime feed error");
                                        break;
                                    }
                                    _ => {} // ping/pong/binary ignored
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(err = %e, backoff_ms, "realtime connect failed, retrying");
                }
            }

            // Exponential backoff before reconnect.
            tokio::select! {
                _ = task_cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
            }
            backoff_ms = (backoff_ms * 2).min(max_backoff_ms);
        }
    });

    cancel
}

#[cfg(test)]
#[path = "realtime_tests.rs"]
mod tests;
