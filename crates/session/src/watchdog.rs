// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session watchdog.
//!
//! A recurring foreground check that renews the session before expiry and
//! owns teardown when it cannot be renewed. Teardown cancels the runtime
//! token — the process-level equivalent of a hard reload to the login
//! screen, guaranteeing no stale in-memory state or open connection
//! survives a dead session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::events::{SessionEvent, SessionEvents};
use crate::refresh::{RefreshCoordinator, RefreshError};
use crate::store::{epoch_secs, CredentialStore};
use crate::token;

/// Spawn the watchdog task.
///
/// Ticks every `interval` while the `active` gate is open (a closed gate is
/// the pre-authentication context, login screens, where polling is
/// pointless).
/// Reopening the gate triggers an immediate check, so a wake-up never waits
/// a full interval with a stale token. Runs until the session dies (cancels
/// `shutdown` itself) or `shutdown` is cancelled externally.
pub fn spawn_watchdog(
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    events: SessionEvents,
    interval: Duration,
    mut active: watch::Receiver<bool>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {}
                changed = active.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            if !*active.borrow() {
                continue;
            }
            if !check_session(&store, &coordinator, &events).await {
                shutdown.cancel();
                return;
            }
        }
    })
}

/// One watchdog check. Returns false when the session is gone for good.
async fn check_session(
    store: &CredentialStore,
    coordinator: &RefreshCoordinator,
    events: &SessionEvents,
) -> bool {
    let Some(session) = store.get() else {
        tracing::info!("no session, login required");
        return false;
    };

    // A refresh token past its own expiry cannot be exchanged; skip the
    // guaranteed-failing round trip and log out locally. Opaque refresh
    // tokens (not decodable) fall through to the coordinator.
    if let Ok(claims) = token::decode(&session.refresh_token) {
        if claims.exp <= epoch_secs() {
            tracing::info!("refresh token expired, forcing logout");
            store.clear();
            events.emit(SessionEvent::Logout);
            return false;
        }
    }

    match coordinator.request_refresh(false).await {
        Ok(_) => true,
        // Another writer (login elsewhere, logout race) won; the next tick
        // re-reads whatever state it left.
        Err(RefreshError::Superseded) => true,
        Err(RefreshError::NoSession) => false,
        Err(e) => {
            // The coordinator already cleared the store and broadcast Logout.
            tracing::warn!(err = %e, "watchdog refresh failed, ending session");
            false
        }
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
