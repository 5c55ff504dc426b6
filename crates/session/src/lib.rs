// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atrium session subsystem: credential storage, single-flight token
//! renewal, authenticated requests, cross-process sync, and lifecycle
//! binding of the realtime feed.

pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod realtime;
pub mod refresh;
pub mod store;
pub mod sync;
pub mod test_support;
pub mod token;
pub mod watchdog;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::events::{SessionEvent, SessionEvents};
use crate::gateway::Gateway;
use crate::refresh::RefreshCoordinator;
use crate::store::CredentialStore;

/// The assembled session subsystem: one store, one event hub, one refresh
/// coordinator, one gateway, plus the background tasks that keep them
/// honest.
///
/// The shutdown token is shared with every spawned task. The watchdog
/// cancels it when the session dies for good, which closes the realtime
/// feed and stops the watchers — nothing session-scoped outlives the
/// session.
pub struct SessionRuntime {
    pub store: Arc<CredentialStore>,
    pub events: SessionEvents,
    pub coordinator: Arc<RefreshCoordinator>,
    pub gateway: Gateway,
    /// Inbound realtime feed frames.
    pub feed: broadcast::Sender<String>,
    activity_tx: watch::Sender<bool>,
    shutdown: CancellationToken,
}

impl SessionRuntime {
    /// Build the subsystem and spawn the watchdog, the store watcher, and
    /// the realtime binder. The watchdog gate starts open.
    pub fn start(config: &SessionConfig) -> Self {
        let store = Arc::new(CredentialStore::new(config.resolved_state_dir()));
        let events = SessionEvents::new();
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&store),
            events.clone(),
            config.token_url(),
            config.refresh_margin_secs,
        );
        let gateway =
            Gateway::new(Arc::clone(&store), Arc::clone(&coordinator), config.api_url.clone());
        let (feed, _) = broadcast::channel(256);
        let (activity_tx, activity_rx) = watch::channel(true);
        let shutdown = CancellationToken::new();

        watchdog::spawn_watchdog(
            Arc::clone(&store),
            Arc::clone(&coordinator),
            events.clone(),
            config.watchdog_interval(),
            activity_rx,
            shutdown.clone(),
        );
        sync::spawn_sync_watcher(
            Arc::clone(&store),
            events.clone(),
            config.sync_poll_interval(),
            shutdown.clone(),
        );
        realtime::spawn_realtime_binder(
            Arc::clone(&store),
            events.clone(),
            config.feed_ws_url(),
            config.realtime_settle_delay(),
            feed.clone(),
            shutdown.clone(),
        );

        Self { store, events, coordinator, gateway, feed, activity_tx, shutdown }
    }

    /// Establish a session from already-issued credentials. The sole entry
    /// point that creates a session from nothing.
    pub fn login(&self, access_token: &str, refresh_token: &str) {
        self.store.set(access_token, refresh_token);
        if self.store.get().is_some() {
            self.events.emit(SessionEvent::Login);
        }
    }

    /// Explicit logout: clear the store and announce it. Other processes
    /// converge via the store watcher; the realtime feed closes on the
    /// broadcast.
    pub fn logout(&self) {
        self.store.clear();
        self.events.emit(SessionEvent::Logout);
    }

    /// Open or close the watchdog gate. Closed is the pre-authentication
    /// context (login screens) where session polling is pointless.
    pub fn set_active(&self, active: bool) {
        let _ = self.activity_tx.send(active);
    }

    /// Token cancelled when the session dies for good or on [`shutdown`].
    ///
    /// [`shutdown`]: Self::shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Tear down all background tasks and the realtime connection.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
