// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session change notifications.
//!
//! Events carry only a kind, never token material. A receiver that wants the
//! actual session state must re-read the [`CredentialStore`] — an event may
//! have been authored by another process whose in-memory state this process
//! never saw, so the store is the only authoritative source.
//!
//! [`CredentialStore`]: crate::store::CredentialStore

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A change to the authentication state, kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was created where none existed.
    Login,
    /// The session was destroyed (logout, refresh failure, expiry).
    Logout,
    /// The access token was renewed for an existing session.
    Refreshed,
}

/// Broadcast hub for [`SessionEvent`]s.
///
/// Cheap to clone; all clones share one channel. Subscribers that fall behind
/// see `Lagged` and recover by re-reading the store, so a small buffer is
/// fine.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    /// Subscribe to session change events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event. Send errors (no subscribers) are ignored.
    pub fn emit(&self, event: SessionEvent) {
        tracing::debug!(?event, "session event");
        let _ = self.tx.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
