// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `atrium logout` — destroy the session on this machine.
//!
//! Clearing the store is all it takes: running agents observe the change
//! through the store watcher, broadcast `Logout`, and close their realtime
//! connections.

use atrium_session::config::SessionConfig;
use atrium_session::store::CredentialStore;

pub fn run(config: &SessionConfig) -> anyhow::Result<i32> {
    let store = CredentialStore::new(config.resolved_state_dir());
    if store.get().is_none() {
        println!("no session");
        return Ok(0);
    }
    store.clear();
    println!("logged out");
    Ok(0)
}
