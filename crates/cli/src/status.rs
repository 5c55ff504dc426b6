// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `atrium status` — show the current session.

use atrium_session::config::SessionConfig;
use atrium_session::store::{epoch_secs, CredentialStore};

pub fn run(config: &SessionConfig) -> anyhow::Result<i32> {
    let store = CredentialStore::new(config.resolved_state_dir());
    let Some(session) = store.get() else {
        println!("no session \u{2014} run `atrium login`");
        return Ok(1);
    };

    println!("subject:  {}", session.claims.sub);
    if !session.claims.role.is_empty() {
        println!("role:     {}", session.claims.role);
    }
    let remaining = session.expires_at.saturating_sub(epoch_secs());
    println!("expires:  {}", format_expires(remaining));
    if store.is_expiring_soon(config.refresh_margin_secs) {
        println!("note:     access token is due for renewal");
    }
    Ok(0)
}

fn format_expires(secs: u64) -> String {
    if secs == 0 {
        return "expired".to_owned();
    }
    let m = secs / 60;
    let rem = secs % 60;
    format!("in {m}m {rem:02}s")
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
