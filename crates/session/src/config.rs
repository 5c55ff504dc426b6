// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the session subsystem.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the platform API.
    #[arg(long, default_value = "http://localhost:8080", env = "ATRIUM_API_URL")]
    pub api_url: String,

    /// State directory override. Defaults to the platform state dir.
    #[arg(long, env = "ATRIUM_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Seconds before access-token expiry at which a refresh becomes due.
    #[arg(long, default_value_t = 300, env = "ATRIUM_REFRESH_MARGIN_SECS")]
    pub refresh_margin_secs: u64,

    /// Watchdog check interval in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "ATRIUM_WATCHDOG_INTERVAL_MS")]
    pub watchdog_interval_ms: u64,

    /// Delay between session establishment and the realtime connect attempt,
    /// in milliseconds. Gives the platform time to propagate the new session.
    #[arg(long, default_value_t = 750, env = "ATRIUM_REALTIME_SETTLE_MS")]
    pub realtime_settle_ms: u64,

    /// Poll fallback interval for the cross-process store watcher, in
    /// milliseconds.
    #[arg(long, default_value_t = 2_000, env = "ATRIUM_SYNC_POLL_MS")]
    pub sync_poll_ms: u64,
}

impl SessionConfig {
    /// Config pointing at a platform API base URL, defaults elsewhere.
    /// Intended for tests and embedding.
    pub fn for_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            state_dir: None,
            refresh_margin_secs: 300,
            watchdog_interval_ms: 60_000,
            realtime_settle_ms: 750,
            sync_poll_ms: 2_000,
        }
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn realtime_settle_delay(&self) -> Duration {
        Duration::from_millis(self.realtime_settle_ms)
    }

    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_ms)
    }

    /// Token renewal endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/api/v1/auth/refresh", self.api_url.trim_end_matches('/'))
    }

    /// Realtime feed endpoint, with the HTTP scheme rewritten to WS.
    pub fn feed_ws_url(&self) -> String {
        let base = self.api_url.trim_end_matches('/');
        let ws_base = if base.starts_with("https://") {
            base.replacen("https://", "wss://", 1)
        } else {
            base.replacen("http://", "ws://", 1)
        };
        format!("{ws_base}/api/v1/feed")
    }

    /// Resolve the state directory, honoring the explicit override first.
    pub fn resolved_state_dir(&self) -> PathBuf {
        match self.state_dir {
            Some(ref dir) => dir.clone(),
            None => state_dir(),
        }
    }
}

/// Resolve the default state directory for atrium data.
///
/// Checks `ATRIUM_STATE_DIR`, then `$XDG_STATE_HOME/atrium`,
/// then `$HOME/.local/state/atrium`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ATRIUM_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("atrium");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/atrium");
    }
    PathBuf::from(".atrium")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
