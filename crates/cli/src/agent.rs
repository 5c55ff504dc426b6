// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `atrium run` — the long-running session agent.
//!
//! Starts the full session runtime (watchdog, store watcher, realtime
//! binder) and prints feed frames until interrupted or until the session
//! dies. A dead session ends the process; nothing session-scoped survives.

use tracing::info;

use atrium_session::config::SessionConfig;
use atrium_session::SessionRuntime;

pub async fn run(config: &SessionConfig) -> anyhow::Result<i32> {
    let runtime = SessionRuntime::start(config);
    if runtime.store.get().is_none() {
        println!("no session \u{2014} run `atrium login` first");
        runtime.shutdown();
        return Ok(2);
    }

    let mut feed = runtime.feed.subscribe();
    let mut events = runtime.events.subscribe();
    let shutdown = runtime.shutdown_token();
    info!("session agent running");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                runtime.shutdown();
                return Ok(0);
            }
            _ = shutdown.cancelled() => {
                println!("session ended \u{2014} run `atrium login` to start a new one");
                return Ok(2);
            }
            frame = feed.recv() => {
                if let Ok(frame) = frame {
                    println!("{frame}");
                }
            }
            event = events.recv() => {
                match event {
                    Ok(e) => info!(event = ?e, "session event"),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        runtime.shutdown();
                        return Ok(0);
                    }
                }
            }
        }
    }
}
