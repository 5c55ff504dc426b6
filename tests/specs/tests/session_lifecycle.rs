// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end session lifecycle scenarios against the fake platform.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use atrium_session::config::SessionConfig;
use atrium_session::events::SessionEvents;
use atrium_session::gateway::{ApiRequest, Gateway};
use atrium_session::refresh::RefreshCoordinator;
use atrium_session::store::CredentialStore;
use atrium_session::test_support::mint_token_expiring_in;
use atrium_session::SessionRuntime;
use atrium_specs::FakePlatform;

fn config_for(platform: &FakePlatform, dir: &tempfile::TempDir) -> SessionConfig {
    let mut config = SessionConfig::for_api_url(platform.api_url());
    config.state_dir = Some(dir.path().to_path_buf());
    config.watchdog_interval_ms = 100;
    config.realtime_settle_ms = 10;
    config.sync_poll_ms = 50;
    config
}

async fn wait_until(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn proactive_renewal_keeps_the_feed_fresh() -> anyhow::Result<()> {
    let platform = FakePlatform::start().await?;
    let dir = tempfile::tempdir()?;
    let config = config_for(&platform, &dir);

    // A prior `atrium login` stored a session expiring inside the margin.
    let (access, refresh) = platform.issue("user-e2e", 60);
    CredentialStore::new(dir.path().to_path_buf()).set(&access, &refresh);

    let runtime = SessionRuntime::start(&config);

    wait_until("a renewal", || platform.refresh_calls.load(Ordering::Relaxed) >= 1).await;
    wait_until("the store to carry the renewed token", || {
        runtime.store.get().is_some_and(|s| s.access_token == platform.current_valid())
    })
    .await;
    wait_until("the feed to ride the renewed token", || {
        platform.feed_tokens().last() == Some(&platform.current_valid())
    })
    .await;
    assert!(!runtime.shutdown_token().is_cancelled());

    runtime.shutdown();
    Ok(())
}

#[tokio::test]
async fn gateway_renews_and_replays_transparently() -> anyhow::Result<()> {
    let platform = FakePlatform::start().await?;
    let dir = tempfile::tempdir()?;

    // Structurally valid token the platform no longer accepts.
    let store = Arc::new(CredentialStore::new(dir.path().to_path_buf()));
    store.set(&mint_token_expiring_in("user-e2e", 3600), "refresh-user-e2e");

    let coordinator = RefreshCoordinator::new(
        Arc::clone(&store),
        SessionEvents::new(),
        format!("{}/api/v1/auth/refresh", platform.api_url()),
        300,
    );
    let gateway = Gateway::new(Arc::clone(&store), coordinator, platform.api_url());

    let resp = gateway
        .send(&ApiRequest::get("/api/v1/courses"))
        .await
        .map_err(|e| anyhow::anyhow!("gateway: {e}"))?;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["courses"][0], "algebra");
    assert_eq!(platform.refresh_calls.load(Ordering::Relaxed), 1);
    assert_eq!(platform.api_calls.load(Ordering::Relaxed), 2);
    Ok(())
}

#[tokio::test]
async fn logout_elsewhere_converges_everywhere() -> anyhow::Result<()> {
    let platform = FakePlatform::start().await?;
    let dir = tempfile::tempdir()?;
    let config = config_for(&platform, &dir);

    let (access, refresh) = platform.issue("user-e2e", 3600);
    CredentialStore::new(dir.path().to_path_buf()).set(&access, &refresh);

    let runtime = SessionRuntime::start(&config);
    wait_until("the feed to connect", || {
        platform.feed_connections.load(Ordering::Relaxed) == 1
    })
    .await;

    // Another process logs out by clearing the shared store.
    CredentialStore::new(dir.path().to_path_buf()).clear();

    wait_until("the feed to close", || platform.feed_connections.load(Ordering::Relaxed) == 0)
        .await;
    tokio::time::timeout(Duration::from_secs(10), runtime.shutdown_token().cancelled())
        .await
        .map_err(|_| anyhow::anyhow!("runtime never ended after remote logout"))?;
    assert!(runtime.store.get().is_none());
    Ok(())
}

#[tokio::test]
async fn refresh_rejection_tears_everything_down() -> anyhow::Result<()> {
    let platform = FakePlatform::start().await?;
    platform.reject_refreshes();
    let dir = tempfile::tempdir()?;
    let config = config_for(&platform, &dir);

    // Session due for renewal that the platform will refuse.
    let (access, refresh) = platform.issue("user-e2e", 60);
    CredentialStore::new(dir.path().to_path_buf()).set(&access, &refresh);

    let runtime = SessionRuntime::start(&config);

    tokio::time::timeout(Duration::from_secs(10), runtime.shutdown_token().cancelled())
        .await
        .map_err(|_| anyhow::anyhow!("runtime survived a rejected refresh"))?;
    assert!(runtime.store.get().is_none());
    wait_until("the feed to close", || platform.feed_connections.load(Ordering::Relaxed) == 0)
        .await;
    Ok(())
}
