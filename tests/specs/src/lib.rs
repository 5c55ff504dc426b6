// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end test harness: an in-process fake of the atrium platform with
//! a protected resource, a token endpoint, and a realtime feed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{any, get, post};
use axum::Router;
use tokio::net::TcpListener;

use atrium_session::test_support::mint_token_expiring_in;

/// Fake platform server. One token is "valid" at a time; the token endpoint
/// mints and blesses a fresh one per refresh (unless refusing).
#[derive(Clone)]
pub struct FakePlatform {
    pub addr: SocketAddr,
    pub api_calls: Arc<AtomicU32>,
    pub refresh_calls: Arc<AtomicU32>,
    pub feed_connections: Arc<AtomicI32>,
    pub feed_tokens: Arc<Mutex<Vec<String>>>,
    valid_token: Arc<Mutex<String>>,
    refresh_ok: Arc<Mutex<bool>>,
}

impl FakePlatform {
    pub async fn start() -> anyhow::Result<Self> {
        atrium_session::test_support::ensure_crypto();
        let platform = Self {
            addr: "127.0.0.1:0".parse()?,
            api_calls: Arc::new(AtomicU32::new(0)),
            refresh_calls: Arc::new(AtomicU32::new(0)),
            feed_connections: Arc::new(AtomicI32::new(0)),
            feed_tokens: Arc::new(Mutex::new(Vec::new())),
            valid_token: Arc::new(Mutex::new(String::new())),
            refresh_ok: Arc::new(Mutex::new(true)),
        };

        let app = Router::new()
            .route("/api/v1/courses", get(courses))
            .route("/api/v1/auth/refresh", post(refresh))
            .route("/api/v1/feed", any(feed))
            .with_state(platform.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, ..platform })
    }

    pub fn api_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Issue a token pair the platform will accept, as the login flow would.
    pub fn issue(&self, sub: &str, ttl_secs: i64) -> (String, String) {
        let access = mint_token_expiring_in(sub, ttl_secs);
        self.mark_valid(&access);
        (access, format!("refresh-{sub}"))
    }

    /// Bless a token without issuing it.
    pub fn mark_valid(&self, token: &str) {
        if let Ok(mut valid) = self.valid_token.lock() {
            *valid = token.to_owned();
        }
    }

    pub fn current_valid(&self) -> String {
        self.valid_token.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Make the token endpoint reject every refresh from now on.
    pub fn reject_refreshes(&self) {
        if let Ok(mut ok) = self.refresh_ok.lock() {
            *ok = false;
        }
    }

    pub fn feed_tokens(&self) -> Vec<String> {
        self.feed_tokens.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

async fn courses(
    State(platform): State<FakePlatform>,
    headers: HeaderMap,
) -> impl axum::response::IntoResponse {
    platform.api_calls.fetch_add(1, Ordering::Relaxed);
    if bearer(&headers).as_deref() == Some(platform.current_valid().as_str()) {
        (axum::http::StatusCode::OK, r#"{"courses":["algebra","rhetoric"]}"#.to_owned())
    } else {
        (axum::http::StatusCode::UNAUTHORIZED, r#"{"error":"unauthorized"}"#.to_owned())
    }
}

async fn refresh(State(platform): State<FakePlatform>) -> impl axum::response::IntoResponse {
    platform.refresh_calls.fetch_add(1, Ordering::Relaxed);
    if !platform.refresh_ok.lock().map(|ok| *ok).unwrap_or(false) {
        return (
            axum::http::StatusCode::UNAUTHORIZED,
            r#"{"error":"invalid_grant"}"#.to_owned(),
        );
    }
    let fresh = mint_token_expiring_in("user-e2e", 3600);
    platform.mark_valid(&fresh);
    (
        axum::http::StatusCode::OK,
        serde_json::json!({ "access_token": fresh }).to_string(),
    )
}

async fn feed(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(platform): State<FakePlatform>,
) -> axum::response::Response {
    let token = params.get("token").cloned().unwrap_or_default();
    ws.on_upgrade(move |socket| handle_feed(socket, token, platform))
}

async fn handle_feed(mut socket: WebSocket, token: String, platform: FakePlatform) {
    if let Ok(mut tokens) = platform.feed_tokens.lock() {
        tokens.push(token);
    }
    platform.feed_connections.fetch_add(1, Ordering::Relaxed);
    let _ = socket.send(WsMessage::Text("assignment-posted".into())).await;
    while let Some(Ok(_)) = socket.recv().await {}
    platform.feed_connections.fetch_sub(1, Ordering::Relaxed);
}
