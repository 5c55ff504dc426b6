// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated request gateway.
//!
//! The one place data-fetching code talks to the platform API. Attaches the
//! current access token, and on the first 401 of a logical call runs a forced
//! refresh and replays the request exactly once. Everything else (caching,
//! deduplication, navigation after a dead session) is somebody else's job.

use std::sync::Arc;

use crate::error::{GatewayError, HttpError};
use crate::refresh::RefreshCoordinator;
use crate::store::CredentialStore;

/// An outbound platform API request. `path` is absolute (`/api/v1/...`).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: reqwest::Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: reqwest::Method::GET, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self { method: reqwest::Method::POST, path: path.into(), body: Some(body) }
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self { method: reqwest::Method::PUT, path: path.into(), body: Some(body) }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self { method: reqwest::Method::DELETE, path: path.into(), body: None }
    }
}

/// A 2xx platform response. Non-JSON bodies read as `Value::Null`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Wraps outbound calls with token attachment and the single 401-refresh
/// replay.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    http: reqwest::Client,
    base_url: String,
}

impl Gateway {
    pub fn new(
        store: Arc<CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
        base_url: String,
    ) -> Self {
        Self {
            store,
            coordinator,
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url,
        }
    }

    /// Send a request, transparently renewing the session on a first 401.
    ///
    /// Reads the access token fresh from the store (never cached). A request
    /// without a session goes out anonymous. On 401: one forced refresh, one
    /// replay, and the replay's verdict is final — a second 401 surfaces as
    /// [`HttpError`] with no further retry. Teardown after a failed refresh
    /// belongs to the watchdog; the gateway only reports.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, GatewayError> {
        let token = self.store.get().map(|s| s.access_token);
        let resp = self.execute(request, token.as_deref()).await?;

        if resp.status().as_u16() != 401 {
            return finish(resp).await;
        }
        let payload = resp.text().await.unwrap_or_default();
        tracing::debug!(path = %request.path, "401 from platform, forcing refresh");

        if self.coordinator.request_refresh(true).await.is_err() {
            return Err(HttpError { status: 401, payload }.into());
        }

        let token = self.store.get().map(|s| s.access_token);
        let resp = self.execute(request, token.as_deref()).await?;
        finish(resp).await
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), request.path);
        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(token) = token {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(|e| GatewayError::Transport(e.to_string()))
    }
}

async fn finish(resp: reqwest::Response) -> Result<ApiResponse, GatewayError> {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    if !(200..300).contains(&status) {
        return Err(HttpError { status, payload: text }.into());
    }
    let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
    Ok(ApiResponse { status, body })
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
