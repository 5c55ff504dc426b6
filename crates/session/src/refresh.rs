// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight token renewal.
//!
//! Many callers can discover an expired token in the same scheduling window;
//! refresh tokens are single-use on most platforms, so letting each of them
//! dial the token endpoint would get all but one rejected and force a
//! spurious logout. The coordinator installs an in-flight marker *before*
//! the first await on the network, so every later arrival attaches to the
//! existing operation and observes its settlement instead of dialing again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex};

use crate::events::{SessionEvent, SessionEvents};
use crate::store::CredentialStore;

/// Outcome of a renewal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The session was not due for renewal; no network call was made.
    NotNeeded,
    /// A new access token was obtained and stored.
    Refreshed,
}

/// Terminal failure of a renewal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The platform rejected the refresh token.
    Rejected(String),
    /// Network failure or malformed response from the token endpoint.
    Transport(String),
    /// There is no session to renew.
    NoSession,
    /// The session was cleared or replaced while the renewal was in flight;
    /// the late result was discarded instead of applied.
    Superseded,
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "refresh rejected: {msg}"),
            Self::Transport(msg) => write!(f, "refresh failed: {msg}"),
            Self::NoSession => f.write_str("no session to refresh"),
            Self::Superseded => f.write_str("refresh superseded by a session change"),
        }
    }
}

impl std::error::Error for RefreshError {}

type Settlement = Result<RefreshOutcome, RefreshError>;

/// The single in-flight renewal attempt.
///
/// At most one exists per coordinator at any instant. Destroyed the moment
/// the operation settles; a request arriving after settlement starts fresh.
struct RefreshOperation {
    id: u64,
    started_at: Instant,
    outcome_tx: broadcast::Sender<Settlement>,
}

/// Decides whether a renewal is due, runs at most one at a time, and fans the
/// settlement out to every attached caller.
pub struct RefreshCoordinator {
    store: Arc<CredentialStore>,
    events: SessionEvents,
    http: reqwest::Client,
    token_url: String,
    margin_secs: u64,
    in_flight: Mutex<Option<RefreshOperation>>,
    op_seq: AtomicU64,
}

/// Token endpoint response. A rotated refresh token is optional — when the
/// platform omits it, the one just spent stays valid and is preserved.
#[derive(Debug, serde::Deserialize)]
struct RenewedTokens {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        events: SessionEvents,
        token_url: String,
        margin_secs: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            events,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            token_url,
            margin_secs,
            in_flight: Mutex::new(None),
            op_seq: AtomicU64::new(0),
        })
    }

    /// Renew the session's access token, or attach to the renewal already in
    /// flight.
    ///
    /// With `force` false, returns [`RefreshOutcome::NotNeeded`] without any
    /// network traffic while the session is comfortably inside its expiry
    /// margin. Fire-and-forget callers can ignore the return value and watch
    /// the event hub instead (`Refreshed` on success, `Logout` on teardown).
    pub async fn request_refresh(&self, force: bool) -> Settlement {
        if !force && !self.store.is_expiring_soon(self.margin_secs) {
            return Ok(RefreshOutcome::NotNeeded);
        }

        // Attach or install. The marker is written under the lock, with no
        // await between the check and the install, so a second caller in the
        // same scheduling window can only ever land in the attach arm.
        let (op_id, outcome_tx) = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(ref op) = *in_flight {
                let attached_id = op.id;
                let mut rx = op.outcome_tx.subscribe();
                drop(in_flight);
                tracing::debug!("attaching to in-flight refresh");
                return match rx.recv().await {
                    Ok(settlement) => settlement,
                    // The author task died without settling (runtime
                    // teardown). Drop the stale marker so a later request
                    // can start fresh.
                    Err(_) => {
                        let mut in_flight = self.in_flight.lock().await;
                        if in_flight.as_ref().is_some_and(|op| op.id == attached_id) {
                            *in_flight = None;
                        }
                        Err(RefreshError::Transport("refresh operation vanished".to_owned()))
                    }
                };
            }
            let (outcome_tx, _) = broadcast::channel(1);
            let id = self.op_seq.fetch_add(1, Ordering::Relaxed);
            *in_flight = Some(RefreshOperation {
                id,
                started_at: Instant::now(),
                outcome_tx: outcome_tx.clone(),
            });
            (id, outcome_tx)
        };

        let settlement = self.run_operation().await;

        // Clear the marker, then fan out. Store state was finalized inside
        // run_operation, so no attached caller can observe a half-applied
        // session.
        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.as_ref().is_some_and(|op| op.id == op_id) {
                if let Some(op) = in_flight.take() {
                    tracing::debug!(
                        elapsed_ms = op.started_at.elapsed().as_millis() as u64,
                        ok = settlement.is_ok(),
                        "refresh operation settled"
                    );
                }
            }
        }
        let _ = outcome_tx.send(settlement.clone());
        settlement
    }

    /// Execute the renewal and apply its result. Only the operation author
    /// runs this; attached callers wait on the settlement channel.
    async fn run_operation(&self) -> Settlement {
        let Some(session) = self.store.get() else {
            return Err(RefreshError::NoSession);
        };
        let spent_refresh_token = session.refresh_token;

        let renewed = match self.exchange(&spent_refresh_token).await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(err = %err, "refresh failed, tearing down session");
                self.store.clear();
                self.events.emit(SessionEvent::Logout);
                return Err(err);
            }
        };

        // A logout or a fresh login may have landed while the call was in
        // flight. Applying the result then would revive a dead session, so it
        // is discarded unless the stored refresh token is still the one this
        // operation spent.
        if self.store.get().map(|s| s.refresh_token).as_deref() != Some(spent_refresh_token.as_str())
        {
            tracing::info!("discarding refresh result, session changed while in flight");
            return Err(RefreshError::Superseded);
        }

        let next_refresh = renewed.refresh_token.unwrap_or(spent_refresh_token);
        self.store.set(&renewed.access_token, &next_refresh);
        if self.store.get().is_none() {
            // set() refuses undecodable tokens by clearing; treat as a
            // malformed response.
            self.events.emit(SessionEvent::Logout);
            return Err(RefreshError::Transport(
                "renewal returned an undecodable access token".to_owned(),
            ));
        }

        self.events.emit(SessionEvent::Refreshed);
        tracing::info!("access token refreshed");
        Ok(RefreshOutcome::Refreshed)
    }

    /// Exchange a refresh token for a new access token.
    async fn exchange(&self, refresh_token: &str) -> Result<RenewedTokens, RefreshError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected(format!("{status}: {text}")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RefreshError::Transport(format!("{status}: {text}")));
        }
        resp.json()
            .await
            .map_err(|e| RefreshError::Transport(format!("malformed refresh response: {e}")))
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
