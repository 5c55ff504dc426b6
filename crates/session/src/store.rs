// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store: the single owner of durable session state.
//!
//! Two storage surfaces, written in lockstep:
//! - `session.json` — the full token pair, read back by this subsystem.
//! - `handoff.json` — access token + expiry only, a read-only mirror for
//!   companion middleware that gates requests before they reach client code.
//!
//! Every read hits the disk; no component holds a token beyond the scope of
//! one operation. That makes cross-process convergence a plain re-read.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::token::{self, Claims};

const SESSION_FILE: &str = "session.json";
const HANDOFF_FILE: &str = "handoff.json";

/// A consistent snapshot of the current session.
///
/// `expires_at` is always re-derived from the access token's own `exp` claim,
/// never trusted from a separately stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch seconds, derived from `claims.exp`.
    pub expires_at: u64,
    pub claims: Claims,
}

/// On-disk shape of `session.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSession {
    access_token: String,
    refresh_token: String,
    /// Expiry as epoch seconds. Informational — re-derived on read.
    expires_at: u64,
}

/// On-disk shape of `handoff.json` (server-readable surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedHandoff {
    access_token: String,
    expires_at: u64,
}

/// Owns the two storage surfaces. Pure get/set/clear — no refresh policy.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The state directory both surfaces live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn handoff_path(&self) -> PathBuf {
        self.dir.join(HANDOFF_FILE)
    }

    /// Persist a token pair, deriving expiry from the access token itself.
    ///
    /// Never fails out to the caller: a token pair that cannot form a valid
    /// session (undecodable access token, missing half) clears the store
    /// instead of leaving it partially written.
    pub fn set(&self, access_token: &str, refresh_token: &str) {
        if access_token.is_empty() || refresh_token.is_empty() {
            tracing::warn!("rejected half-populated session, clearing store");
            self.clear();
            return;
        }

        let claims = match token::decode(access_token) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(err = %e, "access token failed to decode, clearing store");
                self.clear();
                return;
            }
        };

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), err = %e, "failed to create state dir");
            return;
        }

        let session = PersistedSession {
            access_token: access_token.to_owned(),
            refresh_token: refresh_token.to_owned(),
            expires_at: claims.exp,
        };
        let handoff =
            PersistedHandoff { access_token: access_token.to_owned(), expires_at: claims.exp };

        if let Err(e) = save_json(&self.session_path(), &session) {
            tracing::warn!(err = %e, "failed to persist session, clearing store");
            self.clear();
            return;
        }
        if let Err(e) = save_json(&self.handoff_path(), &handoff) {
            // Surfaces must agree; a session without its mirror is torn down.
            tracing::warn!(err = %e, "failed to persist handoff mirror, clearing store");
            self.clear();
        }
    }

    /// Read the current session, or `None` when no valid session exists.
    ///
    /// Enforces the pairing invariant: a file with exactly one of the two
    /// tokens reads as absent. Decode failures are recovered into "absent"
    /// rather than surfaced.
    pub fn get(&self) -> Option<Session> {
        let contents = std::fs::read_to_string(self.session_path()).ok()?;
        let persisted: PersistedSession = serde_json::from_str(&contents).ok()?;

        if persisted.access_token.is_empty() || persisted.refresh_token.is_empty() {
            return None;
        }

        let claims = token::decode(&persisted.access_token).ok()?;
        Some(Session {
            access_token: persisted.access_token,
            refresh_token: persisted.refresh_token,
            expires_at: claims.exp,
            claims,
        })
    }

    /// Remove both surfaces. Idempotent.
    pub fn clear(&self) {
        for path in [self.session_path(), self.handoff_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), err = %e, "failed to remove"),
            }
        }
    }

    /// True when the session expires within `threshold_secs`, or when no
    /// session exists at all.
    pub fn is_expiring_soon(&self, threshold_secs: u64) -> bool {
        match self.get() {
            Some(session) => session.expires_at <= epoch_secs().saturating_add(threshold_secs),
            None => true,
        }
    }
}

/// Serialize to a JSON file atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) to avoid corruption when
/// concurrent saves race on the same `.tmp` file — a shorter write can leave
/// trailing bytes from a longer previous write.
fn save_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(value)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Return current epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
