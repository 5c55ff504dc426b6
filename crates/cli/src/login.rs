// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `atrium login` — store issued credentials.
//!
//! The platform (or an operator) issues the token pair out of band; this
//! command only persists it. Other atrium processes pick the new session up
//! through the store watcher.

use std::path::PathBuf;

use atrium_session::config::SessionConfig;
use atrium_session::store::CredentialStore;
use atrium_session::token;

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Access token issued by the platform.
    #[arg(long, env = "ATRIUM_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    /// Refresh token issued by the platform.
    #[arg(long, env = "ATRIUM_REFRESH_TOKEN")]
    pub refresh_token: Option<String>,

    /// Read both tokens from an issued-credentials JSON file instead
    /// (`{"access_token": "...", "refresh_token": "..."}`).
    #[arg(long, conflicts_with_all = ["access_token", "refresh_token"])]
    pub from_file: Option<PathBuf>,
}

#[derive(Debug, serde::Deserialize)]
struct IssuedCredentials {
    access_token: String,
    refresh_token: String,
}

/// Resolve the token pair from args or file.
fn resolve_tokens(args: LoginArgs) -> anyhow::Result<(String, String)> {
    if let Some(path) = args.from_file {
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
        let creds: IssuedCredentials = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("invalid credentials file: {e}"))?;
        return Ok((creds.access_token, creds.refresh_token));
    }
    match (args.access_token, args.refresh_token) {
        (Some(access), Some(refresh)) => Ok((access, refresh)),
        _ => anyhow::bail!("provide --access-token and --refresh-token, or --from-file"),
    }
}

pub fn run(config: &SessionConfig, args: LoginArgs) -> anyhow::Result<i32> {
    let (access, refresh) = resolve_tokens(args)?;

    // Refuse garbage up front instead of letting the store clear itself.
    let claims = token::decode(&access)
        .map_err(|e| anyhow::anyhow!("refusing to store credentials: {e}"))?;

    let store = CredentialStore::new(config.resolved_state_dir());
    store.set(&access, &refresh);
    if store.get().is_none() {
        anyhow::bail!("failed to persist session");
    }

    if claims.role.is_empty() {
        println!("logged in as {}", claims.sub);
    } else {
        println!("logged in as {} ({})", claims.sub, claims.role);
    }
    Ok(0)
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
