// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: token minting and clock helpers.

use std::sync::Once;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls. Required before
/// building a `reqwest::Client` under the `rustls-no-provider` feature.
/// Safe to call repeatedly — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Mint a structurally valid (but unsigned-garbage) three-part token with the
/// given claims. The decoder never verifies signatures, so a fixed filler
/// signature segment is enough for every test in the workspace.
pub fn mint_token(sub: &str, role: &str, exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = serde_json::json!({ "sub": sub, "role": role, "exp": exp });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

/// Mint a token expiring `secs_from_now` seconds in the future (or past, when
/// negative).
pub fn mint_token_expiring_in(sub: &str, secs_from_now: i64) -> String {
    let now = crate::store::epoch_secs() as i64;
    let exp = now.saturating_add(secs_from_now).max(0) as u64;
    mint_token(sub, "student", exp)
}
