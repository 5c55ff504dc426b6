// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural token decoding.
//!
//! Parses the claims segment of a three-part signed token without verifying
//! the signature. The platform is the sole authority on token validity —
//! decoded claims gate display and local expiry checks only, never
//! authorization.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// Claims carried in a platform token's payload segment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Subject — the user this token was issued to.
    pub sub: String,
    /// Platform role (e.g. "student", "instructor"). Display-gating only.
    #[serde(default)]
    pub role: String,
    /// Expiry as epoch seconds.
    pub exp: u64,
}

/// A token that could not be structurally decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not three non-empty dot-separated segments.
    Shape,
    /// Claims segment is not valid base64url.
    Encoding,
    /// Claims segment is not a valid claims object.
    Claims(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shape => f.write_str("malformed token: not a three-part token"),
            Self::Encoding => f.write_str("malformed token: claims segment is not base64url"),
            Self::Claims(msg) => write!(f, "malformed token: invalid claims: {msg}"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Decode the claims segment of a token without signature verification.
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let (header, payload, signature) = match (segments.next(), segments.next(), segments.next()) {
        (Some(h), Some(p), Some(s)) => (h, p, s),
        _ => return Err(TokenError::Shape),
    };
    if header.is_empty() || payload.is_empty() || signature.is_empty() || segments.next().is_some()
    {
        return Err(TokenError::Shape);
    }

    let raw = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Encoding)?;
    serde_json::from_slice(&raw).map_err(|e| TokenError::Claims(e.to_string()))
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
