// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// A non-2xx platform response, surfaced to the caller unchanged.
///
/// Carries no session impact by itself — only the gateway's single handled
/// 401 ever feeds back into session state, and even then teardown is the
/// watchdog's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: u16,
    pub payload: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform returned {}: {}", self.status, self.payload)
    }
}

impl std::error::Error for HttpError {}

/// Errors surfaced by the authenticated request gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The platform answered with a non-2xx status.
    Http(HttpError),
    /// The request never produced a response.
    Transport(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => e.fmt(f),
            Self::Transport(msg) => write!(f, "request failed: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<HttpError> for GatewayError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

impl GatewayError {
    /// The HTTP status, when the platform answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => Some(e.status),
            Self::Transport(_) => None,
        }
    }
}
