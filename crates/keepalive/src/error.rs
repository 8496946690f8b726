// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Failure classes for a token refresh attempt.
///
/// The scheduler branches on class: auth failures get a short fixed backoff,
/// transport failures a multiplicative one, and a malformed body is handed
/// to the safety nets without rescheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Non-2xx response from the refresh endpoint.
    Http { status: u16 },
    /// Request never produced an HTTP response.
    Transport(String),
    /// 2xx response whose body could not be parsed.
    MalformedBody(String),
}

impl RefreshError {
    /// True for HTTP 401/403: credentials rejected, not a network problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403 })
    }

    /// True when the endpoint answered 2xx but the body was unusable.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedBody(_))
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { status } => write!(f, "refresh endpoint returned HTTP {status}"),
            Self::Transport(msg) => write!(f, "refresh transport failure: {msg}"),
            Self::MalformedBody(msg) => write!(f, "malformed refresh response: {msg}"),
        }
    }
}

impl std::error::Error for RefreshError {}
