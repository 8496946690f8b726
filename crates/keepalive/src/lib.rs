// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keepalive and token-refresh scheduler for embedded WOPI editing sessions.
//!
//! A WOPI host (Collabora-compatible viewer in an embedded frame) holds a
//! short-lived access token. This crate renews that token before expiry,
//! heartbeats the embedded session, recovers from network loss and timer
//! starvation, and forces a session reload before the remote host's hard
//! session ceiling, all without interrupting the user.
//!
//! [`start`] spawns one independent scheduler per embedded frame and returns
//! a [`session::RefreshSession`] handle for nudges, event subscription, and
//! teardown. Browser/host specifics are injected through
//! [`host::HostEnvironment`], so the scheduling logic runs headless.

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod policy;
pub mod session;
pub mod token;

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::host::HostEnvironment;
use crate::session::RefreshSession;
use crate::token::TokenSource;

/// Start a refresh session for one embedded frame.
///
/// Each call produces an independent session with its own timers and event
/// channel; sessions never interfere with each other. The session runs until
/// [`RefreshSession::destroy`] is called or the handle is dropped.
pub fn start<T: TokenSource>(
    config: SessionConfig,
    host: Arc<dyn HostEnvironment>,
    tokens: Arc<T>,
) -> RefreshSession {
    session::spawn_session(config, host, tokens)
}
