// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for one keepalive session.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the application that mints refresh tokens.
    #[arg(long, env = "WOPI_KEEPALIVE_API_BASE")]
    pub api_base: String,

    /// Document filename the embedded session is editing.
    #[arg(long, env = "WOPI_KEEPALIVE_FILENAME")]
    pub filename: String,

    /// Editing mode: "edit" or "view".
    #[arg(long, default_value = "edit", env = "WOPI_KEEPALIVE_MODE")]
    pub mode: String,

    /// User identifier forwarded to the refresh endpoint.
    #[arg(long, env = "WOPI_KEEPALIVE_USER_ID")]
    pub user_id: String,

    /// Display name forwarded to the refresh endpoint.
    #[arg(long, env = "WOPI_KEEPALIVE_USER_NAME")]
    pub user_name: String,

    /// Explicit refresh lead time in milliseconds. If unset, the lead is
    /// derived from the token TTL (20%, clamped to 2–10 minutes).
    #[arg(long, env = "WOPI_KEEPALIVE_REFRESH_LEAD_MS")]
    pub refresh_lead_ms: Option<u64>,

    /// Consecutive refresh failures before an `auth-required` event.
    #[arg(long, default_value_t = 5, env = "WOPI_KEEPALIVE_MAX_CONSEC_ERRORS")]
    pub max_consec_errors: u32,

    /// Delay after the frame's first load event for a one-shot rescue
    /// refresh. 0 disables the rescue.
    #[arg(long, default_value_t = 0, env = "WOPI_KEEPALIVE_RESCUE_ON_LOAD_MS")]
    pub rescue_on_load_ms: u64,

    /// Heartbeat interval in milliseconds.
    #[arg(long, default_value_t = 120_000, env = "WOPI_KEEPALIVE_KEEPALIVE_MS")]
    pub keepalive_ms: u64,

    /// Staleness bound for the hard-reload safety net, in milliseconds.
    #[arg(long, default_value_t = 600_000, env = "WOPI_KEEPALIVE_HARD_RELOAD_MS")]
    pub hard_reload_ms: u64,

    /// Remote host's hard session ceiling in seconds. 0 disables the
    /// forced-reload timer.
    #[arg(long, default_value_t = 7200, env = "WOPI_KEEPALIVE_HARD_SESSION_SEC")]
    pub hard_session_sec: u64,
}

impl SessionConfig {
    pub fn keepalive_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.keepalive_ms)
    }

    /// Period of the hard-reload safety net: half the staleness bound,
    /// never more often than every five minutes.
    pub fn hard_reload_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis((self.hard_reload_ms / 2).max(300_000))
    }
}
