// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-environment seam between the scheduler and the embedding page.
//!
//! The scheduler never touches a frame, a message channel, or a wall clock
//! directly; everything goes through [`HostEnvironment`] so the scheduling
//! logic can run headless in tests and non-browser harnesses.

use parking_lot::Mutex;

/// Everything the scheduler needs from the page that embeds the session.
pub trait HostEnvironment: Send + Sync + 'static {
    /// Wall-clock epoch milliseconds. Used only for the `_ts` cache-buster;
    /// all scheduling arithmetic is monotonic.
    fn now_ms(&self) -> u64 {
        epoch_ms()
    }

    /// Current navigation target of the embedded frame, if any.
    fn navigation_target(&self) -> Option<String>;

    /// Point the embedded frame at a new session URL.
    fn set_navigation_target(&self, url: &str);

    /// Deliver one opaque keepalive signal into the embedded session's
    /// message channel.
    fn send_heartbeat(&self);
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Host that keeps the navigation target in memory and logs side effects.
///
/// Used by the soak-runner binary, where there is no real frame to drive.
#[derive(Debug, Default)]
pub struct LoggingHost {
    target: Mutex<Option<String>>,
}

impl LoggingHost {
    pub fn new(initial_target: Option<String>) -> Self {
        Self { target: Mutex::new(initial_target) }
    }
}

impl HostEnvironment for LoggingHost {
    fn navigation_target(&self) -> Option<String> {
        self.target.lock().clone()
    }

    fn set_navigation_target(&self, url: &str) {
        tracing::info!(%url, "frame navigation target updated");
        *self.target.lock() = Some(url.to_owned());
    }

    fn send_heartbeat(&self) {
        tracing::debug!("heartbeat sent");
    }
}
