// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observability events emitted by a refresh session.
//!
//! Emission is best-effort: a sink with no subscribers drops events, and a
//! failed send never affects scheduling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle notifications for the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// A refresh attempt was armed `delay_ms` from now.
    Scheduled { delay_ms: u64 },
    /// A refresh request went out.
    Start,
    /// A refresh succeeded; the next one is `next_in_ms` away.
    Done { next_in_ms: u64, ttl_sec: u64 },
    /// A refresh attempt failed.
    Error { message: String },
    /// Consecutive failures reached the configured threshold. Non-fatal:
    /// retries continue; whether to interrupt the user is the host's call.
    AuthRequired { consec_errors: u32 },
}

/// Fan-out channel for [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Never fails; with no live subscribers the event is
    /// silently dropped.
    pub fn emit(&self, event: SessionEvent) {
        tracing::debug!(event = ?event, "session event");
        let _ = self.tx.send(event);
    }
}
