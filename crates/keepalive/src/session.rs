// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The refresh scheduler core: one state machine per embedded session,
//! driven by a single tokio task.
//!
//! Timer roles: the primary deadline (next refresh attempt, at most one,
//! held inside [`Phase`]), the repeating keepalive deadline, the one-shot
//! forced-reload deadline (remote host's session ceiling), the one-shot
//! rescue deadline, and two safety-net intervals (watchdog and hard-reload)
//! that force progress when the primary cycle is starved.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::RefreshError;
use crate::events::{EventSink, SessionEvent};
use crate::host::HostEnvironment;
use crate::policy;
use crate::token::{RefreshParams, TokenResponse, TokenSource};

/// Watchdog period. Short enough to recover from timer throttling well
/// before the token actually expires.
const WATCHDOG_PERIOD: Duration = Duration::from_secs(60);
/// Staleness slack added to the keepalive interval before the watchdog
/// forces a refresh.
const WATCHDOG_SLACK_MS: u64 = 30_000;
/// Delay for refreshes nudged by connectivity/visibility signals.
const NUDGE_DELAY_MS: u64 = 1_500;

/// Environment signals delivered through the session handle.
#[derive(Debug, Clone, Copy)]
enum Nudge {
    /// Network connectivity restored.
    Online,
    /// Page became visible again.
    Visible,
    /// The embedded frame fired a load event.
    FrameLoaded,
    /// Host asked for an immediate refresh.
    ForceRefresh,
}

/// Scheduler states. `Scheduled` and `BackoffScheduled` carry the primary
/// deadline, so at most one primary timer exists by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Scheduled { deadline: Instant },
    Refreshing,
    BackoffScheduled { deadline: Instant },
    Destroyed,
}

/// Handle to a running refresh session.
///
/// Dropping the handle tears the session down, as does [`destroy`].
///
/// [`destroy`]: RefreshSession::destroy
pub struct RefreshSession {
    events: EventSink,
    nudges: mpsc::UnboundedSender<Nudge>,
    cancel: CancellationToken,
}

impl RefreshSession {
    /// Subscribe to lifecycle events. Subscribe before yielding to the
    /// runtime to observe the session's first events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Signal that network connectivity was restored.
    pub fn notify_online(&self) {
        let _ = self.nudges.send(Nudge::Online);
    }

    /// Signal that the page became visible again.
    pub fn notify_visible(&self) {
        let _ = self.nudges.send(Nudge::Visible);
    }

    /// Signal that the embedded frame fired a load event. Arms the one-shot
    /// rescue refresh if configured and not yet spent.
    pub fn notify_frame_loaded(&self) {
        let _ = self.nudges.send(Nudge::FrameLoaded);
    }

    /// Request an immediate refresh. Dropped if one is already in flight.
    pub fn force_refresh(&self) {
        let _ = self.nudges.send(Nudge::ForceRefresh);
    }

    /// Tear the session down. Idempotent; pending timers and any in-flight
    /// request are abandoned.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }
}

impl Drop for RefreshSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the scheduler task and return its handle.
pub(crate) fn spawn_session<T: TokenSource>(
    config: SessionConfig,
    host: Arc<dyn HostEnvironment>,
    tokens: Arc<T>,
) -> RefreshSession {
    let sink = EventSink::new(64);
    let cancel = CancellationToken::new();
    let (nudge_tx, nudge_rx) = mpsc::unbounded_channel();

    let task = SessionTask::new(config, host, tokens, sink.clone());
    tokio::spawn(run(task, cancel.clone(), nudge_rx));

    RefreshSession { events: sink, nudges: nudge_tx, cancel }
}

/// Per-session scheduler state. All methods are synchronous; the run loop
/// owns the awaiting.
struct SessionTask<T> {
    config: SessionConfig,
    host: Arc<dyn HostEnvironment>,
    tokens: Arc<T>,
    sink: EventSink,
    phase: Phase,
    consec_errors: u32,
    /// Monotonic timestamp of the last successful refresh. `None` until the
    /// first success; both safety nets treat that as stale.
    last_refresh_at: Option<Instant>,
    has_done_rescue: bool,
    keepalive_deadline: Option<Instant>,
    forced_reload_deadline: Option<Instant>,
    rescue_deadline: Option<Instant>,
}

impl<T: TokenSource> SessionTask<T> {
    fn new(
        config: SessionConfig,
        host: Arc<dyn HostEnvironment>,
        tokens: Arc<T>,
        sink: EventSink,
    ) -> Self {
        Self {
            config,
            host,
            tokens,
            sink,
            phase: Phase::Idle,
            consec_errors: 0,
            last_refresh_at: None,
            has_done_rescue: false,
            keepalive_deadline: None,
            forced_reload_deadline: None,
            rescue_deadline: None,
        }
    }

    fn params(&self) -> RefreshParams {
        RefreshParams {
            filename: self.config.filename.clone(),
            mode: self.config.mode.clone(),
            user_id: self.config.user_id.clone(),
            user_name: self.config.user_name.clone(),
        }
    }

    fn primary_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Scheduled { deadline } | Phase::BackoffScheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Arm the primary timer. Any previously armed deadline is replaced.
    fn schedule(&mut self, delay_ms: u64) {
        let delay_ms = delay_ms.max(policy::MIN_SCHEDULE_MS);
        let deadline = Instant::now() + Duration::from_millis(delay_ms);
        self.phase = Phase::Scheduled { deadline };
        self.sink.emit(SessionEvent::Scheduled { delay_ms });
    }

    /// Arm the primary timer with a failure penalty delay.
    fn schedule_backoff(&mut self, delay_ms: u64) {
        let delay_ms = delay_ms.max(policy::MIN_SCHEDULE_MS);
        let deadline = Instant::now() + Duration::from_millis(delay_ms);
        self.phase = Phase::BackoffScheduled { deadline };
        self.sink.emit(SessionEvent::Scheduled { delay_ms });
    }

    /// Derive the first schedule from the frame's current URL, or report
    /// that an immediate refresh is needed to establish state.
    fn bootstrap(&mut self) -> bool {
        let hint = self.host.navigation_target().as_deref().and_then(policy::ttl_hint_from_url);
        match hint {
            Some(ttl_sec) => {
                let lead = policy::compute_lead_ms(ttl_sec, self.config.refresh_lead_ms);
                self.schedule(policy::next_refresh_in_ms(ttl_sec, lead));
                false
            }
            None => true,
        }
    }

    /// Enter the `Refreshing` phase. Returns `false` (drop, don't queue)
    /// when a refresh is already in flight or the session is destroyed.
    fn begin_refresh(&mut self) -> bool {
        match self.phase {
            Phase::Refreshing | Phase::Destroyed => false,
            _ => {
                self.phase = Phase::Refreshing;
                self.keepalive_deadline = None;
                self.sink.emit(SessionEvent::Start);
                true
            }
        }
    }

    fn finish_refresh(&mut self, outcome: Result<TokenResponse, RefreshError>) {
        match outcome {
            Ok(resp) if resp.is_well_formed() => self.apply_refresh(resp),
            Ok(resp) => {
                // 200 with missing url/ttl: no state mutation, no reschedule.
                // The watchdog and hard-reload nets provide recovery. A
                // primary timer re-armed by a nudge mid-flight is kept.
                tracing::warn!(url = %resp.url, ttl_sec = resp.access_token_ttl,
                    "discarding malformed refresh response");
                if matches!(self.phase, Phase::Refreshing) {
                    self.phase = Phase::Idle;
                }
            }
            Err(e) if e.is_malformed() => {
                tracing::warn!(err = %e, "discarding unparseable refresh response");
                if matches!(self.phase, Phase::Refreshing) {
                    self.phase = Phase::Idle;
                }
            }
            Err(e) => {
                self.sink.emit(SessionEvent::Error { message: e.to_string() });
                self.consec_errors += 1;
                if self.consec_errors >= self.config.max_consec_errors {
                    tracing::warn!(consec_errors = self.consec_errors,
                        "sustained refresh failure, host re-authentication needed");
                    self.sink
                        .emit(SessionEvent::AuthRequired { consec_errors: self.consec_errors });
                }
                let backoff = policy::backoff_ms(e.is_auth(), self.consec_errors);
                tracing::debug!(err = %e, backoff_ms = backoff, "refresh failed, retrying");
                self.schedule_backoff(backoff);
            }
        }
    }

    /// Success path: swap the frame target if it changed, reschedule, and
    /// re-arm the keepalive and forced-reload timers.
    fn apply_refresh(&mut self, resp: TokenResponse) {
        let final_url = policy::cache_busted(&resp.url, self.host.now_ms());
        if self.host.navigation_target().as_deref() != Some(final_url.as_str()) {
            self.host.set_navigation_target(&final_url);
        }

        let ttl_sec = resp.access_token_ttl;
        let lead = policy::compute_lead_ms(ttl_sec, self.config.refresh_lead_ms);
        let next_in_ms = policy::next_refresh_in_ms(ttl_sec, lead);
        self.schedule(next_in_ms);

        let now = Instant::now();
        self.keepalive_deadline = Some(now + self.config.keepalive_interval());
        self.forced_reload_deadline = (self.config.hard_session_sec > 0).then(|| {
            now + Duration::from_millis(policy::forced_reload_in_ms(self.config.hard_session_sec))
        });

        self.sink.emit(SessionEvent::Done { next_in_ms, ttl_sec });
        self.consec_errors = 0;
        self.last_refresh_at = Some(now);
    }

    /// True when no refresh has succeeded within `threshold_ms`.
    fn stalled_for(&self, threshold_ms: u64) -> bool {
        match self.last_refresh_at {
            Some(at) => at.elapsed() >= Duration::from_millis(threshold_ms),
            None => true,
        }
    }

    /// Handle an environment signal. Returns true when the signal demands
    /// an immediate refresh attempt.
    fn on_nudge(&mut self, nudge: Nudge) -> bool {
        match nudge {
            Nudge::Online | Nudge::Visible => {
                // A long background period may have starved timers or staled
                // the token: drop keepalive and pull the refresh forward.
                self.keepalive_deadline = None;
                self.schedule(NUDGE_DELAY_MS);
                false
            }
            Nudge::FrameLoaded => {
                if self.config.rescue_on_load_ms > 0 && !self.has_done_rescue {
                    self.has_done_rescue = true;
                    self.rescue_deadline = Some(
                        Instant::now() + Duration::from_millis(self.config.rescue_on_load_ms),
                    );
                }
                false
            }
            Nudge::ForceRefresh => true,
        }
    }

    fn destroy(&mut self) {
        self.phase = Phase::Destroyed;
        self.keepalive_deadline = None;
        self.forced_reload_deadline = None;
        self.rescue_deadline = None;
    }
}

fn spawn_fetch<T: TokenSource>(
    task: &SessionTask<T>,
) -> JoinHandle<Result<TokenResponse, RefreshError>> {
    let tokens = Arc::clone(&task.tokens);
    let params = task.params();
    tokio::spawn(async move { tokens.refresh_token(params).await })
}

async fn join_inflight(
    inflight: &mut Option<JoinHandle<Result<TokenResponse, RefreshError>>>,
) -> Result<TokenResponse, RefreshError> {
    match inflight {
        Some(handle) => match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(RefreshError::Transport(format!("refresh task failed: {e}"))),
        },
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run<T: TokenSource>(
    mut task: SessionTask<T>,
    cancel: CancellationToken,
    mut nudges: mpsc::UnboundedReceiver<Nudge>,
) {
    let mut watchdog = tokio::time::interval_at(Instant::now() + WATCHDOG_PERIOD, WATCHDOG_PERIOD);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let hard_period = task.config.hard_reload_period();
    let mut hard_reload = tokio::time::interval_at(Instant::now() + hard_period, hard_period);
    hard_reload.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut inflight: Option<JoinHandle<Result<TokenResponse, RefreshError>>> = None;

    // No TTL hint on the current frame URL: refresh now to establish state.
    if task.bootstrap() && task.begin_refresh() {
        inflight = Some(spawn_fetch(&task));
    }

    loop {
        let primary_at = task.primary_deadline();
        let keepalive_at = task.keepalive_deadline;
        let forced_at = task.forced_reload_deadline;
        let rescue_at = task.rescue_deadline;

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            outcome = join_inflight(&mut inflight), if inflight.is_some() => {
                inflight = None;
                task.finish_refresh(outcome);
            }

            _ = sleep_until_opt(primary_at), if primary_at.is_some() && inflight.is_none() => {
                if task.begin_refresh() {
                    inflight = Some(spawn_fetch(&task));
                }
            }

            _ = sleep_until_opt(forced_at), if forced_at.is_some() && inflight.is_none() => {
                // Remote host will tear the session down soon regardless;
                // renew proactively so the frame reloads on our terms.
                task.forced_reload_deadline = None;
                if task.begin_refresh() {
                    inflight = Some(spawn_fetch(&task));
                }
            }

            _ = sleep_until_opt(rescue_at), if rescue_at.is_some() && inflight.is_none() => {
                task.rescue_deadline = None;
                if task.begin_refresh() {
                    inflight = Some(spawn_fetch(&task));
                }
            }

            _ = sleep_until_opt(keepalive_at), if keepalive_at.is_some() => {
                task.host.send_heartbeat();
                task.keepalive_deadline =
                    Some(Instant::now() + task.config.keepalive_interval());
            }

            _ = watchdog.tick() => {
                // Recovers from timer throttling that silently stalls the
                // primary cycle in backgrounded tabs.
                if inflight.is_none()
                    && task.stalled_for(task.config.keepalive_ms + WATCHDOG_SLACK_MS)
                    && task.begin_refresh()
                {
                    inflight = Some(spawn_fetch(&task));
                }
            }

            _ = hard_reload.tick() => {
                if inflight.is_none()
                    && task.stalled_for(task.config.hard_reload_ms)
                    && task.begin_refresh()
                {
                    inflight = Some(spawn_fetch(&task));
                }
            }

            nudge = nudges.recv() => match nudge {
                Some(nudge) => {
                    if task.on_nudge(nudge) && inflight.is_none() && task.begin_refresh() {
                        inflight = Some(spawn_fetch(&task));
                    }
                }
                // Handle dropped: same as an explicit destroy.
                None => break,
            },
        }
    }

    task.destroy();
    if let Some(handle) = inflight {
        handle.abort();
    }
    tracing::debug!(filename = %task.config.filename, "refresh session destroyed");
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
