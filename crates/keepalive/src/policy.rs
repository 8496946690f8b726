// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure timing policy: lead-time derivation, scheduling floors, backoff,
//! and the URL helpers the scheduler needs around the session target.

/// Lower bound on the refresh lead time.
pub const MIN_LEAD_MS: u64 = 120_000;
/// Upper bound on the derived (not explicit) lead time.
pub const MAX_LEAD_MS: u64 = 600_000;
/// Smallest delay any timer may be armed with.
pub const MIN_SCHEDULE_MS: u64 = 1_000;
/// Fixed backoff after an auth failure.
pub const AUTH_BACKOFF_MS: u64 = 10_000;
/// Backoff step per consecutive non-auth failure.
pub const BACKOFF_STEP_MS: u64 = 30_000;
/// Backoff ceiling for non-auth failures.
pub const MAX_BACKOFF_MS: u64 = 120_000;
/// Safety margin subtracted from the remote host's session ceiling.
pub const CEILING_SAFETY_MS: u64 = 600_000;

/// How long before token expiry the next refresh should fire.
///
/// Without an explicit lead the candidate is 20% of the TTL clamped to
/// 2–10 minutes. The candidate is then capped to half the TTL and floored
/// back to 2 minutes, in that order. For TTLs under ~4 minutes the floor
/// re-raises the lead above half the TTL; the resulting near-immediate
/// re-refresh is long-standing observed behavior and is kept as is.
pub fn compute_lead_ms(ttl_sec: u64, explicit_lead_ms: Option<u64>) -> u64 {
    let ttl_sec = if ttl_sec == 0 { 3600 } else { ttl_sec };
    let ttl_ms = ttl_sec * 1000;

    let mut lead = match explicit_lead_ms {
        Some(ms) => ms,
        None => (ttl_ms / 5).clamp(MIN_LEAD_MS, MAX_LEAD_MS),
    };
    if lead > ttl_ms / 2 {
        lead = ttl_ms / 2;
    }
    if lead < MIN_LEAD_MS {
        lead = MIN_LEAD_MS;
    }
    lead
}

/// Delay until the next steady-state refresh for a freshly minted token.
pub fn next_refresh_in_ms(ttl_sec: u64, lead_ms: u64) -> u64 {
    (ttl_sec * 1000).saturating_sub(lead_ms).max(MIN_SCHEDULE_MS)
}

/// Retry delay after the `consec_errors`-th consecutive failure.
///
/// Auth rejections retry on a short fixed delay, since credentials may
/// resolve quickly. Everything else backs off multiplicatively up to two
/// minutes.
pub fn backoff_ms(is_auth: bool, consec_errors: u32) -> u64 {
    if is_auth {
        AUTH_BACKOFF_MS
    } else {
        (BACKOFF_STEP_MS * u64::from(consec_errors)).min(MAX_BACKOFF_MS)
    }
}

/// Delay until the forced session reload, given the remote host's ceiling.
pub fn forced_reload_in_ms(ceiling_sec: u64) -> u64 {
    (ceiling_sec * 1000).saturating_sub(CEILING_SAFETY_MS).max(60_000)
}

/// Extract the `access_token_ttl` query parameter from a session URL.
///
/// Returns `None` when the parameter is absent, unparseable, or zero.
pub fn ttl_hint_from_url(url: &str) -> Option<u64> {
    let (_, query) = url.split_once('?')?;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else { continue };
        if key == "access_token_ttl" {
            return match value.parse::<u64>() {
                Ok(ttl) if ttl > 0 => Some(ttl),
                _ => None,
            };
        }
    }
    None
}

/// Append a `_ts` cache-buster to a freshly minted session URL.
///
/// The parameter is appended with `&` unconditionally: minted URLs always
/// carry a token query string, and hosts that consume them expect this
/// exact shape.
pub fn cache_busted(url: &str, epoch_ms: u64) -> String {
    format!("{url}&_ts={epoch_ms}")
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
