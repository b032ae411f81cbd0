//! Sliding-window rate limiter: a pure function over (action, state, now).

use std::time::{Duration, Instant};

use crate::models::RateLimitAction;

/// Per-(player, action) window state: when the current window started
/// and how many requests have landed in it.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitState {
    pub window_start: Instant,
    pub count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitOutcome {
    pub allowed: bool,
    pub new_state: RateLimitState,
    pub retry_after_ms: Option<u64>,
}

/// `(intervalMs, maxRequests)` per action.
pub fn limits_for(action: RateLimitAction) -> (u64, u32) {
    match action {
        RateLimitAction::RunCode => (2000, 1),
        RateLimitAction::SubmitCode => (3000, 1),
        RateLimitAction::CodeUpdate => (100, 10),
        RateLimitAction::SpectatePlayer => (1000, 1),
        RateLimitAction::SendChat => (500, 2),
    }
}

/// Pure sliding-window check: given the current state (or none, for a
/// first request) and the action, decides whether this request is
/// allowed and returns the state to store back.
pub fn check(
    action: RateLimitAction,
    state: Option<RateLimitState>,
    now: Instant,
) -> RateLimitOutcome {
    let (interval_ms, max_requests) = limits_for(action);
    let interval = Duration::from_millis(interval_ms);

    let state = match state {
        Some(s) if now.saturating_duration_since(s.window_start) < interval => s,
        _ => RateLimitState { window_start: now, count: 0 },
    };

    if state.count < max_requests {
        RateLimitOutcome {
            allowed: true,
            new_state: RateLimitState {
                window_start: state.window_start,
                count: state.count + 1,
            },
            retry_after_ms: None,
        }
    } else {
        let elapsed = now.saturating_duration_since(state.window_start);
        let retry_after_ms = interval.saturating_sub(elapsed).as_millis() as u64;
        RateLimitOutcome {
            allowed: false,
            new_state: state,
            retry_after_ms: Some(retry_after_ms),
        }
    }
}
