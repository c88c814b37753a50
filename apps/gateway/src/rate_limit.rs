//! Per-endpoint sliding-window rate limiting.
//!
//! Each endpoint gets a bounded window of request arrival instants; a
//! request is admitted while fewer than `limit` arrivals survive inside
//! the last second. Expiry happens on arrival, not on a timer. The map
//! is swept opportunistically so idle endpoints do not accumulate.
//!
//! This limiter is per-process. A horizontally scaled deployment swaps
//! in a shared store behind the same [`RateLimiter::check`] contract.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use uuid::Uuid;

use crate::error::GatewayError;

/// Admission window.
const WINDOW: Duration = Duration::from_millis(1000);

/// Minimum interval between cleanup sweeps of the key map.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Keys whose most recent arrival is older than this are dropped on sweep.
const IDLE_TTL: Duration = Duration::from_secs(60);

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request was admitted.
    pub allowed: bool,

    /// The configured per-second limit.
    pub limit: u32,

    /// Admissions left in the current window.
    pub remaining: u32,

    /// Unix seconds when the window resets.
    pub reset_at_unix: i64,

    /// Seconds the client should wait before retrying (≥ 1 when denied).
    pub retry_after_secs: u64,
}

struct KeyWindow {
    arrivals: VecDeque<Instant>,
}

struct LimiterInner {
    windows: HashMap<Uuid, KeyWindow>,
    last_sweep: Instant,
}

/// Process-wide sliding-window rate limiter.
pub struct RateLimiter {
    inner: Mutex<LimiterInner>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LimiterInner {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Check whether a request for `key` is admitted under `limit`
    /// requests per second.
    pub fn check(&self, key: Uuid, limit: u32) -> RateLimitDecision {
        self.check_with_window(key, limit, WINDOW)
    }

    /// Check with an explicit window length.
    pub fn check_with_window(&self, key: Uuid, limit: u32, window: Duration) -> RateLimitDecision {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| {
            // A panic while holding the lock cannot corrupt the window
            // beyond losing some arrivals; keep serving.
            poisoned.into_inner()
        });

        if now.duration_since(inner.last_sweep) >= SWEEP_INTERVAL {
            inner
                .windows
                .retain(|_, w| matches!(w.arrivals.back(), Some(ts) if now.duration_since(*ts) < IDLE_TTL));
            inner.last_sweep = now;
        }

        let entry = inner.windows.entry(key).or_insert_with(|| KeyWindow {
            arrivals: VecDeque::with_capacity(limit as usize),
        });

        // Arrival-time expiry: an entry is expired exactly at ts + window.
        while matches!(entry.arrivals.front(), Some(ts) if now.duration_since(*ts) >= window) {
            entry.arrivals.pop_front();
        }

        let count = entry.arrivals.len() as u32;
        let allowed = count < limit;
        if allowed {
            entry.arrivals.push_back(now);
        }

        let until_reset = entry
            .arrivals
            .front()
            .map_or(window, |oldest| (*oldest + window).saturating_duration_since(now));

        let reset_at_unix = Utc::now().timestamp() + until_reset.as_secs() as i64 + 1;
        let remaining = if allowed { limit - (count + 1) } else { 0 };
        let retry_after_secs = if allowed {
            0
        } else {
            until_reset.as_secs().max(1)
        };

        RateLimitDecision {
            allowed,
            limit,
            remaining,
            reset_at_unix,
            retry_after_secs,
        }
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .windows
            .len()
    }
}

/// Apply the canonical rate-limit headers to a response header map.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_at_unix.to_string()) {
        headers.insert("X-RateLimit-Reset", value);
    }
}

/// Build the 429 response for a denied check.
pub fn rate_limited_response(decision: &RateLimitDecision) -> Response {
    let mut response = GatewayError::RateLimited {
        retry_after: decision.retry_after_secs,
    }
    .into_response();
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}
