// Request rate limiting
// In-memory daily and burst windows per (scope, caller) pair


use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub daily_limit: u32,
    pub burst_limit: u32,
    pub daily_window_seconds: u64,
    pub burst_window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            daily_limit: 100,
            burst_limit: 10,
            daily_window_seconds: 24 * 60 * 60,
            burst_window_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Daily request limit exceeded, retry in {} seconds", .retry_after.as_secs())]
    Daily { retry_after: Duration },
    #[error("Too many requests in a short time, retry in {} seconds", .retry_after.as_secs())]
    Burst { retry_after: Duration },
}

impl RateLimitError {
    #[inline]
    pub fn retry_after(&self) -> Duration {
        match self {
            Self::Daily { retry_after } | Self::Burst { retry_after } => *retry_after,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    start: Instant,
}

impl Window {
    /// Count one request, restarting the window once it has fully elapsed
    fn hit(slot: Option<&Self>, length: Duration, now: Instant) -> Self {
        match slot {
            Some(window) if now.saturating_duration_since(window.start) < length => Self {
                count: window.count.saturating_add(1),
                start: window.start,
            },
            _ => Self {
                count: 1,
                start: now,
            },
        }
    }

    fn retry_after(&self, length: Duration, now: Instant) -> Duration {
        length.saturating_sub(now.saturating_duration_since(self.start))
    }

    fn is_expired(&self, length: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= length
    }
}

type WindowKey = (String, String);

#[derive(Debug, Default)]
struct Counters {
    daily: HashMap<WindowKey, Window>,
    burst: HashMap<WindowKey, Window>,
}

impl Counters {
    /// Forget windows that have fully elapsed; a caller that returns later
    /// starts a fresh window either way.
    fn prune(&mut self, daily_length: Duration, burst_length: Duration, now: Instant) {
        self.daily
            .retain(|_, window| !window.is_expired(daily_length, now));
        self.burst
            .retain(|_, window| !window.is_expired(burst_length, now));
    }

    fn tracked(&self) -> usize {
        self.daily.len().max(self.burst.len())
    }
}

/// Fixed-window limiter shared by all request handlers of one process.
///
/// Every call to [`RateLimiter::check`] counts the request before comparing
/// against the limits, so rejected requests still consume quota.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    counters: Mutex<Counters>,
}

impl RateLimiter {
    #[inline]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(Counters::default()),
        }
    }

    #[inline]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request for `scope` (e.g. `"search"`) made by `key` and
    /// reject it when either window is over its limit.
    #[inline]
    pub fn check(&self, scope: &str, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let daily_length = Duration::from_secs(self.config.daily_window_seconds);
        let burst_length = Duration::from_secs(self.config.burst_window_seconds);
        let window_key = (scope.to_string(), key.to_string());

        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.prune(daily_length, burst_length, now);

        let daily = Window::hit(counters.daily.get(&window_key), daily_length, now);
        counters.daily.insert(window_key.clone(), daily);

        let burst = Window::hit(counters.burst.get(&window_key), burst_length, now);
        counters.burst.insert(window_key, burst);
        drop(counters);

        debug!(
            "Rate limit {}/{}: daily {}/{}, burst {}/{}",
            scope,
            key,
            daily.count,
            self.config.daily_limit,
            burst.count,
            self.config.burst_limit
        );

        if daily.count > self.config.daily_limit {
            let retry_after = daily.retry_after(daily_length, now);
            warn!("Daily limit exceeded for {} on {}", key, scope);
            return Err(RateLimitError::Daily { retry_after });
        }
        if burst.count > self.config.burst_limit {
            let retry_after = burst.retry_after(burst_length, now);
            warn!("Burst limit exceeded for {} on {}", key, scope);
            return Err(RateLimitError::Burst { retry_after });
        }

        Ok(())
    }

    /// Number of (scope, caller) pairs with a live window
    #[inline]
    pub fn tracked_callers(&self) -> usize {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tracked()
    }

    /// [`RateLimiter::check`] at the current instant
    #[inline]
    pub fn check_now(&self, scope: &str, key: &str) -> Result<(), RateLimitError> {
        self.check(scope, key, Instant::now())
    }
}

/// Callers are identified by session when they have one, otherwise by address
#[inline]
pub fn caller_key<'a>(session_id: Option<&'a str>, client_addr: &'a str) -> &'a str {
    session_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(client_addr)
}
