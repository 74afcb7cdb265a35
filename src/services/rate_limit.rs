//! Fixed-window request counting keyed by caller (e.g. client IP).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Injected into the contact service so tests and multi-instance
/// deployments can swap the backing store.
pub trait RateLimiter: Send + Sync {
    /// Counts one attempt for `key` and says whether it may proceed.
    fn check(&self, key: &str) -> RateDecision;

    /// Forgets every counter.
    fn reset(&self);
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// In-process limiter. Counters are lost on restart and not shared
/// between instances.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    max: u32,
    window: Duration,
    max_keys: usize,
    windows: Mutex<HashMap<String, Window>>,
}

const PRUNE_THRESHOLD: usize = 1024;
const DEFAULT_MAX_KEYS: usize = 16_384;

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(max: u32, window: Duration) -> Self {
        Self::with_key_limit(max, window, DEFAULT_MAX_KEYS)
    }

    /// Past `max_keys` live windows the oldest one is evicted for each new key.
    #[must_use]
    pub fn with_key_limit(max: u32, window: Duration, max_keys: usize) -> Self {
        Self {
            max,
            window,
            max_keys: max_keys.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if windows.len() >= PRUNE_THRESHOLD.min(self.max_keys) {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        if windows.len() >= self.max_keys && !windows.contains_key(key) {
            let oldest = windows
                .iter()
                .min_by_key(|(_, w)| w.started)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                windows.remove(&oldest);
            }
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max {
            let elapsed = now.duration_since(entry.started);
            return RateDecision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max - entry.count,
        }
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn reset(&self) {
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}
