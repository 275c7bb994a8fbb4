//! Fixed-window quota for assistant-triggered searches

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// At most `max_searches` per key within each `window`
#[derive(Debug)]
pub struct SearchRateLimiter {
    max_searches: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl Default for SearchRateLimiter {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60 * 60))
    }
}

impl SearchRateLimiter {
    pub fn new(max_searches: u32, window: Duration) -> Self {
        Self {
            max_searches,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap().len()
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Count one search for `key` at `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self.windows.lock().unwrap();
        windows.retain(|_, w| now < w.resets_at);

        match windows.get_mut(key) {
            Some(w) if now < w.resets_at => {
                if w.count >= self.max_searches {
                    return RateDecision::Limited {
                        retry_after: w.resets_at - now,
                    };
                }
                w.count += 1;
                RateDecision::Allowed {
                    remaining: self.max_searches - w.count,
                }
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        resets_at: now + self.window,
                    },
                );
                RateDecision::Allowed {
                    remaining: self.max_searches.saturating_sub(1),
                }
            }
        }
    }
}
