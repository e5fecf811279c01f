use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// In-memory limiter for failed login attempts, keyed by username
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
    max_attempts: usize,
    window: Duration,
}

impl RateLimiter {
    /// `max_attempts` failures are tolerated within `window_secs`
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        // A panic while holding the lock leaves the map usable
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns false once the key has used up its attempts
    pub fn check(&self, key: &str) -> bool {
        self.remaining(key) > 0
    }

    /// Record a failed attempt
    pub fn record(&self, key: &str) {
        let mut attempts = self.lock();
        let now = Instant::now();

        let entry = attempts.entry(key.to_string()).or_default();
        entry.retain(|&time| now.duration_since(time) < self.window);
        entry.push(now);
    }

    /// Forget a key after a successful login
    pub fn clear(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn remaining(&self, key: &str) -> usize {
        let mut attempts = self.lock();
        let now = Instant::now();

        match attempts.get_mut(key) {
            Some(entry) => {
                entry.retain(|&time| now.duration_since(time) < self.window);
                self.max_attempts.saturating_sub(entry.len())
            }
            None => self.max_attempts,
        }
    }
}
