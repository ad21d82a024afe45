//! Process-local fixed-window rate limiter. One limiter per
//! guarded operation (batch start, continue-episode); admission checks carry
//! their own idempotent housekeeping sweep rather than relying on a
//! background task, so there is nothing to keep alive or coordinate on
//! shutdown.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use manga_types::errors::MangaError;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    limit: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Admits or rejects one call under `key` (typically a user id).
    ///
    /// Sweeps expired windows for every key on each call. This is safe to
    /// call repeatedly with no external scheduling: a key with an expired
    /// window is reset in place on its next check rather than lingering.
    pub fn check(&self, key: &str) -> Result<(), MangaError> {
        let mut windows = self.windows.lock().unwrap();
        let now = Instant::now();
        windows.retain(|_, w| now.duration_since(w.started_at) < self.window);

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            let remaining = self.window - now.duration_since(entry.started_at);
            return Err(MangaError::RateLimited {
                retry_after_secs: remaining.as_secs() + 1,
            });
        }

        entry.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let limiter = FixedWindowLimiter::new(2, 60);
        assert!(limiter.check("u1").is_ok());
        assert!(limiter.check("u1").is_ok());
        let err = limiter.check("u1").unwrap_err();
        assert!(matches!(err, MangaError::RateLimited { .. }));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::new(1, 60);
        assert!(limiter.check("u1").is_ok());
        assert!(limiter.check("u2").is_ok());
        assert!(limiter.check("u1").is_err());
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = FixedWindowLimiter::new(1, 0);
        assert!(limiter.check("u1").is_ok());
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("u1").is_ok());
    }
}
