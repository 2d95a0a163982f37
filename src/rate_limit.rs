//! Per-client fixed-window rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::error;

/// Key used when a request carries no forwarding header. All same-host
/// traffic shares this bucket.
pub const LOCAL_CLIENT_KEY: &str = "local";

/// Entries beyond this count trigger eviction of expired windows.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record one request for `client_key`.
    pub fn allow(&self, client_key: &str) -> bool {
        self.allow_at(client_key, Instant::now())
    }

    /// `allow` with an explicit clock reading.
    pub fn allow_at(&self, client_key: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A stale counter beats refusing every request.
                error!("rate limiter lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now <= w.reset_at);
        }

        if let Some(w) = windows.get_mut(client_key) {
            if now <= w.reset_at {
                if w.count >= self.max_requests {
                    return false;
                }
                w.count += 1;
                return true;
            }
        }

        windows.insert(
            client_key.to_string(),
            RateWindow {
                count: 1,
                reset_at: now + self.window,
            },
        );
        true
    }
}

/// Derive the client key from an `X-Forwarded-For` value.
pub fn client_key(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(LOCAL_CLIENT_KEY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn eleventh_request_in_window_is_rejected() {
        let limiter = RateLimiter::new(10, WINDOW);
        let start = Instant::now();
        for i in 0..10 {
            assert!(limiter.allow_at("c", start + Duration::from_secs(i)), "request {}", i + 1);
        }
        assert!(!limiter.allow_at("c", start + Duration::from_secs(30)));
        assert!(!limiter.allow_at("c", start + WINDOW));
    }

    #[test]
    fn first_request_after_window_is_admitted() {
        let limiter = RateLimiter::new(10, WINDOW);
        let start = Instant::now();
        for _ in 0..12 {
            limiter.allow_at("c", start);
        }
        assert!(!limiter.allow_at("c", start + Duration::from_secs(59)));
        let later = start + WINDOW + Duration::from_millis(1);
        assert!(limiter.allow_at("c", later));
        // New window counts from one.
        for _ in 0..9 {
            assert!(limiter.allow_at("c", later));
        }
        assert!(!limiter.allow_at("c", later));
    }

    #[test]
    fn rejected_requests_do_not_extend_the_window() {
        let limiter = RateLimiter::new(1, WINDOW);
        let start = Instant::now();
        assert!(limiter.allow_at("c", start));
        assert!(!limiter.allow_at("c", start + Duration::from_secs(50)));
        assert!(limiter.allow_at("c", start + Duration::from_secs(61)));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn client_key_defaults_to_local() {
        assert_eq!(client_key(None), LOCAL_CLIENT_KEY);
        assert_eq!(client_key(Some("  ")), LOCAL_CLIENT_KEY);
        assert_eq!(client_key(Some("10.0.0.7")), "10.0.0.7");
    }

    #[test]
    fn concurrent_callers_never_exceed_cap() {
        let limiter = Arc::new(RateLimiter::new(10, WINDOW));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..5).filter(|_| limiter.allow("shared")).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 10);
    }
}
