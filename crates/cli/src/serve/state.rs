//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::seed::Engine;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory fixed-window rate limiter keyed by client IP.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Ok if the request is allowed, otherwise the seconds until the window resets.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();

        let entry = tracker.entry(ip).or_insert((0, now));
        let elapsed = now.duration_since(entry.1);
        if elapsed >= self.window {
            *entry = (0, now);
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            Err(self.window.saturating_sub(elapsed).as_secs().max(1))
        } else {
            Ok(())
        }
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) engine: Engine,
    pub(crate) rate_limiter: RateLimiter,
    /// None disables authentication.
    pub(crate) api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn limits_each_ip_independently() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(limiter.check(a).await.is_ok());
        assert!(limiter.check(a).await.is_ok());
        let retry_after = limiter.check(a).await.unwrap_err();
        assert!((1..=60).contains(&retry_after));
        assert!(limiter.check(b).await.is_ok());
    }

    #[tokio::test]
    async fn window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(30));
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(limiter.check(ip).await.is_ok());
        assert!(limiter.check(ip).await.is_err());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check(ip).await.is_ok());
    }
}
