//! Fixed-window attempt counter keyed by client address.

use std::{
    collections::HashMap,
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Allows `max_attempts` per client within a window that starts at the
/// client's first attempt. A window past its boundary is replaced lazily by
/// the next attempt; [`RateLimiter::purge_expired`] drops idle ones.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt. On refusal returns the time left until the window resets.
    pub async fn check(&self, client: IpAddr) -> Result<(), Duration> {
        self.check_at(client, Instant::now()).await
    }

    pub(crate) async fn check_at(&self, client: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut windows = self.windows.lock().await;

        match windows.get_mut(&client) {
            Some(window) if now <= window.reset_at => {
                if window.count >= self.config.max_attempts {
                    return Err(window.reset_at.saturating_duration_since(now));
                }
                window.count += 1;
                Ok(())
            }
            _ => {
                windows.insert(
                    client,
                    Window {
                        count: 1,
                        reset_at: now + self.config.window,
                    },
                );
                Ok(())
            }
        }
    }

    /// Drop windows whose boundary has passed. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }

    pub(crate) async fn purge_expired_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| now <= window.reset_at);
        before - windows.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_attempts,
            window: Duration::from_secs(window_secs),
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[tokio::test]
    async fn test_eleventh_attempt_is_refused() {
        let limiter = limiter(10, 15 * 60);
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.check_at(ip(1), now).await.is_ok());
        }
        let retry = limiter.check_at(ip(1), now).await.unwrap_err();
        assert_eq!(retry, Duration::from_secs(15 * 60));
    }

    #[tokio::test]
    async fn test_clients_are_counted_separately() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check_at(ip(1), now).await.is_ok());
        assert!(limiter.check_at(ip(1), now).await.is_err());
        assert!(limiter.check_at(ip(2), now).await.is_ok());
    }

    #[tokio::test]
    async fn test_window_resets_after_boundary() {
        let limiter = limiter(2, 60);
        let start = Instant::now();
        limiter.check_at(ip(1), start).await.unwrap();
        limiter.check_at(ip(1), start).await.unwrap();
        assert!(limiter
            .check_at(ip(1), start + Duration::from_secs(30))
            .await
            .is_err());

        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at(ip(1), later).await.is_ok());
        assert!(limiter.check_at(ip(1), later).await.is_ok());
        assert!(limiter.check_at(ip(1), later).await.is_err());
    }

    #[tokio::test]
    async fn test_purge_drops_only_expired_windows() {
        let limiter = limiter(5, 60);
        let start = Instant::now();
        limiter.check_at(ip(1), start).await.unwrap();
        limiter
            .check_at(ip(2), start + Duration::from_secs(45))
            .await
            .unwrap();

        let removed = limiter
            .purge_expired_at(start + Duration::from_secs(61))
            .await;
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients().await, 1);
    }
}
