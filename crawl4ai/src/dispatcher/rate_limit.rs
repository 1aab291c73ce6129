//! Per-host token-bucket rate limiting with jitter and 429 backoff (§4.4).

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct HostState {
    /// Monotonic instant (as millis since limiter creation) the next
    /// request against this host is allowed to start.
    next_allowed_ms: AtomicU64,
    consecutive_backoffs: AtomicU64,
}

/// One bucket per rate-limit key (host by default). `mean_delay_s` spaces
/// requests out; `max_range_s` adds uniform jitter on top.
pub struct RateLimiter {
    epoch: Instant,
    mean_delay_s: f64,
    max_range_s: f64,
    hosts: DashMap<String, HostState>,
}

impl RateLimiter {
    pub fn new(mean_delay_s: f64, max_range_s: f64) -> Self {
        Self {
            epoch: Instant::now(),
            mean_delay_s,
            max_range_s,
            hosts: DashMap::new(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Block until `key`'s bucket allows the next request, then reserve the
    /// following slot.
    pub async fn acquire(&self, key: &str) {
        if self.mean_delay_s <= 0.0 && self.max_range_s <= 0.0 {
            return;
        }
        let entry = self
            .hosts
            .entry(key.to_string())
            .or_insert_with(|| HostState {
                next_allowed_ms: AtomicU64::new(0),
                consecutive_backoffs: AtomicU64::new(0),
            });
        let now = self.elapsed_ms();
        let allowed_at = entry.next_allowed_ms.load(Ordering::Relaxed);
        if allowed_at > now {
            tokio::time::sleep(Duration::from_millis(allowed_at - now)).await;
        }
        let jitter_s = if self.max_range_s > 0.0 {
            fastrand::f64() * self.max_range_s
        } else {
            0.0
        };
        let delay_ms = ((self.mean_delay_s + jitter_s) * 1000.0).max(0.0) as u64;
        entry
            .next_allowed_ms
            .store(self.elapsed_ms() + delay_ms, Ordering::Relaxed);
    }

    /// Apply exponential backoff to `key` after a 429 or rate-limit signal.
    /// Returns the delay applied, as a hint for proxy rotation.
    pub fn backoff(&self, key: &str) -> Duration {
        let entry = self
            .hosts
            .entry(key.to_string())
            .or_insert_with(|| HostState {
                next_allowed_ms: AtomicU64::new(0),
                consecutive_backoffs: AtomicU64::new(0),
            });
        let attempt = entry.consecutive_backoffs.fetch_add(1, Ordering::Relaxed);
        let backoff_s = (2u64.saturating_pow(attempt.min(6) as u32)) as f64;
        let delay = Duration::from_secs_f64(backoff_s);
        entry
            .next_allowed_ms
            .store(self.elapsed_ms() + delay.as_millis() as u64, Ordering::Relaxed);
        delay
    }

    pub fn reset_backoff(&self, key: &str) {
        if let Some(entry) = self.hosts.get(key) {
            entry.consecutive_backoffs.store(0, Ordering::Relaxed);
        }
    }
}

/// Default rate-limit key: the URL's host.
pub fn host_key(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_delay_never_sleeps() {
        let limiter = RateLimiter::new(0.0, 0.0);
        let start = Instant::now();
        limiter.acquire("host").await;
        limiter.acquire("host").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn host_key_extracts_hostname() {
        assert_eq!(host_key("https://example.com/a/b?c=1"), "example.com");
    }

    #[test]
    fn backoff_grows_exponentially_per_key() {
        let limiter = RateLimiter::new(0.0, 0.0);
        let first = limiter.backoff("host");
        let second = limiter.backoff("host");
        assert!(second > first);
    }
}
