//! Proxy rotation (§4.4): selection strategies over a concurrency-safe
//! registry, with `failure_aware` health tracking.

use crate::config::ProxyConfig;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyRotationStrategy {
    RoundRobin,
    Random,
    LeastUsed,
    FailureAware {
        failure_threshold: u32,
        recovery_time_s: u64,
    },
}

struct ProxyHealth {
    config: ProxyConfig,
    use_count: AtomicU64,
    failure_count: AtomicU32,
    unhealthy_until: AtomicU64,
}

/// Selects a proxy per task according to a `ProxyRotationStrategy`. The
/// registry itself is a `DashMap`; round-robin position is protected by a
/// plain `Mutex<usize>` so selection stays atomic under concurrent callers.
pub struct ProxyRegistry {
    proxies: Vec<ProxyHealth>,
    round_robin_cursor: Mutex<usize>,
}

impl ProxyRegistry {
    pub fn new(proxies: Vec<ProxyConfig>) -> Self {
        Self {
            proxies: proxies
                .into_iter()
                .map(|config| ProxyHealth {
                    config,
                    use_count: AtomicU64::new(0),
                    failure_count: AtomicU32::new(0),
                    unhealthy_until: AtomicU64::new(0),
                })
                .collect(),
            round_robin_cursor: Mutex::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    fn healthy_indices(&self) -> Vec<usize> {
        let now = now_secs();
        (0..self.proxies.len())
            .filter(|&i| self.proxies[i].unhealthy_until.load(Ordering::Relaxed) <= now)
            .collect()
    }

    /// Pick the next proxy for a task, or `None` if every proxy is
    /// currently marked unhealthy.
    pub fn select(&self, strategy: ProxyRotationStrategy) -> Option<ProxyConfig> {
        let healthy = self.healthy_indices();
        if healthy.is_empty() {
            return None;
        }
        let chosen = match strategy {
            ProxyRotationStrategy::RoundRobin => {
                let mut cursor = self.round_robin_cursor.lock().unwrap();
                let idx = healthy[*cursor % healthy.len()];
                *cursor = cursor.wrapping_add(1);
                idx
            }
            ProxyRotationStrategy::Random => {
                healthy[fastrand::usize(..healthy.len())]
            }
            ProxyRotationStrategy::LeastUsed | ProxyRotationStrategy::FailureAware { .. } => {
                *healthy
                    .iter()
                    .min_by_key(|&&i| self.proxies[i].use_count.load(Ordering::Relaxed))
                    .expect("healthy is non-empty")
            }
        };
        self.proxies[chosen].use_count.fetch_add(1, Ordering::Relaxed);
        Some(self.proxies[chosen].config.clone())
    }

    /// Record a failed request against `proxy`, marking it unhealthy under
    /// `FailureAware` once the threshold is exceeded.
    pub fn record_failure(&self, proxy: &ProxyConfig, strategy: ProxyRotationStrategy) {
        let ProxyRotationStrategy::FailureAware {
            failure_threshold,
            recovery_time_s,
        } = strategy
        else {
            return;
        };
        for entry in &self.proxies {
            if entry.config.server == proxy.server {
                let failures = entry.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= failure_threshold {
                    entry
                        .unhealthy_until
                        .store(now_secs() + recovery_time_s, Ordering::Relaxed);
                }
                break;
            }
        }
    }

    pub fn record_success(&self, proxy: &ProxyConfig) {
        for entry in &self.proxies {
            if entry.config.server == proxy.server {
                entry.failure_count.store(0, Ordering::Relaxed);
                break;
            }
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(server: &str) -> ProxyConfig {
        ProxyConfig {
            server: server.to_string(),
            username: None,
            password: None,
        }
    }

    #[test]
    fn round_robin_cycles_through_all_proxies() {
        let registry = ProxyRegistry::new(vec![proxy("a"), proxy("b"), proxy("c")]);
        let picks: Vec<String> = (0..6)
            .map(|_| registry.select(ProxyRotationStrategy::RoundRobin).unwrap().server)
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn failure_aware_marks_unhealthy_after_threshold() {
        let registry = ProxyRegistry::new(vec![proxy("a"), proxy("b")]);
        let strategy = ProxyRotationStrategy::FailureAware {
            failure_threshold: 2,
            recovery_time_s: 3600,
        };
        registry.record_failure(&proxy("a"), strategy);
        registry.record_failure(&proxy("a"), strategy);

        for _ in 0..10 {
            let picked = registry.select(strategy).unwrap();
            assert_eq!(picked.server, "b");
        }
    }

    #[test]
    fn least_used_prefers_proxy_with_fewest_selections() {
        let registry = ProxyRegistry::new(vec![proxy("a"), proxy("b")]);
        registry.select(ProxyRotationStrategy::LeastUsed);
        registry.select(ProxyRotationStrategy::LeastUsed);
        let picked = registry.select(ProxyRotationStrategy::LeastUsed).unwrap();
        assert_eq!(picked.server, "b");
    }

    #[test]
    fn empty_registry_returns_none() {
        let registry = ProxyRegistry::new(vec![]);
        assert!(registry.select(ProxyRotationStrategy::RoundRobin).is_none());
    }
}
