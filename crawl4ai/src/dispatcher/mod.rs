//! `arun_many`'s dispatcher (§4.4): semaphore-capped concurrency, URL↔config
//! matching, per-host rate limiting, memory-adaptive admission, proxy
//! rotation, and optional streaming.

mod memory;
mod rate_limit;
mod proxy;

pub use memory::MemoryMonitor;
pub use proxy::{ProxyRegistry, ProxyRotationStrategy};
pub use rate_limit::{host_key, RateLimiter};

use crate::config::RunConfig;
use crate::error::CrawlError;
use crate::result::CrawlResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;

/// Per-task bookkeeping attached to a `CrawlResult` when it ran through the
/// dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub task_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub memory_usage_mb: f64,
    pub peak_memory_mb: f64,
    pub error_message: Option<String>,
}

/// Dispatcher-wide settings, independent of any single `RunConfig`.
pub struct DispatcherOptions {
    pub memory_threshold_percent: f32,
    pub memory_check_interval: Duration,
    pub rate_limit_mean_delay_s: f64,
    pub rate_limit_max_range_s: f64,
    pub proxy_rotation_strategy: Option<ProxyRotationStrategy>,
    pub proxies: Vec<crate::config::ProxyConfig>,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            memory_threshold_percent: 100.0,
            memory_check_interval: Duration::from_secs(5),
            rate_limit_mean_delay_s: 0.0,
            rate_limit_max_range_s: 0.0,
            proxy_rotation_strategy: None,
            proxies: Vec::new(),
        }
    }
}

/// Given a URL and an ordered list of candidate configs, return the first
/// whose `url_matcher` matches (a config with no matcher is a catch-all).
pub fn select_config<'a>(url: &str, configs: &'a [RunConfig]) -> Option<&'a RunConfig> {
    configs.iter().find(|config| match &config.url_matcher {
        None => true,
        Some(matcher) => matcher.matches(url, config.match_mode),
    })
}

/// Drives one `arun` for a single URL. Implemented by the crawler so the
/// dispatcher stays decoupled from cache/fetch/pipeline wiring.
pub trait RunOne: Send + Sync {
    fn run_one(
        &self,
        url: String,
        config: RunConfig,
        proxy: Option<crate::config::ProxyConfig>,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<CrawlResult, CrawlError>> + Send>>;
}

pub struct Dispatcher {
    options: DispatcherOptions,
    memory_monitor: Arc<MemoryMonitor>,
    rate_limiter: Arc<RateLimiter>,
    proxy_registry: Arc<ProxyRegistry>,
}

impl Dispatcher {
    pub fn new(options: DispatcherOptions) -> Self {
        let memory_monitor = Arc::new(MemoryMonitor::new(
            options.memory_threshold_percent,
            options.memory_check_interval,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            options.rate_limit_mean_delay_s,
            options.rate_limit_max_range_s,
        ));
        let proxy_registry = Arc::new(ProxyRegistry::new(options.proxies.clone()));
        Self {
            options,
            memory_monitor,
            rate_limiter,
            proxy_registry,
        }
    }

    /// Run every URL in `urls` against `configs` (checked in order per URL),
    /// capped at `semaphore_count` concurrent tasks. Returns the collected
    /// results, in completion order (not input order).
    pub async fn run_many(
        &self,
        urls: Vec<String>,
        configs: Vec<RunConfig>,
        semaphore_count: usize,
        runner: Arc<dyn RunOne>,
    ) -> Vec<CrawlResult> {
        let (tx, rx) = mpsc::channel(urls.len().max(1));
        self.spawn_all(urls, configs, semaphore_count, runner, tx).await;
        let mut stream = ReceiverStream::new(rx);
        let mut out = Vec::new();
        use tokio_stream::StreamExt;
        while let Some(result) = stream.next().await {
            out.push(result);
        }
        out
    }

    /// Streaming variant: results are handed to the caller as they
    /// complete via the returned channel, rather than collected.
    pub async fn stream_many(
        &self,
        urls: Vec<String>,
        configs: Vec<RunConfig>,
        semaphore_count: usize,
        runner: Arc<dyn RunOne>,
    ) -> mpsc::Receiver<CrawlResult> {
        let (tx, rx) = mpsc::channel(urls.len().max(1));
        self.spawn_all(urls, configs, semaphore_count, runner, tx).await;
        rx
    }

    async fn spawn_all(
        &self,
        urls: Vec<String>,
        configs: Vec<RunConfig>,
        semaphore_count: usize,
        runner: Arc<dyn RunOne>,
        tx: mpsc::Sender<CrawlResult>,
    ) {
        self.memory_monitor.ensure_started().await;
        let semaphore = Arc::new(Semaphore::new(semaphore_count.max(1)));
        let configs = Arc::new(configs);
        let mut tasks = JoinSet::new();

        for url in urls {
            let config = match select_config(&url, &configs) {
                Some(c) => c.clone(),
                None => {
                    let _ = tx
                        .send(CrawlResult::failure(
                            &url,
                            CrawlError::NoMatchingConfig { url: url.clone() }.to_string(),
                        ))
                        .await;
                    continue;
                }
            };

            while self.memory_monitor.is_over_threshold() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let runner = runner.clone();
            let tx = tx.clone();
            let rate_limiter = self.rate_limiter.clone();
            let proxy_registry = self.proxy_registry.clone();
            let proxy_strategy = self.options.proxy_rotation_strategy;

            tasks.spawn(async move {
                let _permit = permit;
                let key = host_key(&url);
                rate_limiter.acquire(&key).await;

                let proxy = proxy_strategy.and_then(|strategy| proxy_registry.select(strategy));

                let task_id = uuid_like();
                let start_time = Utc::now();
                let outcome = runner.run_one(url.clone(), config, proxy.clone()).await;
                let end_time = Utc::now();

                let dispatch_result = DispatchResult {
                    task_id,
                    start_time,
                    end_time,
                    memory_usage_mb: 0.0,
                    peak_memory_mb: 0.0,
                    error_message: outcome.as_ref().err().map(|e| e.to_string()),
                };

                let mut result = match outcome {
                    Ok(mut result) => {
                        if let Some(proxy) = &proxy {
                            proxy_registry.record_success(proxy);
                        }
                        rate_limiter.reset_backoff(&key);
                        if result.status_code == Some(429) {
                            log::warn!("got 429 from {key}, backing off");
                            rate_limiter.backoff(&key);
                            if let (Some(proxy), Some(strategy)) = (&proxy, proxy_strategy) {
                                proxy_registry.record_failure(proxy, strategy);
                            }
                        }
                        result
                    }
                    Err(e) => {
                        if let (Some(proxy), Some(strategy)) = (&proxy, proxy_strategy) {
                            proxy_registry.record_failure(proxy, strategy);
                        }
                        CrawlResult::failure(&url, e.to_string())
                    }
                };
                result.dispatch_result = Some(dispatch_result);
                let _ = tx.send(result).await;
            });
        }

        tokio::spawn(async move {
            while tasks.join_next().await.is_some() {}
        });
    }
}

/// A dependency-free task id: good enough for dispatch bookkeeping without
/// pulling in a `uuid` crate the rest of the workspace never needed.
fn uuid_like() -> String {
    format!("{:016x}{:08x}", fastrand::u64(..), fastrand::u32(..))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchMode, UrlMatcher};

    #[test]
    fn select_config_picks_first_matching_in_order() {
        let configs = vec![
            RunConfig {
                url_matcher: Some(UrlMatcher::Glob("*.pdf".into())),
                ..Default::default()
            },
            RunConfig {
                url_matcher: None,
                ..Default::default()
            },
        ];
        assert!(select_config("https://x.test/doc.pdf", &configs).is_some());
        assert!(select_config("https://x.test/page.html", &configs).is_some());
    }

    #[test]
    fn select_config_routes_glob_predicate_and_catchall() {
        let configs = vec![
            RunConfig {
                url_matcher: Some(UrlMatcher::Glob("*.pdf".into())),
                ..Default::default()
            },
            RunConfig {
                url_matcher: Some(UrlMatcher::Glob("*/blog/*".into())),
                ..Default::default()
            },
            RunConfig {
                url_matcher: Some(UrlMatcher::predicate(|u| u.contains("api"))),
                ..Default::default()
            },
            RunConfig {
                url_matcher: None,
                ..Default::default()
            },
        ];
        assert!(std::ptr::eq(
            select_config("https://x.test/a.pdf", &configs).unwrap(),
            &configs[0]
        ));
        assert!(std::ptr::eq(
            select_config("https://x.test/a/blog/x", &configs).unwrap(),
            &configs[1]
        ));
        assert!(std::ptr::eq(
            select_config("https://x.test/a/api.json", &configs).unwrap(),
            &configs[2]
        ));
        assert!(std::ptr::eq(
            select_config("https://x.test/other", &configs).unwrap(),
            &configs[3]
        ));
    }

    #[test]
    fn select_config_none_when_no_match_and_no_catchall() {
        let configs = vec![RunConfig {
            url_matcher: Some(UrlMatcher::Glob("*.pdf".into())),
            ..Default::default()
        }];
        assert!(select_config("https://x.test/page.html", &configs).is_none());
    }

    struct EchoRunner;
    impl RunOne for EchoRunner {
        fn run_one(
            &self,
            url: String,
            _config: RunConfig,
            _proxy: Option<crate::config::ProxyConfig>,
        ) -> std::pin::Pin<Box<dyn Future<Output = Result<CrawlResult, CrawlError>> + Send>> {
            Box::pin(async move {
                let mut result = CrawlResult::failure(&url, "placeholder");
                result.success = true;
                result.error_message = None;
                Ok(result)
            })
        }
    }

    #[tokio::test]
    async fn run_many_collects_all_results() {
        let dispatcher = Dispatcher::new(DispatcherOptions::default());
        let urls = vec!["https://a.test".into(), "https://b.test".into()];
        let configs = vec![RunConfig::default()];
        let results = dispatcher.run_many(urls, configs, 2, Arc::new(EchoRunner)).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert!(results.iter().all(|r| r.dispatch_result.is_some()));
    }

    #[tokio::test]
    async fn unmatched_url_yields_no_matching_config_failure() {
        let dispatcher = Dispatcher::new(DispatcherOptions::default());
        let urls = vec!["https://a.test".into()];
        let configs = vec![RunConfig {
            url_matcher: Some(UrlMatcher::Glob("https://only.test/*".into())),
            ..Default::default()
        }];
        let results = dispatcher.run_many(urls, configs, 2, Arc::new(EchoRunner)).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error_message.is_some());
    }
}
