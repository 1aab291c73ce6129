//! Cache layer (§4.5): mode-gated read/write over a content-addressable
//! fingerprint, with single-flight coalescing so concurrent identical
//! requests share one fetch.

mod key;
mod store;

pub use key::fingerprint;
pub use store::{KvStore, MokaStore, PutMetadata};

use crate::config::{CacheMode, RunConfig};
use crate::error::CrawlError;
use crate::result::CrawlResult;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;

fn should_read(mode: CacheMode) -> bool {
    matches!(mode, CacheMode::Enabled | CacheMode::ReadOnly)
}

fn should_write(mode: CacheMode) -> bool {
    matches!(mode, CacheMode::Enabled | CacheMode::Bypass | CacheMode::WriteOnly)
}

/// In-flight coalescing: the first caller for a key becomes the "leader"
/// and the rest subscribe to its broadcast.
enum InFlight {
    Leader,
    Follower(broadcast::Receiver<Result<Arc<CrawlResult>, String>>),
}

pub struct Cache {
    store: Arc<dyn KvStore>,
    in_flight: DashMap<String, broadcast::Sender<Result<Arc<CrawlResult>, String>>>,
}

impl Cache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            in_flight: DashMap::new(),
        }
    }

    /// Run `fetch_and_build` (the full fetch+pipeline flow for one URL)
    /// honoring `cache_mode`, with single-flight coalescing across
    /// concurrent callers sharing the same (URL, fingerprint).
    pub async fn get_or_run<F, Fut>(
        &self,
        url: &str,
        config: &RunConfig,
        fetch_and_build: F,
    ) -> Result<Arc<CrawlResult>, CrawlError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CrawlResult, CrawlError>>,
    {
        let key = key::fingerprint(url, config);

        if should_read(config.cache_mode) {
            if let Some(bytes) = self.store.get(&key).await {
                if let Ok(result) = serde_json::from_slice::<CrawlResult>(&bytes) {
                    log::debug!("cache hit for {url} (key {key})");
                    return Ok(Arc::new(result));
                }
            }
        }
        log::debug!("cache miss for {url} (key {key})");

        match self.claim(&key) {
            InFlight::Leader => {
                let outcome = fetch_and_build().await;
                let broadcast_result = match &outcome {
                    Ok(result) => Ok(Arc::new(result.clone())),
                    Err(e) => Err(e.to_string()),
                };
                if let Ok(result) = &broadcast_result {
                    if should_write(config.cache_mode) {
                        if let Ok(bytes) = serde_json::to_vec(result.as_ref()) {
                            self.store.put(&key, bytes, PutMetadata::new()).await;
                        }
                    }
                }
                self.release(&key, broadcast_result.clone());
                broadcast_result.map_err(CrawlError::Cache)
            }
            InFlight::Follower(mut rx) => match rx.recv().await {
                Ok(result) => result.map_err(CrawlError::Cache),
                Err(_) => Err(CrawlError::Cache("in-flight fetch leader dropped".to_string())),
            },
        }
    }

    fn claim(&self, key: &str) -> InFlight {
        if let Some(sender) = self.in_flight.get(key) {
            return InFlight::Follower(sender.subscribe());
        }
        let (tx, _rx) = broadcast::channel(1);
        // Re-check under the entry API to avoid a second leader racing in
        // between the read above and the insert.
        match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => InFlight::Follower(entry.get().subscribe()),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(tx);
                InFlight::Leader
            }
        }
    }

    fn release(&self, key: &str, result: Result<Arc<CrawlResult>, String>) {
        if let Some((_, sender)) = self.in_flight.remove(key) {
            let _ = sender.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_result(url: &str) -> CrawlResult {
        let mut result = CrawlResult::failure(url, "placeholder");
        result.success = true;
        result.error_message = None;
        result
    }

    #[tokio::test]
    async fn cache_hit_skips_second_fetch() {
        let cache = Cache::new(Arc::new(MokaStore::default()));
        let config = RunConfig::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |calls: Arc<AtomicUsize>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(sample_result("https://x.test"))
            }
        };

        cache
            .get_or_run("https://x.test", &config, || run(calls.clone()))
            .await
            .unwrap();
        cache
            .get_or_run("https://x.test", &config, || run(calls.clone()))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bypass_mode_never_reads_but_still_writes() {
        let cache = Cache::new(Arc::new(MokaStore::default()));
        let config = RunConfig {
            cache_mode: CacheMode::Bypass,
            ..Default::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let run = |calls: Arc<AtomicUsize>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(sample_result("https://x.test"))
            }
        };

        cache.get_or_run("https://x.test", &config, || run(calls.clone())).await.unwrap();
        cache.get_or_run("https://x.test", &config, || run(calls.clone())).await.unwrap();

        // BYPASS writes but never reads, so both calls re-fetch.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_mode_neither_reads_nor_writes() {
        let cache = Cache::new(Arc::new(MokaStore::default()));
        let config = RunConfig {
            cache_mode: CacheMode::Disabled,
            ..Default::default()
        };
        cache
            .get_or_run("https://x.test", &config, || async { Ok(sample_result("https://x.test")) })
            .await
            .unwrap();
        let key = key::fingerprint("https://x.test", &config);
        assert!(cache.store.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn concurrent_identical_requests_single_flight() {
        let cache = Arc::new(Cache::new(Arc::new(MokaStore::default())));
        let config = Arc::new(RunConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let config = config.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_run("https://x.test", &config, || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok(sample_result("https://x.test"))
                        }
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
