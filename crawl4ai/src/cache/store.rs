//! The persistent KV store boundary (§4.5). The concrete store is an
//! external collaborator; the core only needs `get`/`put`.

use async_trait::async_trait;

/// Arbitrary store-side metadata attached on write (TTL hints, lastmod,
/// etc.) — opaque to the core.
pub type PutMetadata = std::collections::HashMap<String, String>;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, value: Vec<u8>, metadata: PutMetadata);
}

/// An in-memory default store backed by `moka`, suitable for a single
/// process or as a test double; production deployments swap in a real KV
/// store.
pub struct MokaStore {
    cache: moka::future::Cache<String, Vec<u8>>,
}

impl MokaStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: moka::future::Cache::new(max_capacity),
        }
    }
}

impl Default for MokaStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl KvStore for MokaStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, _metadata: PutMetadata) {
        self.cache.insert(key.to_string(), value).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MokaStore::default();
        store.put("k", b"v".to_vec(), PutMetadata::new()).await;
        assert_eq!(store.get("k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let store = MokaStore::default();
        assert_eq!(store.get("missing").await, None);
    }
}
