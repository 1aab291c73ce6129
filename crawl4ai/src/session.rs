//! Session registry (§4.6): long-lived browser pages keyed by session id,
//! reused across `arun` calls that share one.

use crate::fetch::BrowserPage;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

struct SessionEntry {
    page: Arc<dyn BrowserPage>,
    created_at: u64,
    last_used_at: std::sync::atomic::AtomicU64,
    tags: Vec<String>,
}

/// Keyed by opaque `session_id` string.
pub struct SessionRegistry {
    entries: DashMap<String, SessionEntry>,
    /// Per-session serialization locks, tracked independently of `entries`
    /// so a lock is obtainable before the first page for a `session_id` has
    /// even been created — the race that matters is between the first two
    /// concurrent `arun`s sharing a brand-new `session_id`, not just later
    /// ones against an already-populated entry.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Look up an existing session page, bumping `last_used_at`.
    pub fn get(&self, session_id: &str) -> Option<Arc<dyn BrowserPage>> {
        let entry = self.entries.get(session_id)?;
        entry
            .last_used_at
            .store(now_secs(), std::sync::atomic::Ordering::Relaxed);
        Some(entry.page.clone())
    }

    /// Acquire the per-session serialization lock, creating it if this is
    /// the first reference to `session_id`. A caller must hold this for the
    /// duration of any `arun` against a shared `session_id` — a session's
    /// page is logically single-threaded (§4.6).
    pub fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn insert(&self, session_id: String, page: Arc<dyn BrowserPage>) {
        let now = now_secs();
        self.entries.insert(
            session_id,
            SessionEntry {
                page,
                created_at: now,
                last_used_at: std::sync::atomic::AtomicU64::new(now),
                tags: Vec::new(),
            },
        );
    }

    pub fn tag(&self, session_id: &str, tag: impl Into<String>) {
        if let Some(mut entry) = self.entries.get_mut(session_id) {
            entry.tags.push(tag.into());
        }
    }

    /// Close and evict a session. The actual page/context teardown is the
    /// driver's concern; the registry just stops tracking it.
    pub fn kill_session(&self, session_id: &str) -> bool {
        self.locks.remove(session_id);
        self.entries.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict sessions idle longer than `ttl_secs`. Core only exposes the
    /// mechanism; the external runtime decides when/whether to call it.
    pub fn sweep_idle(&self, ttl_secs: u64) -> Vec<String> {
        let cutoff = now_secs().saturating_sub(ttl_secs);
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.last_used_at.load(std::sync::atomic::Ordering::Relaxed) < cutoff)
            .map(|entry| entry.key().clone())
            .collect();
        for key in &stale {
            self.entries.remove(key);
            self.locks.remove(key);
        }
        stale
    }

    #[allow(dead_code)]
    fn created_at(&self, session_id: &str) -> Option<u64> {
        self.entries.get(session_id).map(|e| e.created_at)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
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
    use crate::error::CrawlError;
    use async_trait::async_trait;

    struct FakePage;

    #[async_trait]
    impl BrowserPage for FakePage {
        async fn goto(&self, _url: &str, _wait_until: crate::config::WaitUntil) -> Result<Option<u16>, CrawlError> {
            Ok(None)
        }
        async fn evaluate_js(&self, _script: &str) -> Result<(), CrawlError> {
            Ok(())
        }
        async fn evaluate_js_bool(&self, _expr: &str) -> Result<bool, CrawlError> {
            Ok(true)
        }
        async fn matches_selector(&self, _selector: &str) -> Result<bool, CrawlError> {
            Ok(true)
        }
        async fn scroll_by(&self, _selector: Option<&str>, _delta_px: i64) -> Result<(), CrawlError> {
            Ok(())
        }
        async fn content(&self) -> Result<String, CrawlError> {
            Ok(String::new())
        }
        async fn user_agent(&self) -> Result<String, CrawlError> {
            Ok(String::new())
        }
        async fn screenshot_png_base64(&self) -> Result<String, CrawlError> {
            Ok(String::new())
        }
        async fn pdf_bytes(&self) -> Result<Vec<u8>, CrawlError> {
            Ok(Vec::new())
        }
        async fn mhtml(&self) -> Result<String, CrawlError> {
            Ok(String::new())
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let registry = SessionRegistry::new();
        let page: Arc<dyn BrowserPage> = Arc::new(FakePage);
        registry.insert("s1".into(), page);
        assert!(registry.get("s1").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn kill_session_evicts() {
        let registry = SessionRegistry::new();
        let page: Arc<dyn BrowserPage> = Arc::new(FakePage);
        registry.insert("s1".into(), page);
        assert!(registry.kill_session("s1"));
        assert!(registry.get("s1").is_none());
        assert!(!registry.kill_session("s1"));
    }

    #[test]
    fn lock_for_is_available_before_any_insert() {
        let registry = SessionRegistry::new();
        assert!(registry.lock_for("brand-new").try_lock().is_ok());
    }

    #[test]
    fn lock_for_returns_the_same_lock_across_calls() {
        let registry = SessionRegistry::new();
        let first = registry.lock_for("s1");
        let _guard = first.try_lock().unwrap();
        let second = registry.lock_for("s1");
        assert!(second.try_lock().is_err());
    }

    #[tokio::test]
    async fn kill_session_releases_the_lock_slot() {
        let registry = SessionRegistry::new();
        let _ = registry.lock_for("s1");
        registry.kill_session("s1");
        assert!(registry.lock_for("s1").try_lock().is_ok());
    }

    #[test]
    fn miss_returns_none() {
        let registry = SessionRegistry::new();
        assert!(registry.get("missing").is_none());
    }
}
