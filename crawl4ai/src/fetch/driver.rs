//! The external browser driver boundary. The core never talks to Chromium/
//! Playwright directly; it drives whatever implements [`BrowserDriver`] and
//! [`BrowserPage`].

use crate::config::{BrowserConfig, RunConfig};
use crate::error::CrawlError;
use async_trait::async_trait;

/// One navigable page/tab handle, created fresh per task or reused across
/// calls sharing a `session_id`.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to `url`, waiting for `wait_until`. Returns the HTTP status
    /// of the main document response, if the driver can observe it.
    async fn goto(&self, url: &str, wait_until: crate::config::WaitUntil) -> Result<Option<u16>, CrawlError>;

    /// Run a JS snippet in page scope and discard its result. Snippets in a
    /// `js_code` list run serially, in declaration order.
    async fn evaluate_js(&self, script: &str) -> Result<(), CrawlError>;

    /// Run a JS expression and return whether it evaluated truthy — the
    /// primitive behind `wait_for`'s `js:` form.
    async fn evaluate_js_bool(&self, expr: &str) -> Result<bool, CrawlError>;

    /// Whether a CSS selector currently matches at least one element — the
    /// primitive behind `wait_for`'s `css:` form.
    async fn matches_selector(&self, selector: &str) -> Result<bool, CrawlError>;

    /// Scroll a container by a pixel delta (resolved from
    /// `VirtualScrollAxis`/`scan_full_page` by the caller).
    async fn scroll_by(&self, selector: Option<&str>, delta_px: i64) -> Result<(), CrawlError>;

    /// Serialize the current DOM to an HTML string.
    async fn content(&self) -> Result<String, CrawlError>;

    /// The current `User-Agent` in effect for this page.
    async fn user_agent(&self) -> Result<String, CrawlError>;

    async fn screenshot_png_base64(&self) -> Result<String, CrawlError>;
    async fn pdf_bytes(&self) -> Result<Vec<u8>, CrawlError>;
    async fn mhtml(&self) -> Result<String, CrawlError>;
}

/// Launches/attaches to a browser and hands out [`BrowserPage`]s.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Acquire a fresh page under `config`, or reuse one if `session_id`
    /// resolves to an existing session-registry entry (the orchestrator
    /// handles the registry lookup; this is called only on a registry
    /// miss, or when no `session_id` was given).
    async fn new_page(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserPage>, CrawlError>;
}

/// Phase one of the interaction protocol: navigate, unless `js_only` skips
/// it. Split out from [`run_interaction`] so a caller that needs to fire a
/// hook between navigation and script injection (the orchestrator's
/// `on_execution_started`) has a seam to do it at.
pub async fn goto_if_needed(
    page: &dyn BrowserPage,
    url: &str,
    config: &RunConfig,
) -> Result<Option<u16>, CrawlError> {
    if config.js_only {
        return Ok(None);
    }
    page.goto(url, config.wait_until).await
}

/// Phase two: inject `js_code`, poll `wait_for`, handle scrolling, wait the
/// fixed post-condition delay. Runs after navigation and after the
/// orchestrator's `on_execution_started` hook has fired.
pub async fn run_post_navigation(page: &dyn BrowserPage, config: &RunConfig) -> Result<(), CrawlError> {
    for snippet in &config.js_code {
        page.evaluate_js(snippet).await?;
    }

    if let Some(wait_for) = &config.wait_for {
        poll_wait_for(page, wait_for, config.page_timeout_ms).await?;
    }

    if config.scan_full_page {
        page.scroll_by(None, i64::MAX).await?;
    }

    if let Some(vs) = &config.virtual_scroll_config {
        run_virtual_scroll(page, vs).await?;
    }

    if config.delay_before_return_html_s > 0.0 {
        tokio::time::sleep(std::time::Duration::from_secs_f64(
            config.delay_before_return_html_s,
        ))
        .await;
    }

    Ok(())
}

/// The full interaction protocol with no hook seam, for callers (like
/// `fetch_browser_with_content`) that don't navigate separately beforehand.
pub async fn run_interaction(
    page: &dyn BrowserPage,
    url: &str,
    config: &RunConfig,
) -> Result<(), CrawlError> {
    goto_if_needed(page, url, config).await?;
    run_post_navigation(page, config).await
}

const WAIT_POLL_INTERVAL_MS: u64 = 100;

async fn poll_wait_for(
    page: &dyn BrowserPage,
    wait_for: &crate::config::WaitFor,
    timeout_ms: u64,
) -> Result<(), CrawlError> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    loop {
        let satisfied = match wait_for {
            crate::config::WaitFor::Css(selector) => page.matches_selector(selector).await?,
            crate::config::WaitFor::Js(expr) => page.evaluate_js_bool(expr).await?,
        };
        if satisfied {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(CrawlError::WaitConditionTimeout {
                url: String::new(),
                condition: format!("{wait_for:?}"),
                elapsed_ms: timeout_ms,
            });
        }
        tokio::time::sleep(std::time::Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
    }
}

async fn run_virtual_scroll(
    page: &dyn BrowserPage,
    config: &crate::config::VirtualScrollConfig,
) -> Result<(), CrawlError> {
    use crate::config::VirtualScrollAxis;
    for _ in 0..config.scroll_count {
        let delta = match config.scroll_by {
            VirtualScrollAxis::ContainerHeight => i64::MAX,
            VirtualScrollAxis::PageHeight => i64::MAX,
            VirtualScrollAxis::Pixels(px) => px,
        };
        page.scroll_by(Some(&config.container_selector), delta).await?;
        if config.wait_after_scroll_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(config.wait_after_scroll_ms)).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakePage {
        scroll_calls: Arc<AtomicUsize>,
        ready_after: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserPage for FakePage {
        async fn goto(&self, _url: &str, _wait_until: crate::config::WaitUntil) -> Result<Option<u16>, CrawlError> {
            Ok(Some(200))
        }
        async fn evaluate_js(&self, _script: &str) -> Result<(), CrawlError> {
            Ok(())
        }
        async fn evaluate_js_bool(&self, _expr: &str) -> Result<bool, CrawlError> {
            Ok(true)
        }
        async fn matches_selector(&self, _selector: &str) -> Result<bool, CrawlError> {
            let n = self.ready_after.fetch_sub(1, Ordering::SeqCst);
            Ok(n <= 1)
        }
        async fn scroll_by(&self, _selector: Option<&str>, _delta_px: i64) -> Result<(), CrawlError> {
            self.scroll_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn content(&self) -> Result<String, CrawlError> {
            Ok(String::new())
        }
        async fn user_agent(&self) -> Result<String, CrawlError> {
            Ok("test-agent".to_string())
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

    #[tokio::test]
    async fn virtual_scroll_scroll_count_zero_never_scrolls() {
        let page = FakePage {
            scroll_calls: Arc::new(AtomicUsize::new(0)),
            ready_after: Arc::new(AtomicUsize::new(1)),
        };
        let config = RunConfig {
            virtual_scroll_config: Some(crate::config::VirtualScrollConfig {
                container_selector: "#feed".into(),
                scroll_count: 0,
                scroll_by: crate::config::VirtualScrollAxis::PageHeight,
                wait_after_scroll_ms: 0,
            }),
            ..Default::default()
        };
        run_interaction(&page, "https://x.test", &config).await.unwrap();
        assert_eq!(page.scroll_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn virtual_scroll_runs_scroll_count_times() {
        let page = FakePage {
            scroll_calls: Arc::new(AtomicUsize::new(0)),
            ready_after: Arc::new(AtomicUsize::new(1)),
        };
        let config = RunConfig {
            virtual_scroll_config: Some(crate::config::VirtualScrollConfig {
                container_selector: "#feed".into(),
                scroll_count: 3,
                scroll_by: crate::config::VirtualScrollAxis::Pixels(500),
                wait_after_scroll_ms: 0,
            }),
            ..Default::default()
        };
        run_interaction(&page, "https://x.test", &config).await.unwrap();
        assert_eq!(page.scroll_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wait_for_css_times_out() {
        let page = FakePage {
            scroll_calls: Arc::new(AtomicUsize::new(0)),
            ready_after: Arc::new(AtomicUsize::new(1_000_000)),
        };
        let config = RunConfig {
            wait_for: Some(crate::config::WaitFor::Css(".never".into())),
            page_timeout_ms: 50,
            ..Default::default()
        };
        let err = run_interaction(&page, "https://x.test", &config).await.unwrap_err();
        assert!(matches!(err, CrawlError::WaitConditionTimeout { .. }));
    }
}
