//! The fetch orchestrator: given a URL handle and a RunConfig, return raw
//! HTML plus auxiliary capture data, routing to the browser or HTTP
//! strategy as §4.1 dictates.

pub mod driver;
pub mod hooks;
mod http;

pub use driver::{BrowserDriver, BrowserPage};
pub use hooks::{BrowserHooks, NoopHooks, HOOK_NAMES};

use crate::config::{BrowserConfig, RunConfig};
use crate::error::CrawlError;
use crate::session::SessionRegistry;
use crate::url::UrlTarget;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What the orchestrator hands the content pipeline, independent of which
/// strategy produced it.
pub struct FetchOutcome {
    pub html: String,
    pub status_code: Option<u16>,
    pub response_headers: HashMap<String, String>,
    pub redirected_url: Option<String>,
    pub screenshot: Option<String>,
    pub pdf: Option<Vec<u8>>,
    pub mhtml: Option<String>,
}

/// Binds a browser driver, session registry, and hook set together across
/// every `arun` issued through one `AsyncWebCrawler`.
pub struct FetchOrchestrator {
    pub browser_config: BrowserConfig,
    pub driver: Option<Arc<dyn BrowserDriver>>,
    pub sessions: Arc<SessionRegistry>,
    pub hooks: Arc<dyn BrowserHooks>,
}

impl FetchOrchestrator {
    pub fn new(browser_config: BrowserConfig, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            browser_config,
            driver: None,
            sessions,
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn with_driver(mut self, driver: Arc<dyn BrowserDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn BrowserHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Fetch `url_str` under `config`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(url = %url_str)))]
    pub async fn fetch(&self, url_str: &str, config: &RunConfig) -> Result<FetchOutcome, CrawlError> {
        let target = UrlTarget::parse(url_str)?;

        match target {
            UrlTarget::Raw { html } => {
                if config.process_in_browser || config.requires_browser() {
                    return self.fetch_browser_with_content(&html, config).await;
                }
                Ok(FetchOutcome {
                    html,
                    status_code: None,
                    response_headers: HashMap::new(),
                    redirected_url: None,
                    screenshot: None,
                    pdf: None,
                    mhtml: None,
                })
            }
            UrlTarget::File { path } => {
                let html = tokio::fs::read_to_string(&path).await?;
                if config.process_in_browser || config.requires_browser() {
                    return self.fetch_browser_with_content(&html, config).await;
                }
                Ok(FetchOutcome {
                    html,
                    status_code: None,
                    response_headers: HashMap::new(),
                    redirected_url: None,
                    screenshot: None,
                    pdf: None,
                    mhtml: None,
                })
            }
            UrlTarget::Cdp { .. } => self.fetch_browser(url_str, config).await,
            UrlTarget::Http { url } => {
                if config.requires_browser() {
                    self.fetch_browser(&url, config).await
                } else {
                    self.fetch_http(&url, config).await
                }
            }
        }
    }

    async fn fetch_http(&self, url: &str, config: &RunConfig) -> Result<FetchOutcome, CrawlError> {
        let timeout = Duration::from_millis(config.page_timeout_ms);
        let outcome = http::fetch(url, &self.browser_config, timeout).await?;
        Ok(FetchOutcome {
            html: outcome.html,
            status_code: Some(outcome.status_code),
            response_headers: outcome.response_headers,
            redirected_url: outcome.redirected_url,
            screenshot: None,
            pdf: None,
            mhtml: None,
        })
    }

    async fn fetch_browser(&self, url: &str, config: &RunConfig) -> Result<FetchOutcome, CrawlError> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| CrawlError::HookFailure {
                name: "browser_driver".into(),
                reason: "no BrowserDriver configured for a browser-requiring RunConfig".into(),
            })?;

        self.hooks.on_browser_created().await?;

        // A session's page must be driven by one `arun` at a time (§4.6):
        // hold its lock across the whole goto/js_code/wait_for/retrieve
        // sequence below, not just the get-or-create above.
        let session_guard = match &config.session_id {
            Some(session_id) => Some(self.sessions.lock_for(session_id).lock_owned().await),
            None => None,
        };

        let page = match &config.session_id {
            Some(session_id) => match self.sessions.get(session_id) {
                Some(existing) => existing,
                None => {
                    let page = driver.new_page(&self.browser_config).await?;
                    let page: Arc<dyn BrowserPage> = Arc::from(page);
                    self.sessions.insert(session_id.clone(), page.clone());
                    page
                }
            },
            None => {
                let page = driver.new_page(&self.browser_config).await?;
                Arc::from(page)
            }
        };

        self.hooks.on_page_context_created().await?;
        self.hooks.before_goto(url).await?;

        let status = driver::goto_if_needed(page.as_ref(), url, config).await?;
        if !config.js_only {
            self.hooks.after_goto(url, status).await?;
        }

        let ua = page.user_agent().await?;
        self.hooks.on_user_agent_updated(&ua).await?;

        // Fires right before js_code injection begins, per the hook
        // contract, rather than after the whole interaction completes.
        self.hooks.on_execution_started().await?;
        driver::run_post_navigation(page.as_ref(), config).await?;

        self.hooks.before_retrieve_html().await?;
        let html = page.content().await?;
        self.hooks.before_return_html(&html).await?;

        let screenshot = if config.screenshot {
            Some(page.screenshot_png_base64().await?)
        } else {
            None
        };
        let pdf = if config.pdf {
            Some(page.pdf_bytes().await?)
        } else {
            None
        };
        let mhtml = if config.capture_mhtml {
            Some(page.mhtml().await?)
        } else {
            None
        };

        drop(session_guard);

        Ok(FetchOutcome {
            html,
            status_code: Some(200),
            response_headers: HashMap::new(),
            redirected_url: None,
            screenshot,
            pdf,
            mhtml,
        })
    }

    /// `raw:`/`file:` input routed into the browser via `set_content`
    /// rather than `goto`, when browser-only features are requested.
    async fn fetch_browser_with_content(
        &self,
        html: &str,
        config: &RunConfig,
    ) -> Result<FetchOutcome, CrawlError> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| CrawlError::HookFailure {
                name: "browser_driver".into(),
                reason: "no BrowserDriver configured for a browser-requiring RunConfig".into(),
            })?;
        let page = driver.new_page(&self.browser_config).await?;
        let page: Arc<dyn BrowserPage> = Arc::from(page);

        // There's no navigable URL for `set_content`; JS/wait_for still
        // apply against whatever DOM the driver materializes from `html`.
        driver::run_interaction(page.as_ref(), "about:blank", config).await?;
        let rendered = page.content().await?;
        let final_html = if rendered.is_empty() { html.to_string() } else { rendered };

        Ok(FetchOutcome {
            html: final_html,
            status_code: None,
            response_headers: HashMap::new(),
            redirected_url: None,
            screenshot: None,
            pdf: None,
            mhtml: None,
        })
    }
}
