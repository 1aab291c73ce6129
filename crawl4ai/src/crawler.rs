//! `AsyncWebCrawler`: the single entry point wiring robots compliance,
//! cache, fetch orchestrator, and content pipeline into `arun`/`arun_many`/
//! `arun_deep` (§2's data-flow, §4.1–4.7).

use crate::cache::{Cache, KvStore, MokaStore};
use crate::config::{BrowserConfig, RunConfig};
use crate::deep_crawl::{DeepCrawlSnapshot, OnStateChange};
use crate::dispatcher::{Dispatcher, DispatcherOptions, RunOne};
use crate::error::CrawlError;
use crate::fetch::{BrowserDriver, BrowserHooks, FetchOrchestrator};
use crate::pipeline;
use crate::result::CrawlResult;
use crate::robots::RobotsChecker;
use crate::session::SessionRegistry;
use crate::url::UrlTarget;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFAULT_USER_AGENT: &str = "crawl4ai-rs";

/// Owns everything shared across every `arun` issued against one
/// `BrowserConfig`: the browser driver/session registry (via
/// `FetchOrchestrator`), the cache, and the robots.txt checker.
pub struct AsyncWebCrawler {
    orchestrator: FetchOrchestrator,
    cache: Cache,
    robots: RobotsChecker,
    http_client: reqwest::Client,
}

impl AsyncWebCrawler {
    pub fn new(browser_config: BrowserConfig) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        Self {
            orchestrator: FetchOrchestrator::new(browser_config, sessions),
            cache: Cache::new(Arc::new(MokaStore::default())),
            robots: RobotsChecker::new(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_driver(mut self, driver: Arc<dyn BrowserDriver>) -> Self {
        self.orchestrator = self.orchestrator.with_driver(driver);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn BrowserHooks>) -> Self {
        self.orchestrator = self.orchestrator.with_hooks(hooks);
        self
    }

    pub fn with_cache_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.cache = Cache::new(store);
        self
    }

    /// Crawl one URL. Never returns an `Err`: every expected failure is
    /// reported as `CrawlResult { success: false, error_message: Some(_) }`
    /// so that `arun_many` can aggregate partial successes (§7).
    pub async fn arun(&self, url: &str, config: &RunConfig) -> CrawlResult {
        self.run_single(url, config).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(url = %url)))]
    async fn run_single(&self, url: &str, config: &RunConfig) -> CrawlResult {
        let target = match UrlTarget::parse(url) {
            Ok(target) => target,
            Err(e) => return CrawlResult::failure(url, e.to_string()),
        };

        if config.check_robots_txt {
            if let UrlTarget::Http { url: http_url } = &target {
                let user_agent = self
                    .orchestrator
                    .browser_config
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
                if !self.robots.is_allowed(&self.http_client, http_url, &user_agent).await {
                    let err = CrawlError::RobotsDisallowed {
                        url: url.to_string(),
                        user_agent,
                    };
                    log::info!("robots.txt disallows {url}, skipping");
                    return CrawlResult::failure(url, err.to_string());
                }
            }
        }

        let outcome = self
            .cache
            .get_or_run(url, config, || self.fetch_and_build(url, config))
            .await;

        match outcome {
            Ok(result) => (*result).clone(),
            Err(e) => CrawlResult::failure(url, e.to_string()),
        }
    }

    async fn fetch_and_build(&self, url: &str, config: &RunConfig) -> Result<CrawlResult, CrawlError> {
        let fetch_outcome = self.orchestrator.fetch(url, config).await?;
        let pipeline_output = pipeline::run(&fetch_outcome.html, url, config).await?;

        Ok(CrawlResult {
            url: url.to_string(),
            success: true,
            status_code: fetch_outcome.status_code,
            error_message: None,
            session_id: config.session_id.clone(),
            response_headers: fetch_outcome.response_headers,
            ssl_certificate: None,
            html: fetch_outcome.html,
            cleaned_html: pipeline_output.cleaned_html,
            fit_html: pipeline_output.fit_html,
            markdown: pipeline_output.markdown,
            media: pipeline_output.media,
            links: pipeline_output.links,
            tables: pipeline_output.tables,
            extracted_content: pipeline_output.extracted_content,
            metadata: pipeline_output.metadata,
            downloaded_files: Vec::new(),
            screenshot: fetch_outcome.screenshot,
            pdf: fetch_outcome.pdf,
            mhtml: fetch_outcome.mhtml,
            network_requests: Vec::new(),
            console_messages: Vec::new(),
            dispatch_result: None,
            redirected_url: fetch_outcome.redirected_url,
        })
    }

    /// Run a deep crawl from `start_url` using `config.deep_crawl_strategy`.
    /// Requires an owning `Arc` since the strategy dispatches back into
    /// `arun` for every discovered URL from its own spawned future.
    pub async fn arun_deep(
        self: Arc<Self>,
        start_url: &str,
        config: RunConfig,
        resume_state: Option<DeepCrawlSnapshot>,
        on_state_change: Option<OnStateChange>,
    ) -> Result<Vec<CrawlResult>, CrawlError> {
        let strategy = config.deep_crawl_strategy.clone().ok_or_else(|| {
            CrawlError::NoMatchingConfig {
                url: start_url.to_string(),
            }
        })?;
        let runner: Arc<dyn RunOne> = Arc::new(CrawlerRunner(self.clone()));
        strategy
            .run(start_url.to_string(), config, runner, resume_state, on_state_change)
            .await
    }

    /// Crawl many URLs under the dispatcher (§4.4), collecting results
    /// after every task finishes.
    pub async fn arun_many(
        self: Arc<Self>,
        urls: Vec<String>,
        configs: Vec<RunConfig>,
        options: DispatcherOptions,
    ) -> Vec<CrawlResult> {
        let semaphore_count = configs.first().map(|c| c.semaphore_count).unwrap_or_else(num_cpus::get);
        let runner: Arc<dyn RunOne> = Arc::new(CrawlerRunner(self.clone()));
        Dispatcher::new(options)
            .run_many(urls, configs, semaphore_count, runner)
            .await
    }

    /// Streaming variant of `arun_many`: results arrive on the returned
    /// channel as they complete, in no guaranteed order.
    pub async fn arun_many_stream(
        self: Arc<Self>,
        urls: Vec<String>,
        configs: Vec<RunConfig>,
        options: DispatcherOptions,
    ) -> mpsc::Receiver<CrawlResult> {
        let semaphore_count = configs.first().map(|c| c.semaphore_count).unwrap_or_else(num_cpus::get);
        let runner: Arc<dyn RunOne> = Arc::new(CrawlerRunner(self.clone()));
        Dispatcher::new(options)
            .stream_many(urls, configs, semaphore_count, runner)
            .await
    }
}

/// Adapts `AsyncWebCrawler::arun` to the dispatcher's `RunOne` boundary,
/// keeping the crawler alive for the duration of each spawned task via its
/// own `Arc` clone.
struct CrawlerRunner(Arc<AsyncWebCrawler>);

impl RunOne for CrawlerRunner {
    fn run_one(
        &self,
        url: String,
        config: RunConfig,
        _proxy: Option<crate::config::ProxyConfig>,
    ) -> Pin<Box<dyn Future<Output = Result<CrawlResult, CrawlError>> + Send>> {
        let crawler = self.0.clone();
        Box::pin(async move { Ok(crawler.run_single(&url, &config).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raw_html_crawl_succeeds_without_a_driver() {
        let crawler = AsyncWebCrawler::new(BrowserConfig::default());
        let result = crawler
            .arun(
                "raw:<html><body><p>Hello crawl4ai</p></body></html>",
                &RunConfig::default(),
            )
            .await;
        assert!(result.success);
        assert!(result.markdown.raw_markdown.contains("Hello crawl4ai"));
    }

    #[tokio::test]
    async fn invalid_scheme_fails_without_panicking() {
        let crawler = AsyncWebCrawler::new(BrowserConfig::default());
        let result = crawler.arun("ftp://x.test/file", &RunConfig::default()).await;
        assert!(!result.success);
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn arun_many_collects_every_url() {
        let crawler = Arc::new(AsyncWebCrawler::new(BrowserConfig::default()));
        let urls = vec![
            "raw:<p>one</p>".to_string(),
            "raw:<p>two</p>".to_string(),
        ];
        let results = crawler
            .arun_many(urls, vec![RunConfig::default()], DispatcherOptions::default())
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn arun_deep_without_strategy_fails() {
        let crawler = Arc::new(AsyncWebCrawler::new(BrowserConfig::default()));
        let err = crawler
            .arun_deep("raw:<p>x</p>", RunConfig::default(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::NoMatchingConfig { .. }));
    }
}
