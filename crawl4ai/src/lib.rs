//! Concurrent web crawling and content extraction.
//!
//! A crawl goes through one pipeline regardless of how it's driven:
//! resolve the URL's scheme, check robots.txt, fetch (plain HTTP or a
//! real browser), clean and convert the page to Markdown, run an
//! extraction strategy, and cache the result. [`AsyncWebCrawler::arun`]
//! drives that pipeline for one URL; [`AsyncWebCrawler::arun_many`] fans
//! it out over a dispatcher-managed worker pool; [`AsyncWebCrawler::arun_deep`]
//! drives it repeatedly over a link frontier (BFS, DFS, or best-first).
//!
//! ```no_run
//! use crawl4ai::{AsyncWebCrawler, BrowserConfig, RunConfig};
//!
//! # async fn run() {
//! let crawler = AsyncWebCrawler::new(BrowserConfig::default());
//! let result = crawler.arun("https://example.com", &RunConfig::default()).await;
//! println!("{}", result.markdown.raw_markdown);
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod crawler;
pub mod deep_crawl;
pub mod dispatcher;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod result;
pub mod robots;
pub mod session;
pub mod url;

pub use config::{BrowserConfig, ProxyConfig, RunConfig};
pub use crawler::AsyncWebCrawler;
pub use dispatcher::{DispatcherOptions, RunOne};
pub use error::CrawlError;
pub use result::CrawlResult;
pub use url::UrlTarget;
