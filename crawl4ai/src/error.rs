//! Error taxonomy for a single crawl.

use thiserror::Error;

pub type Result<T, E = CrawlError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("navigation to {url} timed out after {elapsed_ms}ms")]
    NavigationTimeout { url: String, elapsed_ms: u64 },

    #[error("wait condition `{condition}` on {url} timed out after {elapsed_ms}ms")]
    WaitConditionTimeout {
        url: String,
        condition: String,
        elapsed_ms: u64,
    },

    #[error("{url} returned HTTP {status}")]
    HttpError { url: String, status: u16 },

    #[error("network error fetching {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("hook `{name}` failed: {reason}")]
    HookFailure { name: String, reason: String },

    #[error("extraction failed: {0}")]
    Extraction(#[from] crawl4ai_extract::ExtractionError),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("rate limited on host {host}, retry after {retry_after_ms}ms")]
    RateLimited { host: String, retry_after_ms: u64 },

    #[error("proxy {proxy} failed health checks and was taken out of rotation")]
    ProxyUnhealthy { proxy: String },

    #[error("{url} disallowed by robots.txt for agent `{user_agent}`")]
    RobotsDisallowed { url: String, user_agent: String },

    #[error("no dispatcher config matched {url}")]
    NoMatchingConfig { url: String },

    #[error("unsupported URL scheme `{scheme}` in {url}")]
    InvalidScheme { url: String, scheme: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("run was cancelled")]
    Cancelled,
}

impl CrawlError {
    /// True for errors where retrying the same URL later has a reasonable
    /// chance of succeeding (as opposed to a permanent 4xx, a bad scheme, or
    /// a robots.txt disallow).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrawlError::NavigationTimeout { .. }
                | CrawlError::WaitConditionTimeout { .. }
                | CrawlError::NetworkError { .. }
                | CrawlError::RateLimited { .. }
                | CrawlError::ProxyUnhealthy { .. }
        ) || matches!(self, CrawlError::HttpError { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let server = CrawlError::HttpError {
            url: "https://x.test".into(),
            status: 503,
        };
        let client = CrawlError::HttpError {
            url: "https://x.test".into(),
            status: 404,
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn robots_disallowed_is_not_retryable() {
        let err = CrawlError::RobotsDisallowed {
            url: "https://x.test".into(),
            user_agent: "crawl4ai".into(),
        };
        assert!(!err.is_retryable());
    }
}
