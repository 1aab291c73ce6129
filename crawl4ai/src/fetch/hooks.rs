//! The eight-point browser hook contract (§4.1). Hooks are disabled unless
//! a caller explicitly registers one — never wired up implicitly, per the
//! network-exposure security posture in §6.

use crate::error::CrawlError;
use async_trait::async_trait;

/// A stable string ID for each hook point, fired in this order within one
/// `arun`.
pub const HOOK_NAMES: [&str; 8] = [
    "on_browser_created",
    "on_page_context_created",
    "before_goto",
    "after_goto",
    "on_user_agent_updated",
    "on_execution_started",
    "before_retrieve_html",
    "before_return_html",
];

/// User-registered callbacks invoked at each named point. A hook that
/// returns `Err` aborts the crawl with `HookFailure`; the session page is
/// then closed by the orchestrator.
#[async_trait]
pub trait BrowserHooks: Send + Sync {
    async fn on_browser_created(&self) -> Result<(), CrawlError> {
        Ok(())
    }
    async fn on_page_context_created(&self) -> Result<(), CrawlError> {
        Ok(())
    }
    async fn before_goto(&self, _url: &str) -> Result<(), CrawlError> {
        Ok(())
    }
    async fn after_goto(&self, _url: &str, _status: Option<u16>) -> Result<(), CrawlError> {
        Ok(())
    }
    async fn on_user_agent_updated(&self, _user_agent: &str) -> Result<(), CrawlError> {
        Ok(())
    }
    async fn on_execution_started(&self) -> Result<(), CrawlError> {
        Ok(())
    }
    async fn before_retrieve_html(&self) -> Result<(), CrawlError> {
        Ok(())
    }
    async fn before_return_html(&self, _html: &str) -> Result<(), CrawlError> {
        Ok(())
    }
}

/// A no-op implementation used when no hooks are registered.
pub struct NoopHooks;

impl BrowserHooks for NoopHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    struct AbortingHooks;

    #[async_trait]
    impl BrowserHooks for AbortingHooks {
        async fn before_goto(&self, url: &str) -> Result<(), CrawlError> {
            Err(CrawlError::HookFailure {
                name: "before_goto".into(),
                reason: format!("refused to navigate to {url}"),
            })
        }
    }

    #[tokio::test]
    async fn hook_error_surfaces_as_hook_failure() {
        let hooks = AbortingHooks;
        let err = hooks.before_goto("https://x.test").await.unwrap_err();
        assert!(matches!(err, CrawlError::HookFailure { .. }));
    }

    #[tokio::test]
    async fn noop_hooks_never_fail() {
        let hooks = NoopHooks;
        assert!(hooks.on_browser_created().await.is_ok());
        assert!(hooks.before_return_html("<p></p>").await.is_ok());
    }
}
