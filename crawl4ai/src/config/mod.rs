//! RunConfig and BrowserConfig: the two immutable configuration records that
//! drive a crawl.

mod browser;
mod run;

pub use browser::{BrowserConfig, ProxyConfig, UserAgentMode};
pub use run::{
    CacheMode, MatchMode, RunConfig, UrlMatcher, VirtualScrollAxis, VirtualScrollConfig,
    WaitFor, WaitUntil,
};
