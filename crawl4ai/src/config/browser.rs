use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which rendering engine the external browser driver should launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserType {
    Chromium,
    Firefox,
    Webkit,
}

impl Default for BrowserType {
    fn default() -> Self {
        BrowserType::Chromium
    }
}

/// How the browser driver should pick/rotate a `User-Agent` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAgentMode {
    /// Use `BrowserConfig.user_agent` verbatim.
    Static,
    /// Pick a plausible random desktop UA per session.
    Random,
}

impl Default for UserAgentMode {
    fn default() -> Self {
        UserAgentMode::Static
    }
}

/// An upstream proxy, shared between `BrowserConfig` and the dispatcher's
/// rotation pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Per-session, immutable browser/HTTP-client configuration shared by every
/// crawl that runs under the same `AsyncWebCrawler` instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Which engine the external browser driver launches.
    pub browser_type: BrowserType,
    /// Run without a visible window.
    pub headless: bool,
    /// Initial viewport width in CSS pixels.
    pub viewport_width: u32,
    /// Initial viewport height in CSS pixels.
    pub viewport_height: u32,
    /// Upstream proxy for both the HTTP and browser fetch strategies.
    pub proxy_config: Option<ProxyConfig>,
    /// `User-Agent` header/property sent with every request.
    pub user_agent: Option<String>,
    /// How `user_agent` is applied.
    pub user_agent_mode: UserAgentMode,
    /// Cookies seeded into every new session, `name` -> `value`.
    pub cookies: HashMap<String, String>,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
    /// Raw extra command-line flags passed through to the external browser
    /// driver (e.g. `--disable-gpu`). Opaque to the core.
    pub extra_args: Vec<String>,
    /// Skip TLS certificate validation. Dangerous; off by default.
    pub ignore_https_errors: bool,
    /// Execute page JavaScript. `false` makes the browser strategy behave
    /// close to a static HTML fetch.
    pub java_script_enabled: bool,
    /// Disable image loading to save bandwidth/memory.
    pub text_mode: bool,
    /// Disable background throttling/animations for lower resource use.
    pub light_mode: bool,
    /// Reuse a persistent on-disk browser profile instead of an ephemeral
    /// context.
    pub use_persistent_context: bool,
    /// Profile directory backing `use_persistent_context`.
    pub user_data_dir: Option<String>,
    /// Ask the external browser driver to apply anti-detection patches.
    pub enable_stealth: bool,
    /// Allow the page to trigger file downloads.
    pub accept_downloads: bool,
    /// Where accepted downloads are written.
    pub downloads_path: Option<String>,
    /// Opaque serialized storage state (cookies + localStorage) to seed a
    /// new context from, or to persist one into.
    pub storage_state: Option<String>,
    /// Connect to an already-running browser over this CDP endpoint instead
    /// of launching a new one.
    pub cdp_url: Option<String>,
    /// Tear down the CDP connection (not the remote browser) when the
    /// crawler is dropped.
    pub cdp_cleanup_on_close: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser_type: BrowserType::default(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            proxy_config: None,
            user_agent: None,
            user_agent_mode: UserAgentMode::default(),
            cookies: HashMap::new(),
            headers: HashMap::new(),
            extra_args: Vec::new(),
            ignore_https_errors: false,
            java_script_enabled: true,
            text_mode: false,
            light_mode: false,
            use_persistent_context: false,
            user_data_dir: None,
            enable_stealth: false,
            accept_downloads: false,
            downloads_path: None,
            storage_state: None,
            cdp_url: None,
            cdp_cleanup_on_close: true,
        }
    }
}
