use crate::config::ProxyConfig;
use crawl4ai_extract::ExtractionStrategy;
use crawl4ai_transformations::MarkdownGenerator;
use serde::{Deserialize, Serialize};

/// Cache read/write policy for a single `arun`. See the cache layer for the
/// mode → {read, write} truth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheMode {
    Enabled,
    Disabled,
    Bypass,
    ReadOnly,
    WriteOnly,
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Enabled
    }
}

/// Page-load completeness the browser strategy waits for before proceeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl Default for WaitUntil {
    fn default() -> Self {
        WaitUntil::DomContentLoaded
    }
}

/// The wait-for expression language: `css:<selector>` or `js:<expr>`; an
/// unprefixed string is treated as `css:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitFor {
    Css(String),
    Js(String),
}

impl WaitFor {
    pub fn parse(expr: &str) -> Self {
        if let Some(sel) = expr.strip_prefix("css:") {
            WaitFor::Css(sel.to_string())
        } else if let Some(js) = expr.strip_prefix("js:") {
            WaitFor::Js(js.to_string())
        } else {
            WaitFor::Css(expr.to_string())
        }
    }
}

/// Which direction/unit a virtual-scroll step moves the container by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VirtualScrollAxis {
    ContainerHeight,
    PageHeight,
    Pixels(i64),
}

/// Drives the virtual-scroll protocol (§4.1): locate `container_selector`,
/// scroll `scroll_count` times by `scroll_by`, union all observed children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualScrollConfig {
    pub container_selector: String,
    pub scroll_count: u32,
    pub scroll_by: VirtualScrollAxis,
    pub wait_after_scroll_ms: u64,
}

/// A single matcher or a combinator list used to route a URL to a RunConfig
/// in `arun_many`'s config-list mode. Carries an arbitrary predicate
/// closure, so (unlike the rest of `RunConfig`'s fields) it isn't
/// `serde`-serializable.
#[derive(Clone)]
pub enum UrlMatcher {
    /// A `*`/`?` glob matched against the whole URL string.
    Glob(String),
    /// A list of matchers combined by the enclosing `RunConfig`'s
    /// `match_mode`.
    List(Vec<UrlMatcher>),
    /// An arbitrary `fn(&str) -> bool` predicate, for routing logic a glob
    /// can't express (e.g. `"api" in u`).
    Predicate(std::sync::Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl UrlMatcher {
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        UrlMatcher::Predicate(std::sync::Arc::new(f))
    }

    pub fn matches(&self, url: &str, mode: MatchMode) -> bool {
        match self {
            UrlMatcher::Glob(pattern) => glob_match(pattern, url),
            UrlMatcher::List(matchers) => match mode {
                MatchMode::Or => matchers.iter().any(|m| m.matches(url, mode)),
                MatchMode::And => matchers.iter().all(|m| m.matches(url, mode)),
            },
            UrlMatcher::Predicate(f) => f(url),
        }
    }
}

impl std::fmt::Debug for UrlMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlMatcher::Glob(pattern) => f.debug_tuple("Glob").field(pattern).finish(),
            UrlMatcher::List(matchers) => f.debug_tuple("List").field(matchers).finish(),
            UrlMatcher::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// How a `UrlMatcher::List` combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Or,
    And,
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Or
    }
}

/// Minimal `*`/`?` glob matcher so the dispatcher doesn't need a regex
/// compile per candidate config on every URL.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn rec(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                (0..=t.len()).any(|i| rec(&p[1..], &t[i..]))
            }
            (Some(b'?'), Some(_)) => rec(&p[1..], &t[1..]),
            (Some(pc), Some(tc)) if pc == tc => rec(&p[1..], &t[1..]),
            _ => false,
        }
    }
    rec(pattern.as_bytes(), text.as_bytes())
}

/// Per-crawl, immutable configuration. Construct with [`RunConfig::default`]
/// and [`RunConfig::clone_with`] to patch a subset of fields.
#[derive(Clone)]
pub struct RunConfig {
    // Identity/base
    pub base_url: Option<String>,
    pub session_id: Option<String>,

    // Cache
    pub cache_mode: CacheMode,

    // Selection
    pub css_selector: Option<String>,
    pub target_elements: Vec<String>,
    pub excluded_tags: Vec<String>,
    pub excluded_selector: Option<String>,
    pub keep_data_attributes: bool,
    pub remove_forms: bool,
    pub only_text: bool,

    // Link/media filtering
    pub exclude_external_links: bool,
    pub exclude_social_media_links: bool,
    pub exclude_domains: Vec<String>,
    pub exclude_external_images: bool,
    pub exclude_all_images: bool,
    pub preserve_https_for_internal_links: bool,
    pub image_score_threshold: i32,
    pub image_description_min_word_threshold: usize,

    // Interaction
    pub js_code: Vec<String>,
    pub js_only: bool,
    pub wait_for: Option<WaitFor>,
    pub wait_until: WaitUntil,
    pub page_timeout_ms: u64,
    pub delay_before_return_html_s: f64,
    pub scan_full_page: bool,
    pub scroll_delay_s: f64,
    pub process_iframes: bool,
    pub remove_overlay_elements: bool,
    pub simulate_user: bool,
    pub magic: bool,
    pub virtual_scroll_config: Option<VirtualScrollConfig>,
    pub init_scripts: Vec<String>,

    // Media capture
    pub screenshot: bool,
    pub pdf: bool,
    pub capture_mhtml: bool,
    pub screenshot_wait_for_s: f64,

    // Observability
    pub capture_network_requests: bool,
    pub capture_console_messages: bool,
    pub verbose: bool,

    // Extraction/markdown
    pub extraction_strategy: Option<ExtractionStrategy>,
    pub markdown_generator: MarkdownGenerator,
    pub word_count_threshold: usize,

    // Dispatch (arun_many)
    pub stream: bool,
    pub semaphore_count: usize,
    pub mean_delay_s: f64,
    pub max_range_s: f64,

    // Deep crawl
    pub deep_crawl_strategy: Option<std::sync::Arc<dyn crate::deep_crawl::DeepCrawlStrategy>>,

    // Proxy
    pub proxy_config: Option<ProxyConfig>,
    pub proxy_rotation_strategy: Option<crate::dispatcher::ProxyRotationStrategy>,

    // URL matching
    pub url_matcher: Option<UrlMatcher>,
    pub match_mode: MatchMode,

    // Compliance
    pub check_robots_txt: bool,

    // Prefetch
    pub prefetch: bool,

    // Other
    pub process_in_browser: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            session_id: None,
            cache_mode: CacheMode::default(),
            css_selector: None,
            target_elements: Vec::new(),
            excluded_tags: Vec::new(),
            excluded_selector: None,
            keep_data_attributes: false,
            remove_forms: false,
            only_text: false,
            exclude_external_links: false,
            exclude_social_media_links: false,
            exclude_domains: Vec::new(),
            exclude_external_images: false,
            exclude_all_images: false,
            preserve_https_for_internal_links: false,
            image_score_threshold: 0,
            image_description_min_word_threshold: 0,
            js_code: Vec::new(),
            js_only: false,
            wait_for: None,
            wait_until: WaitUntil::default(),
            page_timeout_ms: 30_000,
            delay_before_return_html_s: 0.0,
            scan_full_page: false,
            scroll_delay_s: 0.2,
            process_iframes: false,
            remove_overlay_elements: false,
            simulate_user: false,
            magic: false,
            virtual_scroll_config: None,
            init_scripts: Vec::new(),
            screenshot: false,
            pdf: false,
            capture_mhtml: false,
            screenshot_wait_for_s: 0.0,
            capture_network_requests: false,
            capture_console_messages: false,
            verbose: false,
            extraction_strategy: None,
            markdown_generator: MarkdownGenerator::default(),
            word_count_threshold: 0,
            stream: false,
            semaphore_count: 5,
            mean_delay_s: 0.0,
            max_range_s: 0.0,
            deep_crawl_strategy: None,
            proxy_config: None,
            proxy_rotation_strategy: None,
            url_matcher: None,
            match_mode: MatchMode::default(),
            check_robots_txt: false,
            prefetch: false,
            process_in_browser: false,
        }
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("base_url", &self.base_url)
            .field("session_id", &self.session_id)
            .field("cache_mode", &self.cache_mode)
            .field("css_selector", &self.css_selector)
            .field("word_count_threshold", &self.word_count_threshold)
            .field("stream", &self.stream)
            .field("semaphore_count", &self.semaphore_count)
            .finish_non_exhaustive()
    }
}

impl RunConfig {
    /// `magic=true` is a composite convenience flag: it enables
    /// `remove_overlay_elements`, `simulate_user`, and (conceptually)
    /// navigator-fingerprint overrides that live in the external browser
    /// driver, without requiring the caller to name each one.
    pub fn effective_remove_overlay_elements(&self) -> bool {
        self.remove_overlay_elements || self.magic
    }

    pub fn effective_simulate_user(&self) -> bool {
        self.simulate_user || self.magic
    }

    /// True when nothing about this config requires the browser strategy:
    /// no JS injection, no wait condition, no media capture, no session
    /// reuse, no virtual scroll.
    pub fn requires_browser(&self) -> bool {
        !self.js_code.is_empty()
            || self.wait_for.is_some()
            || self.screenshot
            || self.pdf
            || self.capture_mhtml
            || self.session_id.is_some()
            || self.virtual_scroll_config.is_some()
            || self.scan_full_page
    }

    /// Produce a patched copy. `patch` receives a clone of `self` to modify
    /// and return; `RunConfig` itself stays conceptually immutable once
    /// shared (the dispatcher never mutates a shared instance in place).
    pub fn clone_with(&self, patch: impl FnOnce(&mut RunConfig)) -> RunConfig {
        let mut copy = self.clone();
        patch(&mut copy);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_matches_prefix_and_suffix() {
        assert!(glob_match("https://example.com/*", "https://example.com/a/b"));
        assert!(!glob_match("https://example.com/*", "https://other.com/a"));
    }

    #[test]
    fn list_matcher_or_vs_and() {
        let list = UrlMatcher::List(vec![
            UrlMatcher::Glob("*.pdf".into()),
            UrlMatcher::Glob("https://keep.test/*".into()),
        ]);
        assert!(list.matches("https://keep.test/doc.pdf", MatchMode::Or));
        assert!(!list.matches("https://keep.test/doc.pdf", MatchMode::And));
    }

    #[test]
    fn wait_for_parses_prefix() {
        assert_eq!(WaitFor::parse("css:.ready"), WaitFor::Css(".ready".into()));
        assert_eq!(WaitFor::parse("js:window.ready"), WaitFor::Js("window.ready".into()));
        assert_eq!(WaitFor::parse(".ready"), WaitFor::Css(".ready".into()));
    }

    #[test]
    fn magic_flag_implies_overlay_and_simulate_user() {
        let cfg = RunConfig {
            magic: true,
            ..Default::default()
        };
        assert!(cfg.effective_remove_overlay_elements());
        assert!(cfg.effective_simulate_user());
    }

    #[test]
    fn requires_browser_true_for_session_id() {
        let cfg = RunConfig {
            session_id: Some("s1".into()),
            ..Default::default()
        };
        assert!(cfg.requires_browser());
        assert!(!RunConfig::default().requires_browser());
    }

    #[test]
    fn clone_with_patches_only_named_field() {
        let base = RunConfig::default();
        let patched = base.clone_with(|c| c.word_count_threshold = 42);
        assert_eq!(patched.word_count_threshold, 42);
        assert_eq!(base.word_count_threshold, 0);
    }
}
