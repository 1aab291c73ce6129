//! `CrawlResult` and its sub-records: the output of a single `arun`.

use crate::dispatcher::DispatchResult;
use crawl4ai_transformations::MarkdownResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Media kind, used to key `CrawlResult::media`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

/// A single media item found during link/media extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaItem {
    pub src: String,
    pub alt: Option<String>,
    /// Nearby textual context, used as a caption fallback.
    pub desc: Option<String>,
    /// Heuristic relevance score; images below `image_score_threshold` are
    /// dropped before this struct is constructed.
    pub score: i32,
    pub kind: MediaKind,
    /// Groups images captured from the same `<picture>`/responsive set.
    pub group_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// All media found on a page, partitioned by kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInventory {
    pub images: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
    pub audios: Vec<MediaItem>,
}

/// A single `<a href>` found during link extraction, with its internal/
/// external classification and scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkItem {
    pub href: String,
    pub text: String,
    pub title: Option<String>,
    pub base_domain: String,
    /// Optional enrichment from a `<head>` fetch of the link target
    /// (title/description); left `None` unless the caller opts into it.
    pub head_data: Option<HashMap<String, String>>,
    pub intrinsic_score: f64,
    pub contextual_score: f64,
    pub total_score: f64,
}

/// Links partitioned into internal vs. external, per the page's base
/// domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkInventory {
    pub internal: Vec<LinkItem>,
    pub external: Vec<LinkItem>,
}

/// A parsed `<table>` from the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub caption: Option<String>,
}

/// Freeform page metadata (`<title>`, `<meta name=... content=...>`, etc.).
pub type PageMetadata = HashMap<String, String>;

/// A single captured network request, when `capture_network_requests=true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkRequestLog {
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    pub resource_type: Option<String>,
}

/// A single captured console message, when `capture_console_messages=true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleMessageLog {
    pub level: String,
    pub text: String,
}

/// The output of a single `arun` call. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub session_id: Option<String>,
    pub response_headers: HashMap<String, String>,
    pub ssl_certificate: Option<String>,

    pub html: String,
    pub cleaned_html: String,
    pub fit_html: Option<String>,
    pub markdown: MarkdownResult,

    pub media: MediaInventory,
    pub links: LinkInventory,
    pub tables: Vec<ExtractedTable>,

    /// JSON-serialized extraction output, or `None` when no
    /// `extraction_strategy` ran (distinct from an extraction that ran and
    /// produced an empty array).
    pub extracted_content: Option<String>,
    pub metadata: PageMetadata,

    pub downloaded_files: Vec<String>,
    pub screenshot: Option<String>,
    pub pdf: Option<Vec<u8>>,
    pub mhtml: Option<String>,

    pub network_requests: Vec<NetworkRequestLog>,
    pub console_messages: Vec<ConsoleMessageLog>,

    pub dispatch_result: Option<DispatchResult>,
    pub redirected_url: Option<String>,
}

impl CrawlResult {
    /// Build the failure-case result per the §7 invariant: `success=false`
    /// always carries a non-empty `error_message`.
    pub fn failure(url: impl Into<String>, error_message: impl Into<String>) -> Self {
        let message = error_message.into();
        debug_assert!(!message.is_empty());
        Self {
            url: url.into(),
            success: false,
            status_code: None,
            error_message: Some(message),
            session_id: None,
            response_headers: HashMap::new(),
            ssl_certificate: None,
            html: String::new(),
            cleaned_html: String::new(),
            fit_html: None,
            markdown: MarkdownResult::default(),
            media: MediaInventory::default(),
            links: LinkInventory::default(),
            tables: Vec::new(),
            extracted_content: None,
            metadata: HashMap::new(),
            downloaded_files: Vec::new(),
            screenshot: None,
            pdf: None,
            mhtml: None,
            network_requests: Vec::new(),
            console_messages: Vec::new(),
            dispatch_result: None,
            redirected_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_result_carries_error_message() {
        let result = CrawlResult::failure("https://x.test", "boom");
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn serde_round_trip_preserves_declared_fields() {
        let mut result = CrawlResult::failure("https://x.test", "boom");
        result.success = true;
        result.error_message = None;
        result.html = "<p>hi</p>".into();
        let json = serde_json::to_string(&result).unwrap();
        let back: CrawlResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.url, result.url);
        assert_eq!(back.html, result.html);
        assert_eq!(back.success, result.success);
    }
}
