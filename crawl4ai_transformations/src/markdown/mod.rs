mod citations;
mod html_to_md;

use crate::filter::ContentFilter;
use serde::{Deserialize, Serialize};

/// Which HTML artifact a [`MarkdownGenerator`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    /// Step-1 cleaned HTML (the default).
    #[default]
    CleanedHtml,
    /// The original, unmodified HTML.
    RawHtml,
    /// The content filter's output, applied to cleaned HTML.
    FitHtml,
}

/// Markdown conversion options, honored deterministically by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownOptions {
    /// Which HTML to read.
    pub content_source: ContentSource,
    /// Drop `<a>` tags down to their text content.
    pub ignore_links: bool,
    /// Drop `<img>` tags entirely.
    pub ignore_images: bool,
    /// Escape Markdown-significant characters in text nodes.
    pub escape_html: bool,
    /// Word-wrap body text to this column width. `0` disables wrapping.
    pub body_width: usize,
    /// Drop `#fragment`-only links.
    pub skip_internal_links: bool,
    /// Collapse paragraph breaks to a single newline instead of a blank line.
    pub single_line_break: bool,
    /// Wrap `<code>` spans in backticks.
    pub mark_code: bool,
    /// Render `<sub>`/`<sup>` as `~x~`/`^x^`.
    pub include_sup_sub: bool,
    /// Drop `mailto:` links down to their text content.
    pub ignore_mailto_links: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            content_source: ContentSource::default(),
            ignore_links: false,
            ignore_images: false,
            escape_html: false,
            body_width: 0,
            skip_internal_links: false,
            single_line_break: false,
            mark_code: true,
            include_sup_sub: false,
            ignore_mailto_links: false,
        }
    }
}

/// The markdown sub-record of a `CrawlResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkdownResult {
    /// Unfiltered Markdown rendered from `content_source`.
    pub raw_markdown: String,
    /// `raw_markdown` with inline links rewritten to `[text][n]` citations.
    pub markdown_with_citations: String,
    /// The `[n]: href "text"` reference list backing the citations above.
    pub references_markdown: String,
    /// Markdown rendered from the content filter's output. `None` unless a
    /// filter is configured (never synthesized otherwise).
    pub fit_markdown: Option<String>,
    /// The content filter's HTML fragment. `None` unless a filter is
    /// configured.
    pub fit_html: Option<String>,
}

/// Converts HTML to Markdown, optionally running a [`ContentFilter`] first
/// to additionally produce `fit_markdown`/`fit_html`.
#[derive(Debug, Clone)]
pub struct MarkdownGenerator {
    /// Conversion options.
    pub options: MarkdownOptions,
    /// Optional content filter producing `fit_html`/`fit_markdown`.
    pub content_filter: Option<ContentFilter>,
}

impl MarkdownGenerator {
    /// Build a generator with default options and no content filter.
    pub fn new() -> Self {
        Self {
            options: MarkdownOptions::default(),
            content_filter: None,
        }
    }

    /// Run the generator over the pipeline's HTML artifacts.
    ///
    /// `cleaned_html` and `raw_html` correspond to the same-named
    /// `CrawlResult` fields; `user_query` is forwarded to a BM25 filter if
    /// configured.
    pub async fn generate(
        &self,
        cleaned_html: &str,
        raw_html: &str,
        user_query: Option<&str>,
    ) -> MarkdownResult {
        let source_html = match self.options.content_source {
            ContentSource::CleanedHtml => cleaned_html,
            ContentSource::RawHtml => raw_html,
            // `fit_html` doesn't exist yet on the first pass; fall back to
            // cleaned_html, then re-render below once the filter has run.
            ContentSource::FitHtml => cleaned_html,
        };

        let raw_markdown = html_to_md::convert(source_html, &self.options);
        let citations = citations::rewrite(&raw_markdown);

        let (fit_html, fit_markdown) = match &self.content_filter {
            Some(filter) => {
                let fit_html = filter.apply(cleaned_html, user_query).await;
                let fit_markdown = html_to_md::convert(&fit_html, &self.options);
                (Some(fit_html), Some(fit_markdown))
            }
            None => (None, None),
        };

        let raw_markdown = if matches!(self.options.content_source, ContentSource::FitHtml) {
            fit_html
                .as_deref()
                .map(|h| html_to_md::convert(h, &self.options))
                .unwrap_or(raw_markdown)
        } else {
            raw_markdown
        };
        let citations = if matches!(self.options.content_source, ContentSource::FitHtml) {
            citations::rewrite(&raw_markdown)
        } else {
            citations
        };

        MarkdownResult {
            raw_markdown,
            markdown_with_citations: citations.markdown_with_citations,
            references_markdown: citations.references_markdown,
            fit_markdown,
            fit_html,
        }
    }
}

impl Default for MarkdownGenerator {
    fn default() -> Self {
        Self::new()
    }
}
