//! The content pipeline: raw HTML + RunConfig → the content fields of a
//! `CrawlResult`.

mod clean;
mod links;
mod metadata;
mod narrow;
mod tables;

use crate::config::RunConfig;
use crate::error::CrawlError;
use crate::result::{ExtractedTable, LinkInventory, MediaInventory, PageMetadata};
use crawl4ai_extract::InputFormat;
use crawl4ai_transformations::MarkdownResult;

pub use links::root_domain;

/// Everything the content pipeline produces from one fetch.
pub struct PipelineOutput {
    pub cleaned_html: String,
    pub fit_html: Option<String>,
    pub markdown: MarkdownResult,
    pub links: LinkInventory,
    pub media: MediaInventory,
    pub tables: Vec<ExtractedTable>,
    pub metadata: PageMetadata,
    pub extracted_content: Option<String>,
}

/// Run steps 1–5 against `raw_html` fetched from `page_url`.
pub async fn run(raw_html: &str, page_url: &str, config: &RunConfig) -> Result<PipelineOutput, CrawlError> {
    // Step 1: scraping/cleaning.
    let cleaned_html = clean::clean(raw_html, page_url, config).await;

    // Step 2: link & media extraction, over the post-excluded_tags HTML —
    // never narrowed by target_elements/css_selector.
    let (links, media) = links::extract(&cleaned_html, page_url, config);
    let tables = tables::extract(&cleaned_html);
    let metadata = metadata::extract(raw_html);

    // css_selector narrows everything downstream; target_elements narrows
    // only markdown/extraction.
    let downstream_html = match &config.css_selector {
        Some(selector) => narrow::narrow(&cleaned_html, selector),
        None => cleaned_html.clone(),
    };
    let narrowed_html = if config.target_elements.is_empty() {
        downstream_html.clone()
    } else {
        let union_selector = config.target_elements.join(", ");
        narrow::narrow(&downstream_html, &union_selector)
    };

    // Step 3 + 4: markdown generation (the generator internally applies its
    // configured content_filter to produce fit_markdown/fit_html).
    let markdown = config
        .markdown_generator
        .generate(&narrowed_html, raw_html, None)
        .await;
    let fit_html = markdown.fit_html.clone();

    let markdown = apply_word_count_threshold(markdown, config.word_count_threshold);

    // Step 5: extraction, operating on whichever artifact the strategy asks
    // for.
    let extracted_content = match &config.extraction_strategy {
        Some(strategy) => {
            let input = match strategy.input_format() {
                InputFormat::Markdown => markdown.raw_markdown.clone(),
                InputFormat::Html => narrowed_html.clone(),
                InputFormat::FitMarkdown => markdown.fit_markdown.clone().unwrap_or_default(),
            };
            let value = strategy.run(&input).await?;
            Some(serde_json::to_string(&value).map_err(|e| CrawlError::Cache(e.to_string()))?)
        }
        None => None,
    };

    Ok(PipelineOutput {
        cleaned_html,
        fit_html,
        markdown,
        links,
        media,
        tables,
        metadata,
        extracted_content,
    })
}

/// `word_count_threshold=0` keeps every block; large thresholds reduce
/// `fit_markdown` to empty but never the `raw_markdown`/citation fields,
/// which always reflect the full narrowed input.
fn apply_word_count_threshold(mut markdown: MarkdownResult, threshold: usize) -> MarkdownResult {
    if threshold == 0 {
        return markdown;
    }
    if let Some(fit) = &markdown.fit_markdown {
        let kept: Vec<&str> = fit
            .split("\n\n")
            .filter(|block| block.split_whitespace().count() >= threshold)
            .collect();
        markdown.fit_markdown = Some(kept.join("\n\n"));
    }
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raw_html_round_trips_links_through_pipeline() {
        let html = r#"<html><body><a href="/a">a</a><p>Hello world this is content</p></body></html>"#;
        let out = run(html, "https://example.com/", &RunConfig::default()).await.unwrap();
        assert_eq!(out.links.internal.len(), 1);
        assert!(out.markdown.raw_markdown.contains("Hello world"));
    }

    #[tokio::test]
    async fn target_elements_narrows_markdown_not_links() {
        let html = r#"<html><body><nav><a href="/x">x</a></nav><main><p class="body">Keep me</p></main><p>Other text</p></body></html>"#;
        let config = RunConfig {
            target_elements: vec!["p.body".into()],
            ..Default::default()
        };
        let out = run(html, "https://example.com/", &config).await.unwrap();
        assert!(out.markdown.raw_markdown.contains("Keep me"));
        assert!(!out.markdown.raw_markdown.contains("Other text"));
        // links still reflect the whole page
        assert_eq!(out.links.internal.len(), 1);
    }

    #[test]
    fn word_count_threshold_zero_is_noop() {
        let markdown = MarkdownResult {
            fit_markdown: Some("a\n\nb c d e f g h".into()),
            ..Default::default()
        };
        let out = apply_word_count_threshold(markdown.clone(), 0);
        assert_eq!(out.fit_markdown, markdown.fit_markdown);
    }

    #[test]
    fn large_word_count_threshold_empties_fit_markdown_without_crash() {
        let markdown = MarkdownResult {
            fit_markdown: Some("short block".into()),
            ..Default::default()
        };
        let out = apply_word_count_threshold(markdown, 1_000_000);
        assert_eq!(out.fit_markdown, Some(String::new()));
    }
}
