//! Content-addressable cache key: a stable fingerprint over the URL and the
//! subset of RunConfig that affects the crawl's output.

use crate::config::RunConfig;
use std::hash::{Hash, Hasher};

/// Hash the content-affecting fields of `config` together with the
/// canonicalized URL. Delivery-only knobs (`stream`, `verbose`,
/// `semaphore_count`, `mean_delay_s`, `max_range_s`, `cache_mode` itself)
/// are deliberately excluded — two configs differing only in those should
/// still hit the same cache entry.
pub fn fingerprint(url: &str, config: &RunConfig) -> String {
    let canonical_url = crate::url::canonicalize(url).unwrap_or_else(|_| url.to_string());

    let mut state = FnvHasher::default();
    canonical_url.hash(&mut state);
    config.css_selector.hash(&mut state);
    config.target_elements.hash(&mut state);
    config.excluded_tags.hash(&mut state);
    config.excluded_selector.hash(&mut state);
    config.keep_data_attributes.hash(&mut state);
    config.remove_forms.hash(&mut state);
    config.only_text.hash(&mut state);
    config.exclude_external_links.hash(&mut state);
    config.exclude_social_media_links.hash(&mut state);
    config.exclude_domains.hash(&mut state);
    config.exclude_external_images.hash(&mut state);
    config.exclude_all_images.hash(&mut state);
    config.word_count_threshold.hash(&mut state);
    config.process_iframes.hash(&mut state);
    extraction_identity(config).hash(&mut state);
    markdown_identity(config).hash(&mut state);

    format!("{:016x}", state.finish())
}

/// A stable textual identity for the configured `MarkdownGenerator`: the
/// content source, conversion options, and filter variant with its
/// parameters. Two configs differing only here (e.g. Pruning vs BM25, or
/// different thresholds) must not collide on the same cache key — they
/// produce different `fit_markdown`/`fit_html`.
fn markdown_identity(config: &RunConfig) -> String {
    use crawl4ai_transformations::ContentFilter;
    let gen = &config.markdown_generator;
    let filter = match &gen.content_filter {
        None => "none".to_string(),
        Some(ContentFilter::Pruning(p)) => format!("{p:?}"),
        Some(ContentFilter::Bm25(p)) => format!("{p:?}"),
        Some(ContentFilter::Llm(p, _)) => format!("{p:?}"),
    };
    format!("{:?}|{filter}", gen.options)
}

/// A stable textual identity for the configured extraction strategy (schema
/// name/selector, pattern set, LLM instruction) without requiring
/// `ExtractionStrategy` itself to implement `Hash`.
fn extraction_identity(config: &RunConfig) -> String {
    use crawl4ai_extract::ExtractionStrategy;
    match &config.extraction_strategy {
        None => "none".to_string(),
        Some(ExtractionStrategy::SchemaCss(schema)) => format!("css:{}:{}", schema.name, schema.base_selector),
        Some(ExtractionStrategy::SchemaXPath(schema)) => format!("xpath:{}:{}", schema.name, schema.base_selector),
        Some(ExtractionStrategy::Regex(cfg)) => format!("regex:{:?}", cfg.patterns.kinds()),
        Some(ExtractionStrategy::Llm(cfg, _)) => format!("llm:{}", cfg.instruction),
    }
}

/// Tiny FNV-1a hasher so the key computation has no extra dependency beyond
/// `std::hash`.
struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        FnvHasher(0xcbf29ce484222325)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 ^= *b as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }
}
