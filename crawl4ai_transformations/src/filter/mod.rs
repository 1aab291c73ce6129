mod bm25;
mod llm;
mod pruning;

use crawl4ai_extract::LlmCaller;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use bm25::Bm25Params;
pub use llm::LlmFilterParams;
pub use pruning::PruningParams;

/// Narrows cleaned HTML down to the blocks judged relevant, producing the
/// `fit_html`/`fit_markdown` pair of a `CrawlResult`.
#[derive(Clone)]
pub enum ContentFilter {
    /// Score-and-threshold DOM pruning by tag/text/link-density heuristics.
    Pruning(PruningParams),
    /// Rank text blocks against a user query with BM25 and keep the top set.
    Bm25(Bm25Params),
    /// Ask an LLM which blocks are relevant.
    Llm(LlmFilterParams, Arc<dyn LlmCaller>),
}

impl std::fmt::Debug for ContentFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentFilter::Pruning(p) => f.debug_tuple("Pruning").field(p).finish(),
            ContentFilter::Bm25(p) => f.debug_tuple("Bm25").field(p).finish(),
            ContentFilter::Llm(p, _) => f.debug_tuple("Llm").field(p).finish(),
        }
    }
}

impl ContentFilter {
    /// Run the filter over `html`, returning the fragment of surviving
    /// blocks joined back into an HTML string. `user_query` is only
    /// consulted by the BM25 variant.
    pub async fn apply(&self, html: &str, user_query: Option<&str>) -> String {
        match self {
            ContentFilter::Pruning(params) => pruning::apply(html, params),
            ContentFilter::Bm25(params) => bm25::apply(html, user_query.unwrap_or(""), params),
            ContentFilter::Llm(params, caller) => llm::apply(html, params, caller.as_ref()).await,
        }
    }
}

/// Threshold comparison mode shared by [`PruningParams`] and [`Bm25Params`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    /// Compare the raw score against a fixed cutoff.
    Fixed,
    /// Compare against the mean of all candidate scores on the page.
    Dynamic,
}

impl Default for ThresholdType {
    fn default() -> Self {
        ThresholdType::Fixed
    }
}
