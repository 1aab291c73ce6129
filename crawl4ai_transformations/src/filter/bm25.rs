//! BM25 content filter: splits cleaned HTML into block-level text chunks,
//! ranks them against a user query, and keeps the blocks that clear the
//! threshold.

use super::ThresholdType;
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tunables for [`super::ContentFilter::Bm25`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// How `threshold` is interpreted.
    pub threshold_type: ThresholdType,
    /// Fixed cutoff (ignored when `threshold_type` is `Dynamic`).
    pub threshold: f64,
    /// BM25 term-frequency saturation parameter.
    pub k1: f64,
    /// BM25 length-normalization parameter.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            threshold_type: ThresholdType::Fixed,
            threshold: 1.0,
            k1: 1.5,
            b: 0.75,
        }
    }
}

struct DocBlock {
    html: String,
    tokens: Vec<String>,
}

pub fn apply(html: &str, user_query: &str, params: &Bm25Params) -> String {
    let document = Html::parse_document(html);
    let root = *document.root_element();

    let mut blocks = Vec::new();
    collect_blocks(root, &mut blocks);

    if blocks.is_empty() {
        return "<div></div>".to_string();
    }

    let query_tokens = tokenize(user_query);
    if query_tokens.is_empty() {
        // No query to rank against: keep every block, matching the
        // "no-op filter" behavior of a threshold that nothing can fail.
        let joined = blocks.iter().map(|b| b.html.as_str()).collect::<Vec<_>>().join("\n");
        return format!("<div>{joined}</div>");
    }

    let avg_len = blocks.iter().map(|b| b.tokens.len()).sum::<usize>() as f64 / blocks.len() as f64;
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for term in &query_tokens {
        let df = blocks
            .iter()
            .filter(|b| b.tokens.iter().any(|t| t == term))
            .count();
        doc_freq.insert(term.as_str(), df);
    }

    let n = blocks.len() as f64;
    let scores: Vec<f64> = blocks
        .iter()
        .map(|block| bm25_score(&query_tokens, block, &doc_freq, n, avg_len, params))
        .collect();

    let cutoff = match params.threshold_type {
        ThresholdType::Fixed => params.threshold,
        ThresholdType::Dynamic => scores.iter().sum::<f64>() / scores.len() as f64,
    };

    let kept: Vec<&str> = blocks
        .iter()
        .zip(scores.iter())
        .filter(|(_, score)| **score >= cutoff)
        .map(|(b, _)| b.html.as_str())
        .collect();

    format!("<div>{}</div>", kept.join("\n"))
}

fn bm25_score(
    query: &[String],
    block: &DocBlock,
    doc_freq: &HashMap<&str, usize>,
    n: f64,
    avg_len: f64,
    params: &Bm25Params,
) -> f64 {
    let len = block.tokens.len() as f64;
    let mut score = 0.0;
    for term in query {
        let df = *doc_freq.get(term.as_str()).unwrap_or(&0) as f64;
        if df == 0.0 {
            continue;
        }
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        let tf = block.tokens.iter().filter(|t| *t == term).count() as f64;
        let denom = tf + params.k1 * (1.0 - params.b + params.b * (len / avg_len.max(1.0)));
        score += idf * (tf * (params.k1 + 1.0)) / denom.max(1e-9);
    }
    score
}

fn collect_blocks<'a>(node: ego_tree::NodeRef<'a, Node>, out: &mut Vec<DocBlock>) {
    if let Some(el) = node.value().as_element() {
        if matches!(
            el.name(),
            "p" | "li" | "td" | "blockquote" | "pre" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        ) {
            let text = collect_text(node);
            let tokens = tokenize(&text);
            if !tokens.is_empty() {
                out.push(DocBlock { html: text, tokens });
                return;
            }
        }
    }
    for child in node.children() {
        collect_blocks(child, out);
    }
}

fn collect_text<'a>(node: ego_tree::NodeRef<'a, Node>) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        if let Node::Text(t) = descendant.value() {
            out.push_str(t);
            out.push(' ');
        }
    }
    out.trim().to_string()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}
