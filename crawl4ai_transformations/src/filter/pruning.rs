//! Pruning content filter: scores each block-level element by text density,
//! link density, and tag/class/id signals, then keeps blocks above a
//! threshold.

use super::ThresholdType;
use ego_tree::NodeId;
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tunables for [`super::ContentFilter::Pruning`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruningParams {
    /// How `threshold` is interpreted.
    pub threshold_type: ThresholdType,
    /// Fixed cutoff (ignored when `threshold_type` is `Dynamic`).
    pub threshold: f64,
    /// Blocks with fewer words than this are dropped regardless of score.
    pub min_word_threshold: usize,
}

impl Default for PruningParams {
    fn default() -> Self {
        Self {
            threshold_type: ThresholdType::Fixed,
            threshold: 0.48,
            min_word_threshold: 0,
        }
    }
}

/// Tags whose content is never worth keeping.
const NEGATIVE_TAGS: &[&str] = &["nav", "footer", "aside", "form", "script", "style", "noscript"];

/// Tags that get a scoring bonus as likely main content.
const POSITIVE_TAGS: &[&str] = &["article", "main", "section", "p"];

const NEGATIVE_SIGNALS: &[&str] = &[
    "nav", "menu", "sidebar", "footer", "header", "comment", "advert", "banner", "popup",
    "cookie", "social", "share", "related",
];

struct Block {
    node_id: NodeId,
    word_count: usize,
    link_word_count: usize,
    tag: String,
    class_and_id: String,
    score: f64,
}

pub fn apply(html: &str, params: &PruningParams) -> String {
    let document = Html::parse_document(html);
    let root = *document.root_element();

    let mut blocks = Vec::new();
    collect_blocks(root, &mut blocks);

    for block in &mut blocks {
        block.score = score(block);
    }

    let cutoff = match params.threshold_type {
        ThresholdType::Fixed => params.threshold,
        ThresholdType::Dynamic => {
            if blocks.is_empty() {
                params.threshold
            } else {
                blocks.iter().map(|b| b.score).sum::<f64>() / blocks.len() as f64
            }
        }
    };

    let keep: HashMap<NodeId, ()> = blocks
        .iter()
        .filter(|b| b.word_count >= params.min_word_threshold && b.score >= cutoff)
        .map(|b| (b.node_id, ()))
        .collect();

    let mut out = String::new();
    for block in &blocks {
        if keep.contains_key(&block.node_id) {
            if let Some(el) = document.tree.get(block.node_id) {
                out.push_str(&render_text(el));
                out.push('\n');
            }
        }
    }
    format!("<div>{out}</div>")
}

fn collect_blocks<'a>(node: ego_tree::NodeRef<'a, Node>, out: &mut Vec<Block>) {
    if let Some(el) = node.value().as_element() {
        let tag = el.name().to_string();
        if NEGATIVE_TAGS.contains(&tag.as_str()) {
            return;
        }
        if matches!(
            tag.as_str(),
            "p" | "li" | "td" | "blockquote" | "pre" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        ) {
            let (words, link_words) = count_words(node);
            if words > 0 {
                let mut class_and_id = format!(
                    "{} {}",
                    el.attr("class").unwrap_or_default(),
                    el.attr("id").unwrap_or_default()
                );
                for ancestor in ancestor_elements(node) {
                    class_and_id.push(' ');
                    class_and_id.push_str(ancestor.attr("class").unwrap_or_default());
                    class_and_id.push(' ');
                    class_and_id.push_str(ancestor.attr("id").unwrap_or_default());
                }
                out.push(Block {
                    node_id: node.id(),
                    word_count: words,
                    link_word_count: link_words,
                    tag,
                    class_and_id,
                    score: 0.0,
                });
                return;
            }
        }
    }
    for child in node.children() {
        collect_blocks(child, out);
    }
}

fn count_words<'a>(node: ego_tree::NodeRef<'a, Node>) -> (usize, usize) {
    let mut words = 0;
    let mut link_words = 0;
    for descendant in node.descendants() {
        if let Node::Text(text) = descendant.value() {
            let n = text.split_whitespace().count();
            words += n;
            if inside_anchor(descendant) {
                link_words += n;
            }
        }
    }
    (words, link_words)
}

fn ancestor_elements<'a>(node: ego_tree::NodeRef<'a, Node>) -> Vec<&'a scraper::node::Element> {
    let mut out = Vec::new();
    let mut cur = node.parent();
    while let Some(n) = cur {
        if let Some(el) = n.value().as_element() {
            out.push(el);
        }
        cur = n.parent();
    }
    out
}

fn inside_anchor<'a>(node: ego_tree::NodeRef<'a, Node>) -> bool {
    let mut cur = node.parent();
    while let Some(n) = cur {
        if let Some(el) = n.value().as_element() {
            if el.name() == "a" {
                return true;
            }
        }
        cur = n.parent();
    }
    false
}

fn score(block: &Block) -> f64 {
    let link_density = if block.word_count == 0 {
        0.0
    } else {
        block.link_word_count as f64 / block.word_count as f64
    };
    let mut s = 1.0 - link_density;

    if POSITIVE_TAGS.contains(&block.tag.as_str()) {
        s += 0.1;
    }
    if block.word_count < 10 {
        s -= 0.2;
    }
    s -= signal_penalty(&block.class_and_id);

    s.clamp(0.0, 1.0)
}

fn render_text(node: ego_tree::NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        if let Node::Text(t) = descendant.value() {
            out.push_str(t);
            out.push(' ');
        }
    }
    out.trim().to_string()
}

fn signal_penalty(class_or_id: &str) -> f64 {
    let lower = class_or_id.to_lowercase();
    if NEGATIVE_SIGNALS.iter().any(|s| lower.contains(s)) {
        0.3
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_nav_keeps_article_paragraph() {
        let html = r#"
            <nav><a href="/a">a</a><a href="/b">b</a><a href="/c">c</a></nav>
            <article><p>This is a substantial paragraph with plenty of real words in it.</p></article>
        "#;
        let out = apply(html, &PruningParams::default());
        assert!(out.contains("substantial paragraph"));
    }

    #[test]
    fn sidebar_class_lowers_score_below_plain_paragraph() {
        let html = r#"
            <div class="sidebar-widget"><p>This paragraph sits inside a sidebar wrapper with plenty of words.</p></div>
            <article><p>This paragraph sits in the main article with plenty of real words in it.</p></article>
        "#;
        let params = PruningParams {
            threshold_type: ThresholdType::Fixed,
            threshold: 0.85,
            min_word_threshold: 0,
        };
        let out = apply(html, &params);
        assert!(!out.contains("sidebar wrapper"));
        assert!(out.contains("main article"));
    }

    #[test]
    fn min_word_threshold_drops_short_blocks() {
        let html = "<article><p>short</p></article>";
        let params = PruningParams {
            min_word_threshold: 5,
            ..Default::default()
        };
        let out = apply(html, &params);
        assert!(!out.contains("short"));
    }

    #[test]
    fn zero_threshold_keeps_everything_with_words() {
        let html = "<p>hi there</p>";
        let params = PruningParams {
            min_word_threshold: 0,
            threshold: 0.0,
            ..Default::default()
        };
        let out = apply(html, &params);
        assert!(out.contains("hi there"));
    }
}
