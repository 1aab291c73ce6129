//! LLM content filter: asks a model which blocks of cleaned HTML are
//! relevant to an instruction and keeps only the approved ones.

use crawl4ai_extract::LlmCaller;
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};

/// Tunables for [`super::ContentFilter::Llm`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmFilterParams {
    /// Natural-language instruction describing what to keep.
    pub instruction: String,
    /// Submit at most this many blocks per model call.
    pub chunk_size: usize,
}

impl Default for LlmFilterParams {
    fn default() -> Self {
        Self {
            instruction: "Keep only blocks containing the main article content.".to_string(),
            chunk_size: 10,
        }
    }
}

pub async fn apply(html: &str, params: &LlmFilterParams, caller: &dyn LlmCaller) -> String {
    let document = Html::parse_document(html);
    let root = *document.root_element();

    let mut blocks = Vec::new();
    collect_blocks(root, &mut blocks);

    if blocks.is_empty() {
        return "<div></div>".to_string();
    }

    let mut kept = Vec::new();
    for group in blocks.chunks(params.chunk_size.max(1)) {
        let prompt = build_prompt(&params.instruction, group);
        match caller.call(&prompt).await {
            Ok((text, _usage)) => {
                let approved = parse_indices(&text);
                for &i in &approved {
                    if let Some(block) = group.get(i) {
                        kept.push(block.clone());
                    }
                }
            }
            // A failed model call keeps its group rather than silently
            // discarding content the caller never got to judge.
            Err(_) => kept.extend(group.iter().cloned()),
        }
    }

    format!("<div>{}</div>", kept.join("\n"))
}

fn build_prompt(instruction: &str, blocks: &[String]) -> String {
    let numbered: Vec<String> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{i}: {b}"))
        .collect();
    format!(
        "{instruction}\n\nBlocks:\n{}\n\nRespond with a comma-separated list of the indices to keep.",
        numbered.join("\n")
    )
}

/// Parse a comma/whitespace-separated list of integers out of the model's
/// response, ignoring anything that doesn't parse.
fn parse_indices(text: &str) -> Vec<usize> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter_map(|tok| tok.parse::<usize>().ok())
        .collect()
}

fn collect_blocks<'a>(node: ego_tree::NodeRef<'a, Node>, out: &mut Vec<String>) {
    if let Some(el) = node.value().as_element() {
        if matches!(
            el.name(),
            "p" | "li" | "td" | "blockquote" | "pre" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        ) {
            let text = collect_text(node);
            if !text.is_empty() {
                out.push(text);
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crawl4ai_extract::{ExtractionError, TokenUsage};

    struct KeepEvens;

    #[async_trait]
    impl LlmCaller for KeepEvens {
        async fn call(&self, prompt: &str) -> Result<(String, TokenUsage), ExtractionError> {
            let count = prompt.matches(": ").count();
            let indices: Vec<String> = (0..count).filter(|i| i % 2 == 0).map(|i| i.to_string()).collect();
            Ok((indices.join(","), TokenUsage::default()))
        }
    }

    #[tokio::test]
    async fn keeps_only_approved_indices() {
        let html = "<p>first</p><p>second</p><p>third</p><p>fourth</p>";
        let params = LlmFilterParams {
            instruction: "keep evens".into(),
            chunk_size: 10,
        };
        let out = apply(html, &params, &KeepEvens).await;
        assert!(out.contains("first"));
        assert!(!out.contains("second"));
        assert!(out.contains("third"));
    }
}
