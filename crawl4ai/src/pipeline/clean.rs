//! Step 1 of the content pipeline: scraping/cleaning.

use crate::config::RunConfig;
use ego_tree::NodeId;
use scraper::{Html, Node, Selector};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Tags stripped unconditionally; they never carry content worth keeping.
const ALWAYS_STRIPPED: &[&str] = &["script", "style", "noscript", "template"];

/// `process_iframes` recurses through same-origin iframe chains; bound the
/// depth so a frame that embeds itself can't loop forever.
const MAX_IFRAME_DEPTH: usize = 5;

/// Produce `cleaned_html` from `raw_html` fetched at `page_url`, per
/// `config`.
pub async fn clean(raw_html: &str, page_url: &str, config: &RunConfig) -> String {
    let mut visited = HashSet::new();
    clean_at_depth(raw_html, page_url, config, 0, &mut visited).await
}

async fn clean_at_depth(
    raw_html: &str,
    page_url: &str,
    config: &RunConfig,
    depth: usize,
    visited: &mut HashSet<String>,
) -> String {
    let document = Html::parse_document(raw_html);
    let root = document.root_element().id();

    let mut to_remove: HashSet<NodeId> = HashSet::new();

    for el in document.select(&Selector::parse("*").unwrap()) {
        let tag = el.value().name();
        if ALWAYS_STRIPPED.contains(&tag) || config.excluded_tags.iter().any(|t| t == tag) {
            to_remove.insert(el.id());
        }
    }

    if let Some(selector_str) = &config.excluded_selector {
        if let Ok(selector) = Selector::parse(selector_str) {
            for el in document.select(&selector) {
                to_remove.insert(el.id());
            }
        }
    }

    if config.remove_forms {
        if let Ok(selector) = Selector::parse("form") {
            for el in document.select(&selector) {
                to_remove.insert(el.id());
            }
        }
    }

    if config.effective_remove_overlay_elements() {
        for id in overlay_candidates(&document) {
            to_remove.insert(id);
        }
    }

    let inlined = if config.process_iframes {
        inline_same_origin_iframes(&document, page_url, config, depth, visited).await
    } else {
        HashMap::new()
    };

    let mut out = String::new();
    render_filtered(root, &document, &to_remove, &inlined, config, &mut out);

    if config.only_text {
        return strip_tags(&out);
    }

    out
}

/// For each same-origin `<iframe src>` not already visited and within the
/// depth budget, fetch and recursively clean its document. Cross-origin
/// frames and cycles are left untouched (rendered with their original,
/// empty children).
async fn inline_same_origin_iframes(
    document: &Html,
    page_url: &str,
    config: &RunConfig,
    depth: usize,
    visited: &mut HashSet<String>,
) -> HashMap<NodeId, String> {
    let mut inlined = HashMap::new();
    if depth >= MAX_IFRAME_DEPTH {
        return inlined;
    }
    let base = match url::Url::parse(page_url) {
        Ok(u) => u,
        Err(_) => return inlined,
    };
    let selector = match Selector::parse("iframe[src]") {
        Ok(s) => s,
        Err(_) => return inlined,
    };

    for el in document.select(&selector) {
        let src = match el.value().attr("src") {
            Some(s) => s,
            None => continue,
        };
        let frame_url = match base.join(src) {
            Ok(u) => u,
            Err(_) => continue,
        };
        if frame_url.origin() != base.origin() {
            continue;
        }
        let frame_url_str = frame_url.to_string();
        if !visited.insert(frame_url_str.clone()) {
            continue;
        }
        if let Ok(body) = fetch_iframe_document(&frame_url_str).await {
            let cleaned =
                Box::pin(clean_at_depth(&body, &frame_url_str, config, depth + 1, visited)).await;
            inlined.insert(el.id(), cleaned);
        }
    }
    inlined
}

async fn fetch_iframe_document(url: &str) -> Result<String, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    client.get(url).send().await?.text().await
}

/// Heuristic modal-overlay detection: `position: fixed` with a `z-index`
/// above a threshold and inline dimensions suggesting full-viewport
/// coverage. Without a layout engine this reads the inline `style`
/// attribute literally rather than computing actual rendered geometry.
fn overlay_candidates(document: &Html) -> Vec<NodeId> {
    const Z_INDEX_THRESHOLD: i64 = 1000;
    let mut ids = Vec::new();
    for el in document.select(&Selector::parse("*").unwrap()) {
        let style = el.value().attr("style").unwrap_or("");
        if !style.contains("position:fixed") && !style.contains("position: fixed") {
            continue;
        }
        let z_index = style
            .split(';')
            .find_map(|decl| decl.trim().strip_prefix("z-index:"))
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let covers_viewport = style.contains("100%") || style.contains("100vw") || style.contains("100vh");
        if z_index > Z_INDEX_THRESHOLD && covers_viewport {
            ids.push(el.id());
        }
    }
    ids
}

fn render_filtered(
    node_id: NodeId,
    document: &Html,
    to_remove: &HashSet<NodeId>,
    inlined: &HashMap<NodeId, String>,
    config: &RunConfig,
    out: &mut String,
) {
    let node = match document.tree.get(node_id) {
        Some(n) => n,
        None => return,
    };
    if to_remove.contains(&node_id) {
        return;
    }
    match node.value() {
        Node::Element(el) => {
            out.push('<');
            out.push_str(el.name());
            for (name, value) in el.attrs() {
                if !config.keep_data_attributes && name.starts_with("data-") {
                    continue;
                }
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&value.replace('"', "&quot;"));
                out.push('"');
            }
            out.push('>');
            if let Some(inline_html) = inlined.get(&node_id) {
                out.push_str(inline_html);
            } else {
                for child in node.children() {
                    render_filtered(child.id(), document, to_remove, inlined, config, out);
                }
            }
            out.push_str("</");
            out.push_str(el.name());
            out.push('>');
        }
        Node::Text(text) => out.push_str(text),
        Node::Document | Node::Fragment => {
            for child in node.children() {
                render_filtered(child.id(), document, to_remove, inlined, config, out);
            }
        }
        _ => {}
    }
}

fn strip_tags(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for text_node in fragment.tree.values() {
        if let Node::Text(t) = text_node {
            out.push_str(t);
            out.push(' ');
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://example.com/";

    #[tokio::test]
    async fn strips_script_and_style_unconditionally() {
        let html = "<div><script>evil()</script><style>.x{}</style><p>hi</p></div>";
        let out = clean(html, PAGE_URL, &RunConfig::default()).await;
        assert!(!out.contains("evil()"));
        assert!(!out.contains(".x{}"));
        assert!(out.contains("hi"));
    }

    #[tokio::test]
    async fn excluded_tags_strictly_monotone() {
        let html = "<div><nav>menu</nav><p>body</p></div>";
        let base = clean(html, PAGE_URL, &RunConfig::default()).await;
        let with_nav_excluded = clean(
            html,
            PAGE_URL,
            &RunConfig {
                excluded_tags: vec!["nav".into()],
                ..Default::default()
            },
        )
        .await;
        assert!(base.contains("menu"));
        assert!(!with_nav_excluded.contains("menu"));
        assert!(with_nav_excluded.contains("body"));
    }

    #[tokio::test]
    async fn remove_forms_strips_form_subtree() {
        let html = "<form><input name=\"x\"></form><p>keep</p>";
        let out = clean(
            html,
            PAGE_URL,
            &RunConfig {
                remove_forms: true,
                ..Default::default()
            },
        )
        .await;
        assert!(!out.contains("input"));
        assert!(out.contains("keep"));
    }

    #[tokio::test]
    async fn data_attributes_stripped_by_default() {
        let html = "<div data-foo=\"bar\">hi</div>";
        let out = clean(html, PAGE_URL, &RunConfig::default()).await;
        assert!(!out.contains("data-foo"));
    }

    #[tokio::test]
    async fn only_text_flattens_to_text() {
        let html = "<div><p>Hello <b>world</b></p></div>";
        let out = clean(
            html,
            PAGE_URL,
            &RunConfig {
                only_text: true,
                ..Default::default()
            },
        )
        .await;
        assert_eq!(out, "Hello world");
    }

    #[tokio::test]
    async fn process_iframes_off_leaves_iframe_empty() {
        let html = r#"<div><iframe src="/embed"></iframe></div>"#;
        let out = clean(html, PAGE_URL, &RunConfig::default()).await;
        assert!(out.contains("<iframe"));
        assert!(!out.contains("embedded body text"));
    }

    #[tokio::test]
    async fn process_iframes_skips_cross_origin_without_fetching() {
        let html = r#"<div><iframe src="https://other.example.net/embed"></iframe></div>"#;
        let out = clean(
            html,
            PAGE_URL,
            &RunConfig {
                process_iframes: true,
                ..Default::default()
            },
        )
        .await;
        assert!(out.contains("<iframe"));
    }
}
