//! Step 2 of the content pipeline: link and media extraction, scoring, and
//! internal/external classification.

use crate::config::RunConfig;
use crate::result::{LinkInventory, LinkItem, MediaInventory, MediaItem, MediaKind};
use case_insensitive_string::CaseInsensitiveString;
use scraper::{Html, Node, Selector};

/// Default blocklist of social-media root domains recognized by
/// `exclude_social_media_links`, checked as an exact match against a link's
/// `root_domain`. Extensible by the caller via `exclude_domains`. A
/// compile-time perfect hash set, since this list never changes at runtime.
static SOCIAL_MEDIA_DOMAINS: phf::Set<&'static str> = phf::phf_set! {
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "tiktok.com",
    "youtube.com",
    "pinterest.com",
    "reddit.com",
};

/// Extract the eTLD+1-ish root domain from a host. Mirrors a simple
/// split-on-dot heuristic rather than a full public-suffix-list lookup:
/// good enough to compare same-site hosts without an extra dependency.
pub fn root_domain(host: &str) -> &str {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() >= 3 {
        let start = parts.len() - 2;
        if let Some(pos) = host.find(parts[start]) {
            return &host[pos..];
        }
        host
    } else if parts.len() == 2 {
        host
    } else {
        host
    }
}

fn resolve(base: &url::Url, href: &str) -> Option<url::Url> {
    base.join(href).ok()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shallower, query-free path quality: shorter paths and anchors carrying
/// real text score higher. Same shape as `deep_crawl::UrlScorer`'s
/// intrinsic term, computed per link instead of per frontier node.
fn intrinsic_link_score(href: &str, text: &str) -> f64 {
    let depth = url::Url::parse(href)
        .ok()
        .and_then(|u| u.path_segments().map(|s| s.count()))
        .unwrap_or(0) as f64;
    let text_bonus = if text.split_whitespace().count() >= 2 { 1.0 } else { 0.0 };
    (5.0 - depth).max(0.0) + text_bonus
}

/// How many of the page's title words appear in this link's anchor text —
/// a cheap stand-in for on-page relevance without indexing the whole page.
fn contextual_link_score(text: &str, page_title_terms: &[String]) -> f64 {
    if page_title_terms.is_empty() {
        return 0.0;
    }
    let link_terms = tokenize(text);
    page_title_terms.iter().filter(|t| link_terms.contains(t)).count() as f64
}

/// Run link and media extraction over `html` (the post-`excluded_tags`
/// document, per §4.2 step 2, which is extracted before narrowing by
/// `target_elements`/`css_selector`).
pub fn extract(html: &str, page_url: &str, config: &RunConfig) -> (LinkInventory, MediaInventory) {
    let document = Html::parse_document(html);
    let base = match url::Url::parse(page_url) {
        Ok(u) => u,
        Err(_) => return (LinkInventory::default(), MediaInventory::default()),
    };
    let page_domain = base.host_str().map(root_domain).unwrap_or_default().to_string();
    let page_title_terms = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| tokenize(&el.text().collect::<Vec<_>>().join("")))
        .unwrap_or_default();

    let mut links = LinkInventory::default();
    if let Ok(selector) = Selector::parse("a[href]") {
        for el in document.select(&selector) {
            let href_raw = el.value().attr("href").unwrap_or("");
            let resolved = match resolve(&base, href_raw) {
                Some(u) => u,
                None => continue,
            };
            let host = resolved.host_str().unwrap_or_default();
            let link_domain = root_domain(host).to_string();
            let is_internal =
                CaseInsensitiveString::from(link_domain.clone()) == CaseInsensitiveString::from(page_domain.clone());

            if !is_internal && config.exclude_external_links {
                continue;
            }
            if config.exclude_social_media_links && SOCIAL_MEDIA_DOMAINS.contains(link_domain.as_str()) {
                continue;
            }
            if config.exclude_domains.iter().any(|d| host.ends_with(d.as_str())) {
                continue;
            }

            let text: String = el.text().collect::<Vec<_>>().join("").trim().to_string();
            let title = el.value().attr("title").map(str::to_string);

            let mut href = resolved.to_string();
            if is_internal && config.preserve_https_for_internal_links && base.scheme() == "https" && resolved.scheme() == "http" {
                href = href.replacen("http://", "https://", 1);
            }

            let intrinsic_score = intrinsic_link_score(&href, &text);
            let contextual_score = contextual_link_score(&text, &page_title_terms);
            let item = LinkItem {
                href,
                text,
                title,
                base_domain: link_domain,
                head_data: None,
                intrinsic_score,
                contextual_score,
                total_score: intrinsic_score + contextual_score,
            };
            if is_internal {
                links.internal.push(item);
            } else {
                links.external.push(item);
            }
        }
    }

    let mut media = MediaInventory::default();
    if !config.exclude_all_images {
        if let Ok(selector) = Selector::parse("img[src]") {
            for el in document.select(&selector) {
                let src_raw = el.value().attr("src").unwrap_or("");
                let resolved_src = resolve(&base, src_raw).map(|u| u.to_string()).unwrap_or_else(|| src_raw.to_string());
                let host = resolved_src
                    .parse::<url::Url>()
                    .ok()
                    .and_then(|u| u.host_str().map(root_domain).map(str::to_string));
                let is_external = host.as_deref().map(|h| h != page_domain).unwrap_or(false);
                if is_external && config.exclude_external_images {
                    continue;
                }

                let alt = el.value().attr("alt").map(str::to_string);
                let width = el.value().attr("width").and_then(|w| w.parse().ok());
                let height = el.value().attr("height").and_then(|h| h.parse().ok());
                let desc = nearby_text(&el, config.image_description_min_word_threshold);
                let score = score_image(alt.as_deref(), width, height, desc.as_deref());

                if score < config.image_score_threshold {
                    continue;
                }

                media.images.push(MediaItem {
                    src: resolved_src,
                    alt,
                    desc,
                    score,
                    kind: MediaKind::Image,
                    group_id: None,
                    width,
                    height,
                });
            }
        }
    }

    for (selector_str, kind) in [("video[src]", MediaKind::Video), ("audio[src]", MediaKind::Audio)] {
        if let Ok(selector) = Selector::parse(selector_str) {
            for el in document.select(&selector) {
                let src_raw = el.value().attr("src").unwrap_or("");
                let resolved_src = resolve(&base, src_raw).map(|u| u.to_string()).unwrap_or_else(|| src_raw.to_string());
                let item = MediaItem {
                    src: resolved_src,
                    alt: None,
                    desc: None,
                    score: 0,
                    kind,
                    group_id: None,
                    width: None,
                    height: None,
                };
                match kind {
                    MediaKind::Video => media.videos.push(item),
                    MediaKind::Audio => media.audios.push(item),
                    MediaKind::Image => unreachable!(),
                }
            }
        }
    }

    (links, media)
}

fn nearby_text(el: &scraper::ElementRef, min_words: usize) -> Option<String> {
    let parent = el.parent()?;
    let mut text = String::new();
    for sibling in parent.children() {
        if let Node::Text(t) = sibling.value() {
            text.push_str(t);
            text.push(' ');
        }
    }
    let text = text.trim().to_string();
    if text.split_whitespace().count() >= min_words && !text.is_empty() {
        Some(text)
    } else {
        None
    }
}

fn score_image(alt: Option<&str>, width: Option<u32>, height: Option<u32>, desc: Option<&str>) -> i32 {
    let mut score = 0;
    if alt.map(|a| !a.trim().is_empty()).unwrap_or(false) {
        score += 2;
    }
    if desc.is_some() {
        score += 1;
    }
    match (width, height) {
        (Some(w), Some(h)) if w >= 200 && h >= 200 => score += 2,
        (Some(w), Some(h)) if w < 32 || h < 32 => score -= 3,
        _ => {}
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_internal_vs_external_by_root_domain() {
        let html = r#"<a href="/about">about</a><a href="https://other.example.com/x">ext</a>"#;
        let (links, _) = extract(html, "https://example.com/", &RunConfig::default());
        assert_eq!(links.internal.len(), 1);
        assert_eq!(links.external.len(), 1);
        assert_eq!(links.internal[0].href, "https://example.com/about");
    }

    #[test]
    fn exclude_external_links_drops_them() {
        let html = r#"<a href="/about">about</a><a href="https://other.example.com/x">ext</a>"#;
        let (links, _) = extract(
            html,
            "https://example.com/",
            &RunConfig {
                exclude_external_links: true,
                ..Default::default()
            },
        );
        assert_eq!(links.external.len(), 0);
        assert_eq!(links.internal.len(), 1);
    }

    #[test]
    fn exclude_all_images_yields_empty_media() {
        let html = r#"<img src="/a.png" alt="pic">"#;
        let (_, media) = extract(
            html,
            "https://example.com/",
            &RunConfig {
                exclude_all_images: true,
                ..Default::default()
            },
        );
        assert!(media.images.is_empty());
    }

    #[test]
    fn image_score_threshold_filters_low_score_images() {
        let html = r#"<img src="/a.png">"#;
        let (_, media) = extract(
            html,
            "https://example.com/",
            &RunConfig {
                image_score_threshold: 1,
                ..Default::default()
            },
        );
        assert!(media.images.is_empty());
    }

    #[test]
    fn link_matching_page_title_scores_higher_than_unrelated_link() {
        let html = r#"
            <title>Rust Async Guide</title>
            <a href="/rust-async-guide">Rust Async Guide</a>
            <a href="/unrelated">Cooking tips</a>
        "#;
        let (links, _) = extract(html, "https://example.com/", &RunConfig::default());
        let matching = links.internal.iter().find(|l| l.href.contains("rust-async-guide")).unwrap();
        let unrelated = links.internal.iter().find(|l| l.href.contains("unrelated")).unwrap();
        assert!(matching.total_score > unrelated.total_score);
        assert!(matching.contextual_score > 0.0);
    }

    #[test]
    fn root_domain_strips_subdomain() {
        assert_eq!(root_domain("www.example.com"), "example.com");
        assert_eq!(root_domain("example.com"), "example.com");
    }
}
