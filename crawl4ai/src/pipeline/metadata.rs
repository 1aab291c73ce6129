//! `<title>`/`<meta>` extraction into `CrawlResult::metadata`.

use crate::result::PageMetadata;
use scraper::{Html, Selector};
use std::collections::HashMap;

pub fn extract(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);
    let mut metadata: HashMap<String, String> = HashMap::new();

    if let Ok(selector) = Selector::parse("title") {
        if let Some(el) = document.select(&selector).next() {
            let text = el.text().collect::<Vec<_>>().join("").trim().to_string();
            if !text.is_empty() {
                metadata.insert("title".to_string(), text);
            }
        }
    }

    if let Ok(selector) = Selector::parse("meta[name], meta[property]") {
        for el in document.select(&selector) {
            let key = el
                .value()
                .attr("name")
                .or_else(|| el.value().attr("property"))
                .unwrap_or_default();
            if let Some(content) = el.value().attr("content") {
                if !key.is_empty() {
                    metadata.insert(key.to_string(), content.to_string());
                }
            }
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_description() {
        let html = r#"<html><head><title>Hi</title><meta name="description" content="a page"></head></html>"#;
        let meta = extract(html);
        assert_eq!(meta.get("title").map(String::as_str), Some("Hi"));
        assert_eq!(meta.get("description").map(String::as_str), Some("a page"));
    }
}
