//! Subtree narrowing for `css_selector` (narrows everything downstream) and
//! `target_elements` (narrows only markdown/extraction inputs).

use scraper::{Html, Selector};

/// Render the union of all elements matching `selector`, in document order,
/// concatenated as their outer HTML.
pub fn narrow(html: &str, selector: &str) -> String {
    let document = Html::parse_document(html);
    let parsed = match Selector::parse(selector) {
        Ok(s) => s,
        Err(_) => return html.to_string(),
    };
    let mut out = String::new();
    for el in document.select(&parsed) {
        out.push_str(&el.html());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_to_matched_union() {
        let html = "<div><p class=\"keep\">a</p><p>b</p><p class=\"keep\">c</p></div>";
        let out = narrow(html, "p.keep");
        assert!(out.contains('a'));
        assert!(out.contains('c'));
        assert!(!out.contains('b'));
    }
}
