//! Rewrites inline Markdown links into numbered citations.
//!
//! `[text](href)` becomes `[text][n]`, numbered by first occurrence of
//! `href`, with a trailing `references_markdown` section
//! (`[n]: href "text"`) in the same stable order.

use std::collections::HashMap;

/// Output of [`rewrite`].
pub struct Citations {
    /// `raw_markdown` with every link replaced by its citation marker.
    pub markdown_with_citations: String,
    /// The `[n]: href` reference list, one per unique href.
    pub references_markdown: String,
}

/// Find `[text](href)` spans in `raw_markdown` without relying on a full
/// Markdown parser: links never nest brackets/parens in the generator's own
/// output, so a single linear scan suffices.
pub fn rewrite(raw_markdown: &str) -> Citations {
    let mut out = String::with_capacity(raw_markdown.len());
    let mut order: Vec<(String, String)> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    let bytes = raw_markdown.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some((text, href, consumed)) = try_parse_link(&raw_markdown[i..]) {
                let n = *seen.entry(href.clone()).or_insert_with(|| {
                    order.push((text.clone(), href.clone()));
                    order.len()
                });
                out.push_str(&format!("[{text}][{n}]"));
                i += consumed;
                continue;
            }
        }
        // Advance by one char (not byte) to stay on UTF-8 boundaries.
        let ch_len = raw_markdown[i..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
        out.push_str(&raw_markdown[i..i + ch_len]);
        i += ch_len;
    }

    let mut references = String::new();
    for (idx, (text, href)) in order.iter().enumerate() {
        references.push_str(&format!("[{}]: {} \"{}\"\n", idx + 1, href, text));
    }

    Citations {
        markdown_with_citations: out,
        references_markdown: references,
    }
}

/// Try to parse a `[text](href)` starting at byte 0 of `s`. Returns the link
/// text, href, and number of bytes consumed (excluding an already-matched
/// leading `!` for images, which are left untouched).
fn try_parse_link(s: &str) -> Option<(String, String, usize)> {
    if !s.starts_with('[') {
        return None;
    }
    let close_bracket = s.find(']')?;
    if close_bracket == 0 {
        return None;
    }
    let rest = &s[close_bracket + 1..];
    if !rest.starts_with('(') {
        return None;
    }
    let close_paren = rest.find(')')?;
    let text = &s[1..close_bracket];
    let href = &rest[1..close_paren];
    // Bail out on nested brackets/parens — not a case the generator emits.
    if text.contains('[') || text.contains(']') || href.contains('(') || href.contains(')') {
        return None;
    }
    let consumed = close_bracket + 1 + close_paren + 1;
    Some((text.to_string(), href.to_string(), consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_by_first_occurrence() {
        let md = "[a](https://x.test) and [b](https://y.test) and [a2](https://x.test)";
        let out = rewrite(md);
        assert_eq!(
            out.markdown_with_citations,
            "[a][1] and [b][2] and [a2][1]"
        );
        assert!(out.references_markdown.contains("[1]: https://x.test"));
        assert!(out.references_markdown.contains("[2]: https://y.test"));
    }

    #[test]
    fn round_trips_text_and_href_pairs() {
        let md = "see [docs](https://example.com/docs) for more";
        let out = rewrite(md);
        // Recover (text, href) pairs from the rewritten output + references.
        assert!(out.markdown_with_citations.contains("[docs][1]"));
        assert!(out.references_markdown.contains("https://example.com/docs"));
        assert!(out.references_markdown.contains("\"docs\""));
    }
}
