//! Best-First scoring: term overlap against a query plus a shallow-path
//! bonus, standing in for "BM25 against a query, plus intrinsic URL
//! quality" (§4.7) without requiring a full index per crawl.

/// Scores a candidate URL/link-text pair for `BestFirst` ordering. Higher
/// is visited sooner.
#[derive(Clone)]
pub struct UrlScorer {
    query_terms: Vec<String>,
}

impl UrlScorer {
    pub fn new(query: &str) -> Self {
        Self {
            query_terms: tokenize(query),
        }
    }

    /// No query: fall back to a pure intrinsic-quality score (shallow,
    /// short paths first).
    pub fn intrinsic_only() -> Self {
        Self { query_terms: Vec::new() }
    }

    pub fn score(&self, url: &str, link_text: &str) -> f64 {
        let intrinsic = intrinsic_quality(url);
        if self.query_terms.is_empty() {
            return intrinsic;
        }
        let haystack = tokenize(&format!("{url} {link_text}"));
        let overlap = self
            .query_terms
            .iter()
            .filter(|t| haystack.contains(t))
            .count() as f64;
        overlap * 10.0 + intrinsic
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shorter paths and fewer query parameters score slightly higher, as a
/// tie-break when no query is supplied or term overlap is equal.
fn intrinsic_quality(url: &str) -> f64 {
    let Ok(parsed) = url::Url::parse(url) else {
        return 0.0;
    };
    let depth = parsed.path_segments().map(|s| s.count()).unwrap_or(0) as f64;
    let has_query = if parsed.query().is_some() { 1.0 } else { 0.0 };
    (10.0 - depth).max(0.0) - has_query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_query_terms_outscore_unrelated_link() {
        let scorer = UrlScorer::new("rust async");
        let matching = scorer.score("https://x.test/rust-async-guide", "Rust Async Guide");
        let unrelated = scorer.score("https://x.test/cooking", "Cooking tips");
        assert!(matching > unrelated);
    }

    #[test]
    fn intrinsic_only_prefers_shallower_paths() {
        let scorer = UrlScorer::intrinsic_only();
        let shallow = scorer.score("https://x.test/a", "");
        let deep = scorer.score("https://x.test/a/b/c/d", "");
        assert!(shallow > deep);
    }
}
