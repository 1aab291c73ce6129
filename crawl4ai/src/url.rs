//! URL handle: the tagged union of crawl targets accepted by the library,
//! and the scheme validator that gates the network-facing API boundary.

use crate::error::CrawlError;
use serde::{Deserialize, Serialize};

/// A single crawl target, already classified by scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UrlTarget {
    /// `http://` or `https://`.
    Http { url: String },
    /// `file://`, library-only.
    File { path: String },
    /// `raw:<html>`, the literal suffix is the document body.
    Raw { html: String },
    /// `ws://`/`wss://`, a browser CDP endpoint supplied out of band.
    Cdp { endpoint: String },
}

impl UrlTarget {
    /// Classify `input` by scheme. Does not perform the network-boundary
    /// restriction in §6 — callers exposed over a network should additionally
    /// call [`validate_network_boundary`].
    pub fn parse(input: &str) -> Result<Self, CrawlError> {
        if let Some(html) = input.strip_prefix("raw:") {
            return Ok(UrlTarget::Raw {
                html: html.to_string(),
            });
        }
        if let Some(path) = input.strip_prefix("file://") {
            return Ok(UrlTarget::File {
                path: path.to_string(),
            });
        }
        if input.starts_with("ws://") || input.starts_with("wss://") {
            return Ok(UrlTarget::Cdp {
                endpoint: input.to_string(),
            });
        }
        if input.starts_with("http://") || input.starts_with("https://") {
            // Route through `url::Url` so the handle always carries a
            // normalized, parseable address.
            let parsed = url::Url::parse(input)?;
            return Ok(UrlTarget::Http {
                url: parsed.into(),
            });
        }

        let scheme = input.split(':').next().unwrap_or(input).to_string();
        Err(CrawlError::InvalidScheme {
            url: input.to_string(),
            scheme,
        })
    }

    /// Reject schemes unsafe to accept from a network-exposed caller.
    /// `file:` and `raw:` are library-only per §6; only direct Rust API
    /// callers should construct them without going through this gate.
    pub fn validate_network_boundary(input: &str) -> Result<Self, CrawlError> {
        let target = Self::parse(input)?;
        match &target {
            UrlTarget::Http { .. } => Ok(target),
            UrlTarget::File { .. } | UrlTarget::Raw { .. } | UrlTarget::Cdp { .. } => {
                let scheme = match &target {
                    UrlTarget::File { .. } => "file",
                    UrlTarget::Raw { .. } => "raw",
                    UrlTarget::Cdp { .. } => "ws/wss",
                    UrlTarget::Http { .. } => unreachable!(),
                };
                Err(CrawlError::InvalidScheme {
                    url: input.to_string(),
                    scheme: scheme.to_string(),
                })
            }
        }
    }
}

/// Canonicalize `url` for visited-set membership: lowercase scheme and host,
/// strip a default port, drop the fragment, and sort query keys.
pub fn canonicalize(raw: &str) -> Result<String, CrawlError> {
    let mut parsed = url::Url::parse(raw)?;
    parsed.set_fragment(None);

    let default_port = match parsed.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if parsed.port() == default_port {
        let _ = parsed.set_port(None);
    }

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    pairs.sort();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        parsed.set_query(Some(&query));
    }

    // `url::Url` already lowercases the scheme and (for domain hosts) the
    // host during parsing per the URL Standard, so nothing further needs
    // folding here. Do NOT lowercase the whole serialized string: path and
    // query *values* are case-sensitive and folding them collapses
    // distinct URLs (`/Articles/Foo` vs `/articles/foo`) into one.
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_html_with_hash_is_not_truncated() {
        let target = UrlTarget::parse("raw:body{background:#eee}").unwrap();
        assert_eq!(
            target,
            UrlTarget::Raw {
                html: "body{background:#eee}".to_string()
            }
        );
    }

    #[test]
    fn unknown_scheme_is_invalid() {
        let err = UrlTarget::parse("javascript:alert(1)").unwrap_err();
        assert!(matches!(err, CrawlError::InvalidScheme { .. }));
    }

    #[test]
    fn network_boundary_rejects_file_and_raw() {
        assert!(UrlTarget::validate_network_boundary("file:///etc/passwd").is_err());
        assert!(UrlTarget::validate_network_boundary("raw:<p>hi</p>").is_err());
        assert!(UrlTarget::validate_network_boundary("https://example.com").is_ok());
    }

    #[test]
    fn canonicalize_strips_default_port_and_sorts_query() {
        let a = canonicalize("https://Example.com:443/path?b=2&a=1").unwrap();
        let b = canonicalize("https://example.com/path?a=1&b=2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalize_drops_fragment() {
        let a = canonicalize("https://example.com/path#section").unwrap();
        let b = canonicalize("https://example.com/path").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalize_lowercases_scheme_and_host_but_not_path_or_query() {
        let out = canonicalize("HTTPS://Example.COM/Articles/Foo?Key=Value").unwrap();
        assert_eq!(out, "https://example.com/Articles/Foo?Key=Value");
    }

    #[test]
    fn canonicalize_distinguishes_differently_cased_paths() {
        let a = canonicalize("https://example.com/Articles/Foo").unwrap();
        let b = canonicalize("https://example.com/articles/foo").unwrap();
        assert_ne!(a, b);
    }
}
