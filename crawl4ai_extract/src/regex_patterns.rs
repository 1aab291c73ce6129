//! Built-in regex pattern extraction.
//!
//! The source design's bitflag pattern enum is expressed as a plain Rust
//! enum plus a hand-rolled bitset ([`PatternSet`]) rather than pulling in a
//! bitflags dependency the rest of the workspace never needed.

use crate::error::ExtractionError;
use crate::InputFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A built-in named pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegexPatternKind {
    /// `user@example.com`
    Email,
    /// US-formatted phone numbers.
    PhoneUS,
    /// E.164-ish international phone numbers.
    PhoneIntl,
    /// `http(s)://...` URLs.
    Url,
    /// Dotted-quad IPv4 addresses.
    IPv4,
    /// Colon-separated IPv6 addresses.
    IPv6,
    /// RFC 4122 UUIDs.
    Uuid,
    /// `$1,234.56`-style currency amounts.
    Currency,
    /// `12.3%`-style percentages.
    Percentage,
    /// Bare numeric literals.
    Number,
    /// `YYYY-MM-DD`.
    DateIso,
    /// `MM/DD/YYYY`.
    DateUS,
    /// `HH:MM[:SS]` 24-hour clock.
    Time24h,
    /// 5 or 9 digit US ZIP codes.
    PostalUS,
    /// UK postcodes.
    PostalUK,
    /// `#rrggbb` / `#rgb` colors.
    HexColor,
    /// `@handle`.
    TwitterHandle,
    /// `#tag`.
    Hashtag,
    /// `aa:bb:cc:dd:ee:ff` MAC addresses.
    MacAddr,
    /// International Bank Account Numbers.
    Iban,
    /// 13-19 digit credit card numbers.
    CreditCard,
    /// Every built-in pattern above.
    All,
}

impl RegexPatternKind {
    fn source(self) -> &'static str {
        match self {
            Self::Email => r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            Self::PhoneUS => r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}",
            Self::PhoneIntl => r"\+\d{1,3}[-.\s]?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,9}",
            Self::Url => r"https?://[^\s<>""']+",
            Self::IPv4 => r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
            Self::IPv6 => r"\b(?:[A-Fa-f0-9]{1,4}:){7}[A-Fa-f0-9]{1,4}\b",
            Self::Uuid => {
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"
            }
            Self::Currency => r"[$€£¥]\s?\d{1,3}(?:,\d{3})*(?:\.\d{2})?",
            Self::Percentage => r"\d+(?:\.\d+)?%",
            Self::Number => r"-?\d+(?:\.\d+)?",
            Self::DateIso => r"\d{4}-\d{2}-\d{2}",
            Self::DateUS => r"\d{1,2}/\d{1,2}/\d{2,4}",
            Self::Time24h => r"(?:[01]\d|2[0-3]):[0-5]\d(?::[0-5]\d)?",
            Self::PostalUS => r"\b\d{5}(?:-\d{4})?\b",
            Self::PostalUK => r"\b[A-Z]{1,2}\d[A-Z\d]?\s?\d[A-Z]{2}\b",
            Self::HexColor => r"#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})\b",
            Self::TwitterHandle => r"@\w{1,15}",
            Self::Hashtag => r"#\w+",
            Self::MacAddr => r"(?:[0-9a-fA-F]{2}:){5}[0-9a-fA-F]{2}",
            Self::Iban => r"\b[A-Z]{2}\d{2}[A-Z0-9]{1,30}\b",
            Self::CreditCard => r"\b(?:\d[ -]?){13,19}\b",
            Self::All => unreachable!("All is expanded before pattern compilation"),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::PhoneUS => "phone_us",
            Self::PhoneIntl => "phone_intl",
            Self::Url => "url",
            Self::IPv4 => "ipv4",
            Self::IPv6 => "ipv6",
            Self::Uuid => "uuid",
            Self::Currency => "currency",
            Self::Percentage => "percentage",
            Self::Number => "number",
            Self::DateIso => "date_iso",
            Self::DateUS => "date_us",
            Self::Time24h => "time_24h",
            Self::PostalUS => "postal_us",
            Self::PostalUK => "postal_uk",
            Self::HexColor => "hex_color",
            Self::TwitterHandle => "twitter_handle",
            Self::Hashtag => "hashtag",
            Self::MacAddr => "mac_addr",
            Self::Iban => "iban",
            Self::CreditCard => "credit_card",
            Self::All => "all",
        }
    }

    const ALL: &'static [RegexPatternKind] = &[
        Self::Email,
        Self::PhoneUS,
        Self::PhoneIntl,
        Self::Url,
        Self::IPv4,
        Self::IPv6,
        Self::Uuid,
        Self::Currency,
        Self::Percentage,
        Self::Number,
        Self::DateIso,
        Self::DateUS,
        Self::Time24h,
        Self::PostalUS,
        Self::PostalUK,
        Self::HexColor,
        Self::TwitterHandle,
        Self::Hashtag,
        Self::MacAddr,
        Self::Iban,
        Self::CreditCard,
    ];
}

/// A selection of built-in pattern kinds to run in one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSet(Vec<RegexPatternKind>);

impl PatternSet {
    /// An empty set.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a pattern kind, expanding `All` to every built-in kind.
    pub fn with(mut self, kind: RegexPatternKind) -> Self {
        if kind == RegexPatternKind::All {
            self.0.extend_from_slice(RegexPatternKind::ALL);
        } else {
            self.0.push(kind);
        }
        self
    }

    pub fn kinds(&self) -> Vec<RegexPatternKind> {
        if self.0.iter().any(|k| *k == RegexPatternKind::All) {
            RegexPatternKind::ALL.to_vec()
        } else {
            self.0.clone()
        }
    }
}

/// Configuration for the regex extraction strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegexExtractionConfig {
    /// Which artifact to scan.
    pub input_format: InputFormat,
    /// Built-in patterns to run.
    pub patterns: PatternSet,
    /// Additional named custom patterns, merged with `patterns`.
    #[serde(default)]
    pub custom_patterns: HashMap<String, String>,
}

/// One matched span.
#[derive(Debug, Clone, Serialize)]
pub struct RegexMatch {
    /// Pattern label (built-in name, or the custom pattern's key).
    pub label: String,
    /// The matched substring.
    pub value: String,
    /// `[start, end)` byte offsets into the scanned input.
    pub span: [usize; 2],
}

/// Run every configured pattern against `input`, returning matches ordered
/// by (pattern declaration order, span start).
pub fn run(config: &RegexExtractionConfig, input: &str) -> Result<JsonValue, ExtractionError> {
    let mut matches = Vec::new();

    for kind in config.kinds() {
        let re = regex::Regex::new(kind.source()).map_err(|source| {
            ExtractionError::InvalidPattern {
                pattern: kind.source().to_string(),
                source,
            }
        })?;
        for m in re.find_iter(input) {
            matches.push(RegexMatch {
                label: kind.label().to_string(),
                value: m.as_str().to_string(),
                span: [m.start(), m.end()],
            });
        }
    }

    for (label, source) in &config.custom_patterns {
        let re = regex::Regex::new(source).map_err(|source| ExtractionError::InvalidPattern {
            pattern: source.to_string(),
            source,
        })?;
        for m in re.find_iter(input) {
            matches.push(RegexMatch {
                label: label.clone(),
                value: m.as_str().to_string(),
                span: [m.start(), m.end()],
            });
        }
    }

    serde_json::to_value(matches).map_err(ExtractionError::Serialize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_email_with_span() {
        let text = "reach us at contact@example.com for support";
        let config = RegexExtractionConfig {
            input_format: InputFormat::Markdown,
            patterns: PatternSet::new().with(RegexPatternKind::Email),
            custom_patterns: HashMap::new(),
        };
        let out = run(&config, text).unwrap();
        let arr = out.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["label"], "email");
        assert_eq!(arr[0]["value"], "contact@example.com");
        let start = text.find("contact@example.com").unwrap();
        assert_eq!(arr[0]["span"][0], start);
    }

    #[test]
    fn all_expands_to_every_kind() {
        let set = PatternSet::new().with(RegexPatternKind::All);
        assert_eq!(set.kinds().len(), RegexPatternKind::ALL.len());
    }
}
