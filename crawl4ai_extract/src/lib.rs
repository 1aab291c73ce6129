//! Extraction strategies for crawl4ai: CSS/XPath schemas, built-in regex
//! pattern sets, and LLM-chunked extraction.
//!
//! Every strategy funnels through [`ExtractionStrategy::run`], which takes
//! the pipeline's chosen input (markdown, cleaned HTML, or fit markdown) and
//! returns a JSON value ready to be serialized into `extracted_content`.

mod error;
pub mod llm;
pub mod regex_patterns;
pub mod schema;

pub use error::ExtractionError;
pub use llm::{LlmCaller, LlmExtractionConfig, LlmExtractionType, TokenUsage};
pub use regex_patterns::{PatternSet, RegexExtractionConfig, RegexMatch, RegexPatternKind};
pub use schema::{Field, FieldType, Schema, Transform};

use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Which pipeline artifact an extraction strategy consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// The generator's `raw_markdown`.
    #[default]
    Markdown,
    /// `cleaned_html`.
    Html,
    /// The content filter's `fit_markdown`, when present.
    FitMarkdown,
}

/// A tagged union of extraction strategies, replacing the duck-typed
/// strategy objects of the source design (see design notes on duck-typed
/// extraction strategies).
#[derive(Clone)]
pub enum ExtractionStrategy {
    /// CSS-selector-driven schema extraction.
    SchemaCss(Schema),
    /// XPath-driven schema extraction.
    SchemaXPath(Schema),
    /// Built-in or custom regex pattern extraction.
    Regex(RegexExtractionConfig),
    /// LLM-backed extraction, chunked for long inputs.
    Llm(LlmExtractionConfig, Arc<dyn LlmCaller>),
}

impl std::fmt::Debug for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchemaCss(s) => f.debug_tuple("SchemaCss").field(s).finish(),
            Self::SchemaXPath(s) => f.debug_tuple("SchemaXPath").field(s).finish(),
            Self::Regex(c) => f.debug_tuple("Regex").field(c).finish(),
            Self::Llm(c, _) => f.debug_tuple("Llm").field(c).finish(),
        }
    }
}

impl ExtractionStrategy {
    /// The input artifact this strategy expects, driving how the content
    /// pipeline prepares its argument.
    pub fn input_format(&self) -> InputFormat {
        match self {
            Self::SchemaCss(_) => InputFormat::Html,
            Self::SchemaXPath(_) => InputFormat::Html,
            Self::Regex(cfg) => cfg.input_format,
            Self::Llm(cfg, _) => cfg.input_format,
        }
    }

    /// Run the strategy against `input`, producing a JSON value.
    ///
    /// Schema and regex strategies are synchronous under the hood but are
    /// exposed as `async fn` uniformly so callers never branch on variant.
    pub async fn run(&self, input: &str) -> Result<JsonValue, ExtractionError> {
        match self {
            Self::SchemaCss(schema) => schema::run_css(schema, input),
            Self::SchemaXPath(schema) => schema::run_xpath(schema, input),
            Self::Regex(cfg) => regex_patterns::run(cfg, input),
            Self::Llm(cfg, caller) => llm::run(cfg, caller.as_ref(), input).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn css_schema_extracts_crypto_rows() {
        let html = r#"
            <div class="crypto-row"><h2 class="coin-name">Bitcoin</h2><span class="coin-price">$28,000</span></div>
            <div class="crypto-row"><h2 class="coin-name">Ethereum</h2><span class="coin-price">$1,800</span></div>
        "#;
        let schema = Schema {
            name: "crypto".into(),
            base_selector: ".crypto-row".into(),
            base_fields: vec![],
            fields: vec![
                Field {
                    name: "coin_name".into(),
                    selector: ".coin-name".into(),
                    kind: FieldType::Text,
                    attribute: None,
                    pattern: None,
                    default: None,
                    transform: None,
                    fields: vec![],
                },
                Field {
                    name: "price".into(),
                    selector: ".coin-price".into(),
                    kind: FieldType::Text,
                    attribute: None,
                    pattern: None,
                    default: None,
                    transform: None,
                    fields: vec![],
                },
            ],
        };
        let strategy = ExtractionStrategy::SchemaCss(schema);
        let out = strategy.run(html).await.unwrap();
        assert_eq!(
            out,
            serde_json::json!([
                {"coin_name": "Bitcoin", "price": "$28,000"},
                {"coin_name": "Ethereum", "price": "$1,800"}
            ])
        );
    }
}
